#![forbid(unsafe_code)]

//! Output model and document seam for the quire render/export engine.
//!
//! - [`model`]: the tagged output tree produced by evaluating notebook cells
//! - [`document`]: the live-document abstraction plus a headless HTML implementation
//! - [`hooks`]: the closed registry of named mount/unmount/save hooks
//! - [`options`]: render, save and export configuration

pub mod document;
pub mod error;
pub mod hooks;
pub mod markup;
pub mod model;
pub mod options;

pub use document::{Document, HtmlDocument, SvgElement};
pub use error::{DocumentError, Error, HookError, Result};
pub use hooks::{ElementHook, HookRegistry, HookResult, SaveHook};
pub use model::{HtmlOutput, LatexOutput, ListLikeOutput, OutputKind, OutputNode, VegaOutput};
pub use options::{
    ChartOptions, ChartSnapshot, CompositeSave, HookErrorPolicy, Modifiers, RasterOptions,
    RenderOptions, SavePolicy,
};
