#![forbid(unsafe_code)]

//! Renders notebook output trees into a live document and exports them back to data.
//!
//! A render pass turns an [`OutputNode`](quire_core::OutputNode) into markup, attaches it
//! inside a fresh output region, then runs the mount callbacks the node renderers queued.
//! The returned [`RenderedOutput`] owns the unmount callbacks, the composed save function and
//! any chart draws still in flight.

pub mod chart;
mod context;
mod driver;
pub mod error;
pub mod events;
mod html;
mod list;
pub mod math;
#[cfg(feature = "raster")]
pub mod raster;
pub mod save;
pub mod scheduler;
pub mod sink;

pub use chart::{CHART_ERROR_PREFIX, ChartCompiler, ChartView, PlotCompiler};
pub use context::{Rendered, UNKNOWN_RENDER_TYPE};
pub use driver::{RenderedOutput, Renderer};
pub use error::{ChartError, HookFailure, RenderError, Result, SaveError, TypesetError};
pub use events::{AppEvent, ClickEvent, EventBus, SHOW_VALUE_EVENT};
#[cfg(feature = "katex")]
pub use math::KatexTypesetter;
pub use math::{LATEX_ERROR_PREFIX, MATH_SENTINEL, Typesetter};
pub use save::SaveFn;
pub use sink::ErrorSink;
