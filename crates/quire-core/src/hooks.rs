//! Named mount/unmount/save hooks for raw-markup outputs.
//!
//! Output data only carries hook *names*; the functions are registered up front by the host,
//! so nothing in an output tree is ever executed as code.

use std::collections::HashMap;

use crate::document::Document;
use crate::error::HookError;
use crate::model::OutputNode;

pub type HookResult<T> = std::result::Result<T, HookError>;

/// Runs after insertion (`didMount`) or before removal (`willUnmount`) with the element id.
pub type ElementHook = fn(document: &mut dyn Document, element_id: &str) -> HookResult<()>;

/// Produces the saved form of an element (`saveHook`).
pub type SaveHook = fn(document: &dyn Document, element_id: &str) -> HookResult<OutputNode>;

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    mount: HashMap<&'static str, ElementHook>,
    unmount: HashMap<&'static str, ElementHook>,
    save: HashMap<&'static str, SaveHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_mount(&mut self, name: &'static str, hook: ElementHook) {
        self.mount.insert(name, hook);
    }

    pub fn insert_unmount(&mut self, name: &'static str, hook: ElementHook) {
        self.unmount.insert(name, hook);
    }

    pub fn insert_save(&mut self, name: &'static str, hook: SaveHook) {
        self.save.insert(name, hook);
    }

    pub fn mount(&self, name: &str) -> Option<ElementHook> {
        self.mount.get(name).copied()
    }

    pub fn unmount(&self, name: &str) -> Option<ElementHook> {
        self.unmount.get(name).copied()
    }

    pub fn save(&self, name: &str) -> Option<SaveHook> {
        self.save.get(name).copied()
    }

    /// The hooks shipped with the engine:
    /// - save `inner-html`: saves the element's current markup as a raw-markup output;
    /// - unmount `clear`: empties the element.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.insert_save("inner-html", save_inner_html);
        reg.insert_unmount("clear", clear_element);
        reg
    }
}

fn save_inner_html(document: &dyn Document, element_id: &str) -> HookResult<OutputNode> {
    let html = document
        .inner_html(element_id)
        .ok_or_else(|| HookError::failed(format!("element {element_id} is not mounted")))?;
    Ok(OutputNode::html(html))
}

fn clear_element(document: &mut dyn Document, element_id: &str) -> HookResult<()> {
    document.set_inner_html(element_id, "")?;
    Ok(())
}
