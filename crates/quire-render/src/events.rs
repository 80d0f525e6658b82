//! Application events raised by interaction with rendered outputs.

use futures::channel::mpsc::UnboundedSender;
use quire_core::Modifiers;

pub const SHOW_VALUE_EVENT: &str = "app:show-value";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The user asked to see (and reuse) the value behind an output.
    ShowValue(String),
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowValue(_) => SHOW_VALUE_EVENT,
        }
    }
}

/// Where application events go.
pub trait EventBus {
    fn publish(&self, event: AppEvent);
}

impl EventBus for UnboundedSender<AppEvent> {
    fn publish(&self, event: AppEvent) {
        if self.unbounded_send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}

/// A click that reached a rendered output, delegated from the host's element listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    /// Id of the element the click landed on.
    pub target: String,
    pub modifiers: Modifiers,
}

impl ClickEvent {
    pub fn on(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            modifiers: Modifiers::empty(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
