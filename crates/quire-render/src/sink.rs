use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The single funnel for user-visible failure text of one render pass.
///
/// Every report is also logged at `warn` level.
#[derive(Clone)]
pub struct ErrorSink {
    report: Rc<dyn Fn(&str)>,
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

impl ErrorSink {
    pub fn new(report: impl Fn(&str) + 'static) -> Self {
        Self {
            report: Rc::new(report),
        }
    }

    /// A sink that only logs.
    pub fn log_only() -> Self {
        Self::new(|_| {})
    }

    /// A sink that appends every message to the returned list.
    pub fn collecting() -> (Self, Rc<RefCell<Vec<String>>>) {
        let messages = Rc::new(RefCell::new(Vec::new()));
        let sink = Self::new({
            let messages = Rc::clone(&messages);
            move |message| messages.borrow_mut().push(message.to_string())
        });
        (sink, messages)
    }

    pub fn report(&self, message: &str) {
        tracing::warn!(message, "output error");
        (self.report)(message);
    }

    /// A sink that prepends `prefix` and forwards here.
    pub fn prefixed(&self, prefix: &'static str) -> Self {
        let inner = self.clone();
        Self::new(move |message| inner.report(&format!("{prefix}{message}")))
    }
}
