//! Mount and unmount callback queues for one render pass.
//!
//! Node renderers only *enqueue*: nothing touches the document until the driver has attached
//! the markup, then drains the mount queue in registration order. The unmount queue is kept
//! by the rendered output and drained when the host tears it down.

use std::fmt;

use futures::future::LocalBoxFuture;
use quire_core::{Document, HookErrorPolicy};

use crate::error::{HookFailure, RenderError};
use crate::sink::ErrorSink;

/// Applies a finished asynchronous draw to the document.
pub type DrawFn = Box<dyn FnOnce(&mut dyn Document)>;

/// An asynchronous draw started by a mount callback (a chart compiling, ...).
pub type PendingDraw = LocalBoxFuture<'static, DrawFn>;

pub type MountCallback = Box<dyn FnOnce(&mut Mount<'_>) -> Result<(), HookFailure>>;

pub type UnmountCallback = Box<dyn FnOnce(&mut dyn Document) -> Result<(), HookFailure>>;

/// What a mount callback gets: the document with the markup attached, plus a place to park
/// draws that complete later.
pub struct Mount<'a> {
    document: &'a mut dyn Document,
    draws: &'a mut Vec<PendingDraw>,
}

impl<'a> Mount<'a> {
    pub fn new(document: &'a mut dyn Document, draws: &'a mut Vec<PendingDraw>) -> Self {
        Self { document, draws }
    }

    pub fn document(&mut self) -> &mut dyn Document {
        &mut *self.document
    }

    pub fn defer_draw(&mut self, draw: PendingDraw) {
        self.draws.push(draw);
    }
}

/// An ordered list of deferred callbacks.
pub struct CallbackQueue<C> {
    callbacks: Vec<C>,
}

impl<C> Default for CallbackQueue<C> {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }
}

impl<C> fmt::Debug for CallbackQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

impl<C> CallbackQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, callback: C) {
        self.callbacks.push(callback);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Empties the queue, yielding callbacks in registration order.
    pub fn take(&mut self) -> Vec<C> {
        std::mem::take(&mut self.callbacks)
    }
}

/// Runs every mount callback once, in order.
///
/// Under [`HookErrorPolicy::Propagate`] the first failure stops the run and the remaining
/// callbacks are dropped unrun.
pub fn run_mount_queue(
    queue: &mut CallbackQueue<MountCallback>,
    document: &mut dyn Document,
    draws: &mut Vec<PendingDraw>,
    policy: HookErrorPolicy,
    errors: &ErrorSink,
) -> Result<(), RenderError> {
    let callbacks = queue.take();
    tracing::debug!(count = callbacks.len(), "running mount callbacks");
    let mut mount = Mount::new(document, draws);
    for callback in callbacks {
        if let Err(failure) = callback(&mut mount) {
            handle_failure(failure, policy, errors)?;
        }
    }
    Ok(())
}

/// Runs every unmount callback once, in order. A second call finds the queue empty.
pub fn run_unmount_queue(
    queue: &mut CallbackQueue<UnmountCallback>,
    document: &mut dyn Document,
    policy: HookErrorPolicy,
    errors: &ErrorSink,
) -> Result<(), RenderError> {
    let callbacks = queue.take();
    tracing::debug!(count = callbacks.len(), "running unmount callbacks");
    for callback in callbacks {
        if let Err(failure) = callback(&mut *document) {
            handle_failure(failure, policy, errors)?;
        }
    }
    Ok(())
}

fn handle_failure(
    failure: HookFailure,
    policy: HookErrorPolicy,
    errors: &ErrorSink,
) -> Result<(), RenderError> {
    match policy {
        HookErrorPolicy::Propagate => Err(failure.into()),
        HookErrorPolicy::Report => {
            errors.report(&format!("Hook error: {failure}"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use quire_core::{HookError, HtmlDocument};

    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<u32>>>, n: u32) -> MountCallback {
        let log = Rc::clone(log);
        Box::new(move |_| {
            log.borrow_mut().push(n);
            Ok(())
        })
    }

    fn failing(name: &str) -> MountCallback {
        let hook = name.to_string();
        Box::new(move |_| {
            Err(HookFailure {
                hook,
                source: HookError::failed("boom"),
            })
        })
    }

    #[test]
    fn mount_callbacks_run_in_order_exactly_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = CallbackQueue::new();
        for n in 0..4 {
            queue.push(recorder(&log, n));
        }
        let mut doc = HtmlDocument::new();
        let mut draws = Vec::new();
        let sink = ErrorSink::log_only();

        run_mount_queue(&mut queue, &mut doc, &mut draws, HookErrorPolicy::Propagate, &sink)
            .unwrap();
        run_mount_queue(&mut queue, &mut doc, &mut draws, HookErrorPolicy::Propagate, &sink)
            .unwrap();

        assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn propagate_stops_at_the_first_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = CallbackQueue::new();
        queue.push(recorder(&log, 1));
        queue.push(failing("bad"));
        queue.push(recorder(&log, 2));

        let mut doc = HtmlDocument::new();
        let err = run_mount_queue(
            &mut queue,
            &mut doc,
            &mut Vec::new(),
            HookErrorPolicy::Propagate,
            &ErrorSink::log_only(),
        )
        .unwrap_err();

        assert!(matches!(err, RenderError::Hook(ref f) if f.hook == "bad"));
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn report_forwards_and_continues() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = CallbackQueue::new();
        queue.push(failing("bad"));
        queue.push(recorder(&log, 2));
        let (sink, messages) = ErrorSink::collecting();

        run_mount_queue(
            &mut queue,
            &mut HtmlDocument::new(),
            &mut Vec::new(),
            HookErrorPolicy::Report,
            &sink,
        )
        .unwrap();

        assert_eq!(*log.borrow(), vec![2]);
        let messages = messages.borrow();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Hook error: "));
        assert!(messages[0].contains("boom"));
    }
}
