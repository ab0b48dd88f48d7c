//! Re-surfacing of listener panics outside the dispatch call stack.
//!
//! A listener that panics during [`Emitter::emit()`][crate::Emitter::emit] does not unwind the
//! dispatch. The panic is caught, logged and handed to the emitter's [`EscalatePanic`]
//! implementation, whose job is to make the failure visible again once dispatch is out of the way.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic;
use std::rc::Rc;
use std::thread;

use tracing::warn;

/// A panic captured from a listener during dispatch.
pub struct ListenerPanic {
    payload: Box<dyn Any + Send>,
}

impl ListenerPanic {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        Self { payload }
    }

    /// The panic message, if the payload is a string. Other payloads yield a placeholder.
    #[must_use]
    pub fn message(&self) -> &str {
        if let Some(s) = self.payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = self.payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "unknown panic payload"
        }
    }

    /// Returns the original panic payload.
    #[must_use]
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// Resumes unwinding with the original payload on the current thread.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for ListenerPanic {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerPanic")
            .field("message", &self.message())
            .finish()
    }
}

/// Re-surfaces a listener panic after it has been isolated from the dispatch loop.
///
/// The emitter calls this once per panicking listener, after logging the panic. Implementations
/// must not assume they run outside the dispatch: the typical implementation schedules the actual
/// escalation for later.
///
/// Any `Fn(ListenerPanic)` closure implements this trait.
pub trait EscalatePanic {
    /// Takes ownership of a captured listener panic.
    fn escalate(&self, panic: ListenerPanic);
}

impl<F> EscalatePanic for F
where
    F: Fn(ListenerPanic),
{
    fn escalate(&self, panic: ListenerPanic) {
        self(panic);
    }
}

/// Escalates each listener panic on a detached thread that panics with the same message, so the
/// failure reaches the process panic hook without unwinding the dispatching thread.
///
/// This is what an emitter uses unless configured otherwise.
///
/// With the default panic hook, each listener panic is reported three times: once by the hook
/// where the listener panicked (before the emitter catches it), once as a `tracing` error event
/// from the emitter and once more by the hook on the escalation thread. Hosts that want a quieter
/// report can use [`PanicQueue`] or a closure instead.
#[derive(Clone, Copy, Debug, Default)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct EscalateOnThread;

const ESCALATION_THREAD_NAME: &str = "listener-panic";

impl EscalatePanic for EscalateOnThread {
    fn escalate(&self, panic: ListenerPanic) {
        let message = panic.message().to_owned();

        let spawned: io::Result<thread::JoinHandle<()>> = thread::Builder::new()
            .name(ESCALATION_THREAD_NAME.to_owned())
            .spawn({
                let message = message.clone();
                move || panic!("listener panicked during dispatch: {message}")
            });

        if let Err(error) = spawned {
            warn!(
                %error,
                panic_message = %message,
                "failed to spawn thread to escalate listener panic"
            );
        }
    }
}

/// Collects listener panics for a cooperative loop to deal with at a time of its choosing.
///
/// Clones share the same queue: give one clone to the emitter and drain another.
///
/// # Example
///
/// ```rust
/// use event_emitter::{Emitter, Listener, PanicQueue};
///
/// let panics = PanicQueue::new();
/// let emitter = Emitter::<u32>::builder()
///     .escalate_panics_with(panics.clone())
///     .build();
///
/// emitter.add(&Listener::new(|_: &u32| panic!("listener failed")));
/// emitter.emit(1);
///
/// let panic = panics.pop().unwrap();
/// assert_eq!(panic.message(), "listener failed");
/// ```
#[derive(Clone, Default)]
pub struct PanicQueue {
    panics: Rc<RefCell<VecDeque<ListenerPanic>>>,
}

impl PanicQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the oldest captured panic.
    #[must_use]
    pub fn pop(&self) -> Option<ListenerPanic> {
        self.panics.borrow_mut().pop_front()
    }

    /// Number of captured panics not yet removed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.panics.borrow().len()
    }

    /// Whether no captured panics are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panics.borrow().is_empty()
    }

    /// Resumes unwinding with the oldest captured panic, if there is one.
    pub fn resume_next(&self) {
        if let Some(panic) = self.pop() {
            panic.resume();
        }
    }
}

impl EscalatePanic for PanicQueue {
    fn escalate(&self, panic: ListenerPanic) {
        self.panics.borrow_mut().push_back(panic);
    }
}

impl fmt::Debug for PanicQueue {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::panic::AssertUnwindSafe;

    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(ListenerPanic: Sync);
    assert_not_impl_any!(PanicQueue: Send, Sync);

    fn capture(f: impl FnOnce()) -> ListenerPanic {
        let payload = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_err();
        ListenerPanic::new(payload)
    }

    #[test]
    fn message_from_str_payload() {
        let panic = capture(|| panic!("static message"));

        assert_eq!(panic.message(), "static message");
    }

    #[test]
    fn message_from_string_payload() {
        let value = 42;
        let panic = capture(|| panic!("formatted {value}"));

        assert_eq!(panic.message(), "formatted 42");
    }

    #[test]
    fn message_from_unknown_payload() {
        let panic = ListenerPanic::new(Box::new(7_u8));

        assert_eq!(panic.message(), "unknown panic payload");
        assert_eq!(panic.into_payload().downcast_ref::<u8>(), Some(&7));
    }

    #[test]
    #[should_panic]
    fn resume_rethrows() {
        let panic = capture(|| panic!("rethrow me"));

        panic.resume();
    }

    #[test]
    fn closure_escalation() {
        let count = Rc::new(Cell::new(0));
        let escalation = {
            let count = Rc::clone(&count);
            move |_: ListenerPanic| count.set(count.get() + 1)
        };

        escalation.escalate(capture(|| panic!("one")));
        escalation.escalate(capture(|| panic!("two")));

        assert_eq!(count.get(), 2);
    }

    #[test]
    fn queue_is_fifo_and_shared_between_clones() {
        let queue = PanicQueue::new();
        let clone = queue.clone();

        clone.escalate(capture(|| panic!("first")));
        clone.escalate(capture(|| panic!("second")));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().message(), "first");
        assert_eq!(queue.pop().unwrap().message(), "second");
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn resume_next_on_empty_queue_does_nothing() {
        PanicQueue::new().resume_next();
    }

    #[test]
    #[should_panic]
    fn resume_next_rethrows_oldest() {
        let queue = PanicQueue::new();
        queue.escalate(capture(|| panic!("queued")));

        queue.resume_next();
    }

    #[test]
    fn escalate_on_thread_returns_normally() {
        EscalateOnThread.escalate(capture(|| panic!("escalated elsewhere")));
    }
}
