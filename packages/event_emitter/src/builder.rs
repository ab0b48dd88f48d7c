use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{Emitter, EscalateOnThread, EscalatePanic};

const DEFAULT_NAME: &str = "unnamed";

/// Builder for creating an instance of [`Emitter`].
///
/// You only need to use this builder if you want to customize the emitter configuration.
/// The default configuration used by [`Emitter::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use event_emitter::{Emitter, PanicQueue};
///
/// let panics = PanicQueue::new();
///
/// let emitter = Emitter::<u32>::builder()
///     .name("config_reloaded")
///     .escalate_panics_with(panics.clone())
///     .build();
/// ```
///
/// [1]: Emitter::new
#[must_use]
pub struct EmitterBuilder<T> {
    name: &'static str,
    escalation: Option<Box<dyn EscalatePanic>>,

    _payload: PhantomData<T>,
}

impl<T> fmt::Debug for EmitterBuilder<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterBuilder")
            .field("payload_type", &format_args!("{}", type_name::<T>()))
            .field("name", &self.name)
            .field("custom_escalation", &self.escalation.is_some())
            .finish()
    }
}

impl<T> EmitterBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_NAME,
            escalation: None,
            _payload: PhantomData,
        }
    }

    /// Sets the name that identifies the emitter in log events.
    ///
    /// Defaults to `"unnamed"`.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets how panics of listeners are re-surfaced after being isolated from dispatch.
    ///
    /// Defaults to [`EscalateOnThread`].
    pub fn escalate_panics_with<E>(mut self, escalation: E) -> Self
    where
        E: EscalatePanic + 'static,
    {
        self.escalation = Some(Box::new(escalation));
        self
    }

    /// Builds the emitter with the specified configuration.
    #[must_use]
    pub fn build(self) -> Emitter<T> {
        let escalation = self
            .escalation
            .unwrap_or_else(|| Box::new(EscalateOnThread));

        Emitter::new_inner(self.name, escalation)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::{Listener, ListenerPanic};

    #[test]
    fn default_build_is_usable() {
        let emitter = Emitter::<i32>::builder().build();

        emitter.emit(1);

        assert!(emitter.emitted());
    }

    #[test]
    fn custom_escalation_is_used() {
        let escalated = Rc::new(Cell::new(false));

        let emitter = Emitter::<i32>::builder()
            .name("custom")
            .escalate_panics_with({
                let escalated = Rc::clone(&escalated);
                move |_: ListenerPanic| escalated.set(true)
            })
            .build();

        emitter.add(&Listener::new(|_: &i32| panic!("escalate me")));
        emitter.emit(1);

        assert!(escalated.get());
    }

    #[test]
    fn last_escalation_wins() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let emitter = Emitter::<i32>::builder()
            .escalate_panics_with({
                let first = Rc::clone(&first);
                move |_: ListenerPanic| first.set(first.get() + 1)
            })
            .escalate_panics_with({
                let second = Rc::clone(&second);
                move |_: ListenerPanic| second.set(second.get() + 1)
            })
            .build();

        emitter.add(&Listener::new(|_: &i32| panic!("which one")));
        emitter.emit(1);

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }
}
