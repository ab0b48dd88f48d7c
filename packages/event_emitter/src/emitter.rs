use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use foldhash::HashMap;
use futures::channel::oneshot;
use tracing::{debug, error, trace};

use crate::{
    CancelReaction, CancellationToken, EmitterBuilder, EscalatePanic, Listener, ListenerOptions,
    ListenerPanic, Wait, WaitError, WaitResult, WaitSlot,
};

/// Delivers values of type `T` to every registered [`Listener<T>`], synchronously and in
/// registration order.
///
/// The emitter is single-threaded. Cloning an `Emitter` creates another handle to the same
/// registry, which is how listeners get access to the emitter that invokes them.
///
/// # Dispatch
///
/// [`emit()`][Self::emit] takes a snapshot of the registry before invoking any listener. The
/// snapshot decides who is invoked:
///
/// * Listeners registered while a dispatch is in progress are not invoked by that dispatch.
/// * Listeners removed while a dispatch is in progress are still invoked by that dispatch if they
///   were registered when it started (one-shot registrations that already fired excepted).
///
/// Listeners may register, remove and emit on the same emitter while being invoked. A listener
/// that captures a clone of its own emitter keeps the emitter alive until the listener is removed.
///
/// Dropping the last handle removes every listener, detaching their reactions from cancellation
/// tokens and failing pending [`Wait`]s with [`WaitError::EmitterDropped`].
///
/// # Listener panics
///
/// A panicking listener does not stop the dispatch. The panic is caught, logged and handed to the
/// emitter's [`EscalatePanic`] implementation, which by default re-raises it on a separate thread.
/// Use [`Emitter::builder()`] to choose a different escalation.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use event_emitter::{Emitter, Listener};
///
/// let emitter = Emitter::<u32>::new();
/// let total = Rc::new(Cell::new(0));
///
/// let listener = Listener::new({
///     let total = Rc::clone(&total);
///     move |value: &u32| total.set(total.get() + value)
/// });
///
/// emitter.add(&listener);
/// emitter.emit(5);
/// emitter.emit(6);
///
/// assert_eq!(total.get(), 11);
/// assert!(emitter.emitted());
/// ```
pub struct Emitter<T> {
    state: Rc<EmitterState<T>>,
}

/// Identifies one registration. Never reused within an emitter, so a stale identifier cannot
/// remove a later registration of the same listener.
pub(crate) type EntryId = u64;

pub(crate) struct EmitterState<T> {
    name: &'static str,
    escalation: Box<dyn EscalatePanic>,

    emitted: Cell<bool>,
    next_entry_id: Cell<EntryId>,

    // Registration order. At most one entry per listener identity. One-shot registrations wrap
    // the caller's listener in a listener of their own, so they never collide with anything.
    entries: RefCell<Vec<Rc<Entry<T>>>>,

    // Reactions attached to cancellation tokens, keyed by the entry they remove. An entry and its
    // binding are always removed together; dropping the binding detaches it from the token.
    cancellation_bindings: RefCell<HashMap<EntryId, CancelReaction>>,
}

struct Entry<T> {
    id: EntryId,
    listener: Listener<T>,
    kind: EntryKind,
}

enum EntryKind {
    Persistent,

    // Set when the entry is invoked for the first time, before the listener runs.
    Once { fired: Cell<bool> },
}

impl<T> Emitter<T> {
    /// Creates an emitter with the default configuration.
    ///
    /// Use [`Emitter::builder()`] to customize the configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building an emitter with a custom configuration.
    pub fn builder() -> EmitterBuilder<T> {
        EmitterBuilder::new()
    }

    pub(crate) fn new_inner(name: &'static str, escalation: Box<dyn EscalatePanic>) -> Self {
        Self {
            state: Rc::new(EmitterState {
                name,
                escalation,
                emitted: Cell::new(false),
                next_entry_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
                cancellation_bindings: RefCell::new(HashMap::default()),
            }),
        }
    }
}

impl<T> Emitter<T>
where
    T: 'static,
{
    /// Registers a listener, to be invoked by every subsequent [`emit()`][Self::emit].
    ///
    /// Does nothing if the same listener (by identity) is already registered.
    #[doc(alias = "subscribe")]
    #[doc(alias = "add_listener")]
    #[doc(alias = "add_event_listener")]
    pub fn add(&self, listener: &Listener<T>) {
        self.add_with_options(listener, &ListenerOptions::new());
    }

    /// Registers a listener with [options][ListenerOptions].
    ///
    /// Does nothing if the same listener (by identity) is already registered, in which case the
    /// options are ignored.
    ///
    /// If the options carry a [`CancellationToken`], cancelling it removes the listener. If the
    /// token is already cancelled, the listener is removed again right away and never invoked.
    #[doc(alias = "subscribe")]
    pub fn add_with_options(&self, listener: &Listener<T>, options: &ListenerOptions) {
        self.state
            .register(listener, EntryKind::Persistent, options.cancellation(), || {});
    }

    /// Registers a listener to be invoked by the next [`emit()`][Self::emit] only.
    ///
    /// The registration removes itself before the listener is invoked, so the listener runs at
    /// most once even if it emits on the same emitter.
    ///
    /// Every call creates a separate registration, even for a listener that is already registered
    /// (regularly or as a one-shot listener). The registration is not identified by `listener`, so
    /// [`remove()`][Self::remove] does not affect it and [`contains()`][Self::contains] does not
    /// report it. Use a [`CancellationToken`] to withdraw it before it fires.
    #[doc(alias = "add_once")]
    pub fn once(&self, listener: &Listener<T>) {
        self.once_with_options(listener, &ListenerOptions::new());
    }

    /// Registers a listener with [options][ListenerOptions], to be invoked by the next
    /// [`emit()`][Self::emit] only.
    ///
    /// Cancelling the token from the options removes the registration before it fires.
    #[doc(alias = "add_once")]
    pub fn once_with_options(&self, listener: &Listener<T>, options: &ListenerOptions) {
        let wrapper = Listener::new({
            let listener = listener.clone();
            move |value: &T| listener.call(value)
        });

        self.state.register(
            &wrapper,
            EntryKind::Once {
                fired: Cell::new(false),
            },
            options.cancellation(),
            || {},
        );
    }
}

impl<T> Emitter<T> {
    /// Removes a listener.
    ///
    /// Does nothing if the listener is not registered. Removing a listener also detaches the
    /// reaction its registration attached to a cancellation token, if any.
    #[doc(alias = "unsubscribe")]
    #[doc(alias = "remove_listener")]
    #[doc(alias = "remove_event_listener")]
    pub fn remove(&self, listener: &Listener<T>) {
        let entry_id = self
            .state
            .entries
            .borrow()
            .iter()
            .find(|entry| entry.listener.ptr_eq(listener))
            .map(|entry| entry.id);

        if let Some(entry_id) = entry_id {
            self.state.remove_entry(entry_id);
        }
    }

    /// Removes every listener and detaches every reaction attached to cancellation tokens.
    ///
    /// Does not reset [`emitted()`][Self::emitted]. Pending [`Wait`]s resolve to
    /// [`WaitError::Removed`].
    #[doc(alias = "clear")]
    pub fn remove_all(&self) {
        self.state.remove_all();
    }

    /// Invokes every registered listener with `value`, in registration order.
    ///
    /// Marks the emitter as [emitted][Self::emitted], even if no listener is registered.
    ///
    /// A listener that panics does not prevent the remaining listeners from being invoked;
    /// see the type-level documentation for how the panic is dealt with.
    #[doc(alias = "dispatch")]
    #[expect(
        clippy::needless_pass_by_value,
        reason = "the emitted value is owned by the dispatch, listeners borrow it"
    )]
    pub fn emit(&self, value: T) {
        self.state.emit(&value);
    }

    /// Whether [`emit()`][Self::emit] has been called at least once.
    #[must_use]
    pub fn emitted(&self) -> bool {
        self.state.emitted.get()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.entries.borrow().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.entries.borrow().is_empty()
    }

    /// Whether the listener (by identity) is registered via [`add()`][Self::add].
    ///
    /// Registrations made via [`once()`][Self::once] are not identified by the listener passed to
    /// them and are not reported here.
    #[must_use]
    pub fn contains(&self, listener: &Listener<T>) -> bool {
        self.state
            .entries
            .borrow()
            .iter()
            .any(|entry| entry.listener.ptr_eq(listener))
    }
}

impl<T> Emitter<T>
where
    T: Clone + 'static,
{
    /// Returns a future that resolves with the next value emitted after this call.
    ///
    /// # Example
    ///
    /// ```rust
    /// use event_emitter::Emitter;
    /// use futures::executor::block_on;
    ///
    /// let emitter = Emitter::<&'static str>::new();
    /// let next = emitter.wait();
    ///
    /// emitter.emit("first");
    /// emitter.emit("second");
    ///
    /// assert_eq!(block_on(next), Ok("first"));
    /// ```
    #[doc(alias = "next")]
    #[doc(alias = "add_once")]
    pub fn wait(&self) -> Wait<T> {
        self.wait_with_options(&ListenerOptions::new())
    }

    /// Returns a future that resolves with the next value emitted after this call, unless the
    /// cancellation token from the options is cancelled first.
    ///
    /// The future resolves to [`WaitError::Cancelled`] if the token is cancelled before a value
    /// arrives, including when it is already cancelled now (in which case nothing is registered).
    /// It resolves to [`WaitError::Removed`] if [`remove_all()`][Self::remove_all] removes the
    /// registration first, and to [`WaitError::EmitterDropped`] if all emitter handles are dropped
    /// first.
    ///
    /// # Example
    ///
    /// ```rust
    /// use event_emitter::{CancellationToken, Emitter, ListenerOptions, WaitError};
    /// use futures::executor::block_on;
    ///
    /// let emitter = Emitter::<u32>::new();
    /// let token = CancellationToken::new();
    /// let next = emitter.wait_with_options(&ListenerOptions::new().cancel_on(&token));
    ///
    /// token.cancel();
    /// emitter.emit(1);
    ///
    /// assert_eq!(block_on(next), Err(WaitError::Cancelled));
    /// ```
    pub fn wait_with_options(&self, options: &ListenerOptions) -> Wait<T> {
        let (sender, receiver) = oneshot::channel::<WaitResult<T>>();

        if options
            .cancellation()
            .is_some_and(CancellationToken::is_cancelled)
        {
            // The receiver is right here, so sending cannot fail.
            drop(sender.send(Err(WaitError::Cancelled)));
            return Wait::new(receiver, None);
        }

        let slot = Rc::new(RefCell::new(WaitSlot::new(
            sender,
            Rc::downgrade(&self.state),
        )));

        let listener = Listener::new({
            let slot = Rc::clone(&slot);
            move |value: &T| slot.borrow_mut().complete(Ok(value.clone()))
        });

        let on_cancel = move || slot.borrow_mut().complete(Err(WaitError::Cancelled));

        let entry_id = self.state.register(
            &listener,
            EntryKind::Once {
                fired: Cell::new(false),
            },
            options.cancellation(),
            on_cancel,
        );

        Wait::new(receiver, entry_id.map(|id| (Rc::downgrade(&self.state), id)))
    }
}

impl<T> EmitterState<T>
where
    T: 'static,
{
    /// Appends an entry unless the listener is already registered and, if a token is supplied,
    /// binds the entry to it. `on_cancel` runs after the entry is removed by the token.
    ///
    /// Returns the identifier of the new entry if it is still registered afterwards.
    fn register(
        self: &Rc<Self>,
        listener: &Listener<T>,
        kind: EntryKind,
        token: Option<&CancellationToken>,
        on_cancel: impl FnOnce() + 'static,
    ) -> Option<EntryId> {
        let id = {
            let mut entries = self.entries.borrow_mut();

            if entries.iter().any(|entry| entry.listener.ptr_eq(listener)) {
                return None;
            }

            let id = self.next_entry_id.get();
            self.next_entry_id.set(id.wrapping_add(1));

            entries.push(Rc::new(Entry {
                id,
                listener: listener.clone(),
                kind,
            }));

            id
        };

        trace!(emitter = self.name, entry_id = id, "listener registered");

        let Some(token) = token else {
            return Some(id);
        };

        if token.is_cancelled() {
            debug!(
                emitter = self.name,
                entry_id = id,
                "removing listener registered with an already cancelled token"
            );

            self.remove_entry(id);
            on_cancel();
            return None;
        }

        // The reaction must not keep the emitter alive, nor the listener.
        let reaction = token.on_cancel({
            let state = Rc::downgrade(self);

            move || {
                if let Some(state) = state.upgrade() {
                    debug!(
                        emitter = state.name,
                        entry_id = id,
                        "cancellation token removed listener"
                    );

                    state.remove_entry(id);
                }

                on_cancel();
            }
        });

        self.cancellation_bindings.borrow_mut().insert(id, reaction);

        Some(id)
    }
}

impl<T> EmitterState<T> {
    /// Removes an entry and detaches its cancellation binding. Returns whether anything was
    /// registered under the identifier.
    pub(crate) fn remove_entry(&self, id: EntryId) -> bool {
        // Binding first, so the token never holds a reaction for an entry that no longer exists.
        let binding = self.cancellation_bindings.borrow_mut().remove(&id);
        drop(binding);

        // The entry is dropped outside the borrow because dropping a listener may release
        // arbitrary captured state.
        let removed = {
            let mut entries = self.entries.borrow_mut();

            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| entries.remove(index))
        };

        let was_registered = removed.is_some();

        if was_registered {
            trace!(emitter = self.name, entry_id = id, "listener removed");
        }

        drop(removed);
        was_registered
    }

    fn remove_all(&self) {
        let bindings = self.cancellation_bindings.take();
        drop(bindings);

        let entries = self.entries.take();

        trace!(
            emitter = self.name,
            listeners = entries.len(),
            "all listeners removed"
        );

        drop(entries);
    }

    fn emit(&self, value: &T) {
        self.emitted.set(true);

        // No borrow may be held while listeners run, as they are free to modify the registry.
        let snapshot = self.entries.borrow().clone();

        trace!(
            emitter = self.name,
            listeners = snapshot.len(),
            "dispatching value"
        );

        for entry in &snapshot {
            if let EntryKind::Once { fired } = &entry.kind {
                // A re-entrant dispatch may have invoked this entry already.
                if fired.replace(true) {
                    continue;
                }

                self.remove_entry(entry.id);
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| entry.listener.call(value)));

            if let Err(payload) = result {
                let listener_panic = ListenerPanic::new(payload);

                error!(
                    emitter = self.name,
                    entry_id = entry.id,
                    panic_message = listener_panic.message(),
                    "listener panicked during dispatch"
                );

                self.escalation.escalate(listener_panic);
            }
        }
    }
}

impl<T> Drop for EmitterState<T> {
    fn drop(&mut self) {
        // Detaches our reactions from tokens that outlive us.
        self.remove_all();
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("name", &self.state.name)
            .field("listeners", &self.len())
            .field("emitted", &self.emitted())
            .finish_non_exhaustive()
    }
}
