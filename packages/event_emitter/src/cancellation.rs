//! Single-threaded cancellation tokens with detachable reactions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Reaction = Box<dyn FnOnce()>;

/// A capability that transitions once from "active" to "cancelled" and notifies whoever
/// reacted to that transition.
///
/// The token is owned by whoever creates it. An [`Emitter`][crate::Emitter] only observes it:
/// registering a listener with a token attaches a reaction that removes the listener when the
/// token is cancelled, and removing the listener by any other path detaches that reaction again.
///
/// Clones of a token share the same state, so one part of the program can hold a clone to
/// cancel while another hands a clone to the emitter.
///
/// # Example
///
/// ```rust
/// use event_emitter::CancellationToken;
///
/// let token = CancellationToken::new();
/// let reaction = token.on_cancel(|| println!("cancelled"));
/// assert_eq!(token.attached_reactions(), 1);
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// assert!(!reaction.is_attached());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Rc<TokenState>,
}

#[derive(Default)]
struct TokenState {
    cancelled: Cell<bool>,
    next_reaction_id: Cell<u64>,

    // Attachment order is the order in which reactions run on cancellation.
    reactions: RefCell<Vec<(u64, Reaction)>>,
}

impl CancellationToken {
    /// Creates a new token in the active (not cancelled) state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`cancel()`][Self::cancel] has been called on this token or any of its clones.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    /// Cancels the token, running every attached reaction once, in attachment order.
    ///
    /// Calling this on a token that is already cancelled does nothing.
    ///
    /// Reactions may attach or detach other reactions on the same token while they run. A reaction
    /// detached before its turn does not run.
    ///
    /// # Panics
    ///
    /// If a reaction panics, the panic propagates to the caller. The token remains cancelled and
    /// reactions that had not yet run are detached without running.
    pub fn cancel(&self) {
        if self.state.cancelled.replace(true) {
            return;
        }

        loop {
            // The borrow must end before the reaction runs, as the reaction is free to touch us.
            let next = {
                let mut reactions = self.state.reactions.borrow_mut();

                if reactions.is_empty() {
                    None
                } else {
                    Some(reactions.remove(0))
                }
            };

            let Some((_, reaction)) = next else {
                break;
            };

            reaction();
        }
    }

    /// Attaches a reaction that runs when the token is cancelled.
    ///
    /// The returned guard detaches the reaction when dropped. Keep the guard alive for as long as
    /// the reaction should stay attached.
    ///
    /// If the token is already cancelled, the reaction runs immediately and the returned guard
    /// is not attached to anything.
    pub fn on_cancel<F>(&self, reaction: F) -> CancelReaction
    where
        F: FnOnce() + 'static,
    {
        if self.is_cancelled() {
            reaction();
            return CancelReaction::detached();
        }

        let id = self.state.next_reaction_id.get();
        self.state.next_reaction_id.set(id.wrapping_add(1));

        self.state
            .reactions
            .borrow_mut()
            .push((id, Box::new(reaction)));

        CancelReaction {
            token: Rc::downgrade(&self.state),
            id,
        }
    }

    /// The number of reactions currently attached to the token and waiting for cancellation.
    #[must_use]
    pub fn attached_reactions(&self) -> usize {
        self.state.reactions.borrow().len()
    }
}

impl fmt::Debug for CancellationToken {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("attached_reactions", &self.attached_reactions())
            .finish()
    }
}

/// A reaction attached to a [`CancellationToken`] via [`CancellationToken::on_cancel()`].
///
/// Dropping the guard (or calling [`detach()`][Self::detach]) detaches the reaction, so it will
/// not run if the token is cancelled afterwards. The guard does not keep the token alive.
#[must_use = "dropping a CancelReaction immediately detaches the reaction"]
pub struct CancelReaction {
    token: Weak<TokenState>,
    id: u64,
}

impl CancelReaction {
    fn detached() -> Self {
        Self {
            token: Weak::new(),
            id: 0,
        }
    }

    /// Detaches the reaction from the token. Equivalent to dropping the guard.
    pub fn detach(self) {
        drop(self);
    }

    /// Whether the reaction is still attached and will run if the token is cancelled.
    ///
    /// This is `false` once the reaction has run, once the token has been dropped
    /// and for guards returned by [`CancellationToken::on_cancel()`] on an already
    /// cancelled token.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.token.upgrade().is_some_and(|state| {
            state
                .reactions
                .borrow()
                .iter()
                .any(|(id, _)| *id == self.id)
        })
    }
}

impl Drop for CancelReaction {
    fn drop(&mut self) {
        let Some(state) = self.token.upgrade() else {
            return;
        };

        // The reaction is dropped outside the borrow because dropping it may release arbitrary
        // captured state.
        let removed = {
            let mut reactions = state.reactions.borrow_mut();

            reactions
                .iter()
                .position(|(id, _)| *id == self.id)
                .map(|index| reactions.remove(index))
        };

        drop(removed);
    }
}

impl fmt::Debug for CancelReaction {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelReaction")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;

    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(CancellationToken: Send, Sync);
    assert_not_impl_any!(CancelReaction: Send, Sync);

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));

        let reaction = {
            let count = Rc::clone(&count);
            move || count.set(count.get() + 1)
        };

        (count, reaction)
    }

    #[test]
    fn new_token_is_not_cancelled() {
        let token = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert_eq!(token.attached_reactions(), 0);
    }

    #[test]
    fn cancel_runs_reaction_once() {
        let token = CancellationToken::new();
        let (count, reaction) = counter();
        let _guard = token.on_cancel(reaction);

        token.cancel();
        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(count.get(), 1);
        assert_eq!(token.attached_reactions(), 0);
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        let (count, reaction) = counter();
        let _guard = clone.on_cancel(reaction);

        token.cancel();

        assert!(clone.is_cancelled());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn reactions_run_in_attachment_order() {
        let token = CancellationToken::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let guards: Vec<_> = (0..3)
            .map(|index| {
                let order = Rc::clone(&order);
                token.on_cancel(move || order.borrow_mut().push(index))
            })
            .collect();

        token.cancel();

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        drop(guards);
    }

    #[test]
    fn dropped_guard_detaches_reaction() {
        let token = CancellationToken::new();
        let (count, reaction) = counter();

        let guard = token.on_cancel(reaction);
        assert!(guard.is_attached());
        assert_eq!(token.attached_reactions(), 1);

        guard.detach();
        assert_eq!(token.attached_reactions(), 0);

        token.cancel();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn on_cancel_after_cancel_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let (count, reaction) = counter();
        let guard = token.on_cancel(reaction);

        assert_eq!(count.get(), 1);
        assert!(!guard.is_attached());
        assert_eq!(token.attached_reactions(), 0);
    }

    #[test]
    fn reaction_can_detach_later_reaction() {
        let token = CancellationToken::new();
        let (count, second) = counter();

        let second_guard = Rc::new(RefCell::new(None));
        let first_guard = token.on_cancel({
            let second_guard = Rc::clone(&second_guard);
            move || drop(second_guard.borrow_mut().take())
        });
        *second_guard.borrow_mut() = Some(token.on_cancel(second));

        token.cancel();

        assert_eq!(count.get(), 0);
        drop(first_guard);
    }

    #[test]
    fn reaction_can_attach_new_reaction() {
        let token = CancellationToken::new();
        let (count, inner) = counter();

        let inner_guard = Rc::new(RefCell::new(None));
        let _outer_guard = token.on_cancel({
            let token = token.clone();
            let inner_guard = Rc::clone(&inner_guard);
            move || *inner_guard.borrow_mut() = Some(token.on_cancel(inner))
        });

        token.cancel();

        // Attached after cancellation began, so it ran immediately.
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn guard_outliving_token_is_harmless() {
        let token = CancellationToken::new();
        let (count, reaction) = counter();
        let guard = token.on_cancel(reaction);

        drop(token);

        assert!(!guard.is_attached());
        drop(guard);
        assert_eq!(count.get(), 0);
    }
}
