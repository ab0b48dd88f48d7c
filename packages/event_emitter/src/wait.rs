use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use thiserror::Error;

use crate::{EmitterState, EntryId};

/// Why a [`Wait<T>`] completed without a value.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum WaitError {
    /// The cancellation token supplied at registration was cancelled before the emitter emitted.
    #[error("wait was cancelled before the emitter emitted a value")]
    Cancelled,

    /// Every handle to the emitter was dropped before it emitted.
    #[error("emitter was dropped before it emitted a value")]
    EmitterDropped,

    /// The registration was removed by [`Emitter::remove_all()`][crate::Emitter::remove_all]
    /// before the emitter emitted. The emitter itself is still alive.
    #[error("wait was removed from the emitter before it emitted a value")]
    Removed,
}

pub(crate) type WaitResult<T> = Result<T, WaitError>;

/// The sending half of a [`Wait<T>`], shared by the registered listener and the cancellation
/// reaction. Whichever completes it first decides the outcome.
///
/// If it goes away without having been completed, the registration was removed without a value
/// or a cancellation, and the outcome depends on whether the emitter is still alive.
pub(crate) struct WaitSlot<T> {
    sender: Option<oneshot::Sender<WaitResult<T>>>,
    emitter: Weak<EmitterState<T>>,
}

impl<T> WaitSlot<T> {
    pub(crate) fn new(
        sender: oneshot::Sender<WaitResult<T>>,
        emitter: Weak<EmitterState<T>>,
    ) -> Self {
        Self {
            sender: Some(sender),
            emitter,
        }
    }

    /// Does nothing if the slot was already completed.
    pub(crate) fn complete(&mut self, result: WaitResult<T>) {
        if let Some(sender) = self.sender.take() {
            // The `Wait` may have been dropped, in which case nobody cares.
            drop(sender.send(result));
        }
    }
}

impl<T> Drop for WaitSlot<T> {
    fn drop(&mut self) {
        // While the emitter state is being dropped, it can no longer be upgraded.
        let reason = if self.emitter.strong_count() == 0 {
            WaitError::EmitterDropped
        } else {
            WaitError::Removed
        };

        self.complete(Err(reason));
    }
}

/// Resolves with the next value emitted by an [`Emitter<T>`][crate::Emitter].
///
/// Returned by [`Emitter::wait()`][crate::Emitter::wait] and
/// [`Emitter::wait_with_options()`][crate::Emitter::wait_with_options]. The registration behind it
/// is one-shot: it is removed from the emitter when the value is delivered, when its token is
/// cancelled or when the `Wait` is dropped, whichever happens first. Removing it by
/// [`Emitter::remove_all()`][crate::Emitter::remove_all] completes it with
/// [`WaitError::Removed`].
#[must_use = "futures do nothing unless polled"]
pub struct Wait<T> {
    receiver: oneshot::Receiver<WaitResult<T>>,

    // `None` if no listener was registered (the token was already cancelled).
    registration: Option<(Weak<EmitterState<T>>, EntryId)>,
}

impl<T> Wait<T> {
    pub(crate) fn new(
        receiver: oneshot::Receiver<WaitResult<T>>,
        registration: Option<(Weak<EmitterState<T>>, EntryId)>,
    ) -> Self {
        Self {
            receiver,
            registration,
        }
    }
}

impl<T> Future for Wait<T> {
    type Output = WaitResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The slot always sends before it goes away, so a vanished sender can only be
            // explained by a vanished emitter.
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(WaitError::EmitterDropped)),
        }
    }
}

impl<T> Drop for Wait<T> {
    fn drop(&mut self) {
        let Some((state, entry_id)) = self.registration.take() else {
            return;
        };

        if let Some(state) = state.upgrade() {
            // No-op if the registration already completed.
            state.remove_entry(entry_id);
        }
    }
}

impl<T> fmt::Debug for Wait<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("registered", &self.registration.is_some())
            .finish()
    }
}
