use crate::CancellationToken;

/// Configuration accepted by the registration operations of [`Emitter<T>`][crate::Emitter].
///
/// The only recognized option is a [`CancellationToken`] that removes the registration when
/// cancelled.
///
/// # Example
///
/// ```rust
/// use event_emitter::{CancellationToken, Emitter, Listener, ListenerOptions};
///
/// let emitter = Emitter::<u32>::new();
/// let token = CancellationToken::new();
///
/// emitter.add_with_options(
///     &Listener::new(|_: &u32| {}),
///     &ListenerOptions::new().cancel_on(&token),
/// );
/// assert_eq!(emitter.len(), 1);
///
/// token.cancel();
/// assert!(emitter.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct ListenerOptions {
    cancellation: Option<CancellationToken>,
}

impl ListenerOptions {
    /// Creates options with nothing set. Registering with these is the same as registering
    /// without options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the registration when `token` is cancelled.
    ///
    /// If the token is already cancelled at registration time, the registration is removed
    /// immediately and the listener is never invoked.
    pub fn cancel_on(mut self, token: &CancellationToken) -> Self {
        self.cancellation = Some(token.clone());
        self
    }

    /// The cancellation token, if one was set.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_cancellation() {
        assert!(ListenerOptions::new().cancellation().is_none());
    }

    #[test]
    fn cancel_on_shares_token_state() {
        let token = CancellationToken::new();
        let options = ListenerOptions::new().cancel_on(&token);

        token.cancel();

        assert!(options.cancellation().is_some_and(CancellationToken::is_cancelled));
    }
}
