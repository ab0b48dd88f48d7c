use std::fmt;
use std::rc::Rc;

/// A callback that can be registered with an [`Emitter<T>`][crate::Emitter].
///
/// A listener has identity: clones of a `Listener` refer to the same callback and count as the
/// same registration, whereas two listeners created from identical closures are distinct. Keep a
/// clone around if you want to remove the listener later.
///
/// # Example
///
/// ```rust
/// use event_emitter::{Emitter, Listener};
///
/// let emitter = Emitter::<String>::new();
/// let listener = Listener::new(|message: &String| println!("received {message}"));
///
/// emitter.add(&listener);
/// emitter.add(&listener.clone()); // Same identity, so this does nothing.
/// assert_eq!(emitter.len(), 1);
///
/// emitter.remove(&listener);
/// assert!(emitter.is_empty());
/// ```
pub struct Listener<T> {
    callback: Rc<dyn Fn(&T)>,
}

impl<T> Listener<T> {
    /// Creates a listener with a new identity from a callback.
    #[must_use]
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + 'static,
    {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Whether two listener handles refer to the same callback.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    pub(crate) fn call(&self, value: &T) {
        (self.callback)(value);
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("callback", &Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}
