#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Single-threaded publish/subscribe for one type of event.
//!
//! An [`Emitter<T>`] keeps an ordered registry of [`Listener<T>`]s and, whenever a value is
//! emitted, invokes every listener that was registered when the dispatch began, in registration
//! order, on the calling thread.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides mechanisms for
//! high-performance hardware-aware programming in Rust.
//!
//! # Operations
//!
//! * [`Emitter::add()`] registers a listener. Registering the same listener twice does nothing.
//! * [`Emitter::remove()`] and [`Emitter::remove_all()`] unregister listeners.
//! * [`Emitter::emit()`] delivers a value to the registered listeners.
//! * [`Emitter::once()`] registers a listener that is removed after it has been invoked once.
//! * [`Emitter::wait()`] returns a [`Wait<T>`] future that resolves with the next emitted value.
//! * [`Emitter::emitted()`] tells whether anything was ever emitted.
//!
//! Registrations can be tied to a [`CancellationToken`] via [`ListenerOptions`], removing them
//! when the token is cancelled.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use event_emitter::{CancellationToken, Emitter, Listener, ListenerOptions};
//!
//! let emitter = Emitter::<(u32, &'static str)>::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let logger = Listener::new({
//!     let log = Rc::clone(&log);
//!     move |(id, status): &(u32, &'static str)| log.borrow_mut().push(format!("{id}: {status}"))
//! });
//!
//! let token = CancellationToken::new();
//! emitter.add_with_options(&logger, &ListenerOptions::new().cancel_on(&token));
//!
//! emitter.emit((1, "started"));
//! token.cancel();
//! emitter.emit((1, "finished"));
//!
//! assert_eq!(*log.borrow(), vec!["1: started".to_string()]);
//! ```
//!
//! # Listener panics
//!
//! A listener that panics does not stop the dispatch or damage the emitter. The panic is caught,
//! reported via `tracing` and re-surfaced outside the dispatch by an [`EscalatePanic`]
//! implementation, configurable via [`Emitter::builder()`].

mod builder;
mod cancellation;
mod emitter;
mod escalation;
mod listener;
mod options;
mod wait;

pub use builder::*;
pub use cancellation::*;
pub(crate) use emitter::{EmitterState, EntryId};
pub use emitter::*;
pub use escalation::*;
pub use listener::*;
pub use options::*;
pub(crate) use wait::{WaitResult, WaitSlot};
pub use wait::*;
