//!
//! # Promises for Rust, the JavaScript way
//!
//! This crate provides a single-threaded deferred-computation primitive modelled
//! on ECMAScript promises: an object standing for a result that may not be
//! known yet, with chained transformation and multi-promise composition.
//!
//! ## Features
//! - Settle-once state machine: pending, then fulfilled with a `T` or rejected with an `E`
//! - Chaining with [`then`](Promise::then), [`and_then`](Promise::and_then),
//!   [`catch`](Promise::catch), [`map`](Promise::map) and [`map_err`](Promise::map_err)
//! - Thenable adoption: callbacks may return another promise (or any [`Thenable`])
//!   and the derived promise follows it
//! - Combinators: [`Promise::all`], [`Promise::race`]
//! - Reactions always run asynchronously, on an injectable [`Schedule`]r
//! - [`Settled`] bridges a promise into a `std::future::Future`
//!
//! ## Example
//! ```
//! use thenable::{run_until_idle, Promise, Resolution};
//!
//! let p = Promise::<i32, String>::new(|resolve, _| {
//!     resolve.resolve(5);
//!     Ok(())
//! })
//! .map(|v| Ok(v + 1))
//! .and_then(|_| Err::<Resolution<String, _>, _>("x".to_string()))
//! .catch(|message| Ok(Resolution::Value(message)));
//!
//! // Nothing has run yet: reactions wait for the scheduler.
//! assert!(p.is_pending());
//! run_until_idle().unwrap();
//! assert_eq!(p.try_result(), Some(Ok("x".to_string())));
//! ```
//!
//! ## Error Handling
//! Rejection reasons are whatever `E` you choose. Executors and reaction
//! callbacks "throw" by returning `Err(reason)`, which rejects the nearest
//! promise. The crate's own failures, such as a panicking task or an abandoned
//! observer, are reported through [`Error`].
//!
//! ## Scheduling
//! Every promise belongs to a [`Runtime`]. The default runtime queues work on a
//! per-thread [`TaskQueue`] that nothing drains implicitly: call
//! [`run_until_idle`] (or step the queue yourself) from your event loop.

#![warn(missing_docs)]

mod combinators;
mod promise;
mod resolution;
mod runtime;
mod scheduler;
mod settled;


pub use promise::{Promise, Rejecter, Resolver, Status};
pub use resolution::{Outcome, Resolution, Thenable};
pub use runtime::Runtime;
pub use scheduler::{run_until_idle, Schedule, Task, TaskQueue};
pub use settled::Settled;

/// Errors raised by the promise machinery itself.
///
/// These never stand in for rejection reasons, which are always the
/// promise's own `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The promise was dropped while pending, so its outcome will never arrive.
    #[error("promise was dropped before it settled")]
    Abandoned,
    /// A scheduled task panicked while running.
    #[error("a scheduled task panicked")]
    Panicked,
}
