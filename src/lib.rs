//! Callback-based [inotify](https://man7.org/linux/man-pages/man7/inotify.7.html)
//! + epoll event loop bindings.
//!
//! Register interest in filesystem paths and receive a stream of structured
//! change events (create, delete, modify, move, attribute change, ...)
//! through a callback, without polling. A [`Session`] owns one inotify
//! channel and one epoll readiness queue; both are created lazily and torn
//! down by [`Session::stop`].
//!
//! ## Features
//!
//! - Single-pass [`Session::step`] for embedding into an existing scheduler.
//! - Blocking [`Session::run`] stoppable from another thread via
//!   [`SessionHandle::shutdown`].
//! - Mask bits are the kernel's exact `IN_*` encoding, wire-compatible with
//!   any other inotify consumer.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use inotify_loop::{Event, HandlerError, Session, WatchMask};
//!
//! # fn main() -> inotify_loop::Result<()> {
//! let mut session = Session::new();
//! session.add_watch(".", WatchMask::CREATE | WatchMask::DELETE)?;
//!
//! // One non-blocking poll-and-dispatch pass.
//! session.step(
//!     Some(Duration::ZERO),
//!     &mut |event: Event| -> Result<(), HandlerError> {
//!         println!("{}", event);
//!         Ok(())
//!     },
//! )?;
//!
//! session.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform support
//!
//! Linux only. Retargeting to another notification backend (kqueue,
//! `FSEvents`, change journals) is out of scope.
//!
//! ## License
//!
//! This project is licensed under MIT License.

pub mod errors;
pub mod ffi;
pub mod flags;
mod parse;
pub mod session;
#[cfg(test)]
mod tests;

pub use errors::{Error, Result};
pub use flags::{EventMask, WatchMask};
pub use session::{
    Event, EventHandler, HandlerError, Session, SessionHandle, WatchDescriptor, DEFAULT_TIMEOUT,
};
