use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the public `Session` surface.
///
/// `io::ErrorKind::WouldBlock` never appears here: an empty non-blocking
/// channel means "no more data this cycle" and is swallowed by the drain
/// loop. Signal-interrupted waits are retried transparently as well.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-side error. Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Creating the inotify channel or the epoll queue failed.
    #[error("failed to initialize notification resources")]
    Init(#[source] io::Error),
    /// A syscall failed, carrying the underlying errno.
    #[error("system call failed")]
    Os(#[from] io::Error),
    /// A record's declared name length runs past the end of the buffer, or
    /// the buffer ends in a partial header. Truncated records are rejected,
    /// never repaired.
    #[error("truncated event record at buffer offset {offset}")]
    Truncated { offset: usize },
    /// The kernel reported mask bits outside [`EventMask`](crate::EventMask).
    #[error("unrecognized event mask bits: {0:#x}")]
    UnknownMask(u32),
    /// The user handler failed. Not suppressed: aborts the active run cycle.
    #[error("event handler failed")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Operation attempted before any watch or loop setup.
    #[error("inotify channel has not been initialized yet")]
    NotInitialized,
}
