//! Thin owned wrappers over the inotify and epoll syscalls.

use std::ffi::CStr;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Convert an optional duration into an epoll timeout.
///
/// `None` waits forever, `Duration::ZERO` polls without blocking.
fn timeout_millis(timeout: Option<Duration>) -> libc::c_int {
    timeout.map_or(-1, |timeout| {
        libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX)
    })
}

/// An owned inotify channel.
///
/// The descriptor is created in non-blocking mode and closed on drop.
pub struct Inotify(RawFd);

impl Inotify {
    /// Create a new inotify channel via `inotify_init1`.
    ///
    /// `IN_NONBLOCK` keeps reads from suspending outside the readiness wait,
    /// and `IN_CLOEXEC` prevents leaking the descriptor to child processes.
    ///
    /// # Errors
    /// Return the error reported by `inotify_init1`.
    pub fn init() -> io::Result<Self> {
        cvt(unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) }).map(Self)
    }

    #[must_use]
    pub const fn fd(&self) -> RawFd {
        self.0
    }

    /// Register `path` on this channel and return its watch descriptor.
    ///
    /// # Errors
    /// Return the error reported by `inotify_add_watch` (e.g. a missing path
    /// or the per-user watch limit).
    pub fn add_watch(&self, path: &CStr, mask: u32) -> io::Result<i32> {
        cvt(unsafe { libc::inotify_add_watch(self.0, path.as_ptr(), mask) })
    }

    /// Remove a watch from this channel.
    ///
    /// The kernel may still deliver one final `IN_IGNORED` record for the
    /// descriptor after this returns.
    ///
    /// # Errors
    /// Return the error reported by `inotify_rm_watch` (e.g. an unknown
    /// descriptor).
    pub fn rm_watch(&self, wd: i32) -> io::Result<()> {
        cvt(unsafe { libc::inotify_rm_watch(self.0, wd) }).map(drop)
    }

    /// Read pending event records into `buf`, returning the filled length.
    ///
    /// # Errors
    /// Return `WouldBlock` when the channel is drained, or the error reported
    /// by `read` otherwise.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.0, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            #[allow(clippy::cast_sign_loss)]
            Ok(n as usize)
        }
    }
}

impl Drop for Inotify {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}

/// An owned epoll readiness queue.
///
/// The descriptor is closed on drop.
pub struct Epoll(RawFd);

impl Epoll {
    /// Create a new readiness queue via `epoll_create1`.
    ///
    /// # Errors
    /// Return the error reported by `epoll_create1`.
    pub fn create() -> io::Result<Self> {
        cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) }).map(Self)
    }

    /// Register `fd` for edge-triggered read readiness.
    ///
    /// Must be called exactly once per queue lifetime for a given descriptor;
    /// the consumer is expected to drain the descriptor on every wake-up.
    ///
    /// # Errors
    /// Return the error reported by `epoll_ctl`.
    pub fn watch_reader(&self, fd: RawFd) -> io::Result<()> {
        #[allow(clippy::cast_sign_loss)]
        let mut ev = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLET) as u32,
            u64: fd as u64,
        };
        cvt(unsafe { libc::epoll_ctl(self.0, libc::EPOLL_CTL_ADD, fd, &mut ev) }).map(drop)
    }

    /// Block until at least one registered descriptor is ready, returning the
    /// number of ready descriptors (0 on timeout).
    ///
    /// Signal-interrupted waits (`EINTR`) are retried transparently.
    ///
    /// # Errors
    /// Return the error reported by `epoll_wait`.
    pub fn wait(
        &self,
        events: &mut [libc::epoll_event],
        timeout: Option<Duration>,
    ) -> io::Result<usize> {
        let timeout = timeout_millis(timeout);
        loop {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let n = unsafe {
                libc::epoll_wait(self.0, events.as_mut_ptr(), events.len() as libc::c_int, timeout)
            };
            if n >= 0 {
                #[allow(clippy::cast_sign_loss)]
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}
