//! Callback-driven inotify session: watch registration and the
//! wait/read/dispatch loop.

use std::ffi::{CString, OsStr, OsString};
use std::fmt::{Display, Formatter};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::errors::{Error, Result};
use crate::ffi::{Epoll, Inotify};
use crate::flags::{EventMask, WatchMask};
use crate::parse::{RawRecord, RecordIter, READ_BUF_LEN};

/// Default readiness-wait bound used by callers that have no opinion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Ready-descriptor buffer length. One session registers a single
/// descriptor, so this is generous.
const MAX_READY: usize = 10;

/// Identifier of one registered watch.
///
/// Unique among the active watches of its session; invalid (and reusable by
/// the kernel) once removed or once an `IGNORED` event reports it gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchDescriptor(pub(crate) i32);

impl Display for WatchDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One filesystem change notification.
///
/// `name` is the affected directory entry, present only for events on an
/// entry inside a watched directory. `raw_mask` preserves the kernel's exact
/// bits next to the parsed `mask`, and `len` the record's declared
/// (NUL-padded) name length.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Event {
    pub wd: WatchDescriptor,
    pub mask: EventMask,
    pub raw_mask: u32,
    pub cookie: u32,
    pub len: u32,
    pub name: Option<OsString>,
}

impl Event {
    pub(crate) fn from_record(record: RawRecord<'_>) -> Result<Self> {
        let mask = EventMask::from_bits(record.mask).ok_or(Error::UnknownMask(record.mask))?;
        let name = if record.len == 0 {
            None
        } else {
            let end = record
                .name
                .iter()
                .position(|b| *b == 0)
                .unwrap_or(record.name.len());
            Some(OsStr::from_bytes(&record.name[..end]).to_os_string())
        };
        Ok(Self {
            wd: WatchDescriptor(record.wd),
            mask,
            raw_mask: record.mask,
            cookie: record.cookie,
            len: record.len,
            name,
        })
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[wd {}] name: {:?}, mask: {}({:x}), cookie: {}",
            self.wd, self.name, self.mask, self.raw_mask, self.cookie
        )
    }
}

/// Error type returned by [`EventHandler`] callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of dispatched events.
///
/// A returned error is not suppressed: it aborts the active
/// [`step`](Session::step)/[`run`](Session::run) call and surfaces as
/// [`Error::Handler`]. No event is buffered or replayed after a failed
/// delivery.
pub trait EventHandler {
    /// Receive one event. Events arrive in the exact order the kernel
    /// queued them.
    fn on_event(&mut self, event: Event) -> std::result::Result<(), HandlerError>;

    /// Called once per wake-up cycle after all pending records are
    /// delivered, including cycles that timed out with nothing to deliver.
    fn end_of_batch(&mut self) -> std::result::Result<(), HandlerError> {
        Ok(())
    }
}

impl<F> EventHandler for F
where
    F: FnMut(Event) -> std::result::Result<(), HandlerError>,
{
    fn on_event(&mut self, event: Event) -> std::result::Result<(), HandlerError> {
        self(event)
    }
}

/// An owned permission to stop a running [`Session`] loop.
///
/// `shutdown` clears the run flag; a blocking [`run`](Session::run) unwinds
/// and returns normally once it observes the flag at its next iteration
/// boundary. An in-progress wait with a long timeout is not preempted.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    running: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Ask the session loop to unwind.
    ///
    /// Calling this method multiple times has no extra effect and won't
    /// cause any panic, error, or undefined behavior.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// A single-subscriber notification session.
///
/// Owns one inotify channel and one epoll queue, both created lazily: the
/// channel on the first [`add_watch`](Session::add_watch), the queue on the
/// first [`step`](Session::step)/[`run`](Session::run). [`stop`](Session::stop)
/// closes both, after which the next use re-initializes from scratch.
///
/// All state is per-session; independent sessions do not interfere. A
/// session is single-threaded by construction (`&mut self` everywhere);
/// only [`SessionHandle`] may be shared across threads.
pub struct Session {
    inotify: Option<Inotify>,
    epoll: Option<Epoll>,
    running: Arc<AtomicBool>,
    read_buf: Vec<u8>,
    ready_buf: Vec<libc::epoll_event>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inotify: None,
            epoll: None,
            running: Arc::new(AtomicBool::new(false)),
            read_buf: vec![0; READ_BUF_LEN],
            ready_buf: vec![libc::epoll_event { events: 0, u64: 0 }; MAX_READY],
        }
    }

    /// Whether the channel and queue currently exist and are wired up.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.epoll.is_some()
    }

    /// Obtain a [`SessionHandle`] for stopping a blocking [`run`](Session::run)
    /// from another thread or from within a handler.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            running: Arc::clone(&self.running),
        }
    }

    fn channel(&mut self) -> Result<&Inotify> {
        if self.inotify.is_none() {
            self.inotify = Some(Inotify::init().map_err(Error::Init)?);
            debug!("Created inotify channel");
        }
        self.inotify.as_ref().ok_or(Error::NotInitialized)
    }

    /// Register `path` and return its watch descriptor.
    ///
    /// Creates the inotify channel if this session has none yet.
    ///
    /// # Errors
    /// Return [`Error::InvalidArgument`] for an empty mask or a path with an
    /// interior NUL, [`Error::Init`] when channel creation fails, and
    /// [`Error::Os`] when the kernel rejects the registration.
    pub fn add_watch(&mut self, path: impl AsRef<Path>, mask: WatchMask) -> Result<WatchDescriptor> {
        if mask.is_empty() {
            return Err(Error::InvalidArgument("mask must contain at least one bit"));
        }
        let path = CString::new(path.as_ref().as_os_str().as_bytes())
            .map_err(|_| Error::InvalidArgument("path contains an interior NUL byte"))?;

        let wd = self.channel()?.add_watch(&path, mask.bits())?;
        debug!("Watching {:?} as wd {}", path, wd);
        Ok(WatchDescriptor(wd))
    }

    /// Remove a previously registered watch.
    ///
    /// On success the descriptor must be treated as invalid, although the
    /// kernel may still deliver one final `IGNORED` event for it.
    ///
    /// # Errors
    /// Return [`Error::NotInitialized`] when no channel exists yet and
    /// [`Error::Os`] when the kernel rejects the descriptor.
    pub fn remove_watch(&mut self, wd: WatchDescriptor) -> Result<()> {
        let inotify = self.inotify.as_ref().ok_or(Error::NotInitialized)?;
        inotify.rm_watch(wd.0)?;
        debug!("Removed wd {}", wd.0);
        Ok(())
    }

    /// Create the epoll queue and register the channel with it, once.
    ///
    /// Idempotent: repeated `step`/`run` calls never re-register.
    fn arm(&mut self) -> Result<()> {
        if self.epoll.is_some() {
            return Ok(());
        }
        let fd = self.channel()?.fd();
        let epoll = Epoll::create().map_err(Error::Init)?;
        epoll.watch_reader(fd)?;
        self.epoll = Some(epoll);
        debug!("Armed readiness queue");
        Ok(())
    }

    /// Perform one wait/read/dispatch cycle and return.
    ///
    /// Arms the session lazily, waits up to `timeout` (`None` = forever,
    /// `Duration::ZERO` = non-blocking poll) for the channel to become
    /// readable, then drains it: records are parsed and delivered in kernel
    /// order until a read reports no more data this cycle. Finally the
    /// handler's [`end_of_batch`](EventHandler::end_of_batch) runs once,
    /// whether or not anything was delivered.
    ///
    /// A timeout with no pending events is success with no dispatch. This is
    /// the composition primitive: embed it into an existing scheduler, or
    /// let [`run`](Session::run) loop it.
    ///
    /// # Errors
    /// Return [`Error::Init`]/[`Error::Os`] for kernel failures,
    /// [`Error::Truncated`]/[`Error::UnknownMask`] for malformed records and
    /// [`Error::Handler`] when the handler fails. Any error aborts the cycle
    /// immediately; descriptors stay armed until an explicit
    /// [`stop`](Session::stop).
    pub fn step(
        &mut self,
        timeout: Option<Duration>,
        handler: &mut dyn EventHandler,
    ) -> Result<()> {
        self.arm()?;
        let epoll = self.epoll.as_ref().ok_or(Error::NotInitialized)?;
        let inotify = self.inotify.as_ref().ok_or(Error::NotInitialized)?;

        let ready = epoll.wait(&mut self.ready_buf, timeout)?;
        for _ in 0..ready {
            // Edge-triggered registration: drain the channel completely
            // before the next wait.
            loop {
                let n = match inotify.read(&mut self.read_buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => return Err(e.into()),
                };
                debug!("Read {} byte(s) of event records", n);
                for record in RecordIter::new(&self.read_buf[..n]) {
                    let event = Event::from_record(record?)?;
                    handler.on_event(event).map_err(Error::Handler)?;
                }
            }
        }
        handler.end_of_batch().map_err(Error::Handler)?;
        Ok(())
    }

    /// Run [`step`](Session::step) cycles until a [`SessionHandle`] asks the
    /// loop to unwind, then return normally.
    ///
    /// The stop flag is observed only at iteration boundaries; `timeout`
    /// bounds each wait step, not the whole run, so it also bounds how long
    /// a shutdown request can go unobserved.
    ///
    /// # Errors
    /// Any error from a cycle aborts the loop immediately; see
    /// [`step`](Session::step).
    pub fn run(
        &mut self,
        timeout: Option<Duration>,
        handler: &mut dyn EventHandler,
    ) -> Result<()> {
        self.arm()?;
        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            self.step(timeout, handler)?;
        }
        debug!("Run loop unwound");
        Ok(())
    }

    /// Tear the session down: clear the run flag and close both the channel
    /// and the queue. All watch descriptors become invalid; the next use
    /// re-initializes from scratch.
    ///
    /// Idempotent: calling it on an already stopped session is a no-op.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if self.epoll.take().is_some() | self.inotify.take().is_some() {
            debug!("Session stopped; descriptors released");
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
