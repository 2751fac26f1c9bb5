//! Watch and event mask bits.
//!
//! Bit values come straight from the kernel's `IN_*` encoding, so masks can
//! be exchanged with any other inotify consumer unmodified.

use std::fmt::{Display, Formatter};

bitflags::bitflags! {
  /// Event kinds and registration modifiers accepted by
  /// [`Session::add_watch`](crate::Session::add_watch).
  #[repr(C)]
  pub struct WatchMask: u32 {
    const ACCESS = libc::IN_ACCESS;
    const ATTRIB = libc::IN_ATTRIB;
    const CLOSE_WRITE = libc::IN_CLOSE_WRITE;
    const CLOSE_NOWRITE = libc::IN_CLOSE_NOWRITE;
    const CLOSE = libc::IN_CLOSE;
    const CREATE = libc::IN_CREATE;
    const DELETE = libc::IN_DELETE;
    const DELETE_SELF = libc::IN_DELETE_SELF;
    const MODIFY = libc::IN_MODIFY;
    const MOVE_SELF = libc::IN_MOVE_SELF;
    const MOVED_FROM = libc::IN_MOVED_FROM;
    const MOVED_TO = libc::IN_MOVED_TO;
    const MOVE = libc::IN_MOVE;
    const OPEN = libc::IN_OPEN;
    const ALL_EVENTS = libc::IN_ALL_EVENTS;

    // Registration modifiers. Never reported back in events.
    const DONT_FOLLOW = libc::IN_DONT_FOLLOW;
    const EXCL_UNLINK = libc::IN_EXCL_UNLINK;
    const MASK_ADD = libc::IN_MASK_ADD;
    const ONESHOT = libc::IN_ONESHOT;
    const ONLYDIR = libc::IN_ONLYDIR;
  }
}

bitflags::bitflags! {
  /// Event kinds reported in [`Event::mask`](crate::Event).
  ///
  /// Superset of the requestable event bits: the kernel may additionally
  /// report `IGNORED`, `ISDIR`, `Q_OVERFLOW` and `UNMOUNT`.
  #[repr(C)]
  pub struct EventMask: u32 {
    const ACCESS = libc::IN_ACCESS;
    const ATTRIB = libc::IN_ATTRIB;
    const CLOSE_WRITE = libc::IN_CLOSE_WRITE;
    const CLOSE_NOWRITE = libc::IN_CLOSE_NOWRITE;
    const CLOSE = libc::IN_CLOSE;
    const CREATE = libc::IN_CREATE;
    const DELETE = libc::IN_DELETE;
    const DELETE_SELF = libc::IN_DELETE_SELF;
    const MODIFY = libc::IN_MODIFY;
    const MOVE_SELF = libc::IN_MOVE_SELF;
    const MOVED_FROM = libc::IN_MOVED_FROM;
    const MOVED_TO = libc::IN_MOVED_TO;
    const MOVE = libc::IN_MOVE;
    const OPEN = libc::IN_OPEN;
    const IGNORED = libc::IN_IGNORED;
    const ISDIR = libc::IN_ISDIR;
    const Q_OVERFLOW = libc::IN_Q_OVERFLOW;
    const UNMOUNT = libc::IN_UNMOUNT;
  }
}

impl Display for EventMask {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.contains(Self::ACCESS) {
            let _d = write!(f, "ACCESS ");
        }
        if self.contains(Self::ATTRIB) {
            let _d = write!(f, "ATTRIB ");
        }
        if self.contains(Self::CLOSE_WRITE) {
            let _d = write!(f, "CLOSE_WRITE ");
        }
        if self.contains(Self::CLOSE_NOWRITE) {
            let _d = write!(f, "CLOSE_NOWRITE ");
        }
        if self.contains(Self::CREATE) {
            let _d = write!(f, "CREATE ");
        }
        if self.contains(Self::DELETE) {
            let _d = write!(f, "DELETE ");
        }
        if self.contains(Self::DELETE_SELF) {
            let _d = write!(f, "DELETE_SELF ");
        }
        if self.contains(Self::MODIFY) {
            let _d = write!(f, "MODIFY ");
        }
        if self.contains(Self::MOVE_SELF) {
            let _d = write!(f, "MOVE_SELF ");
        }
        if self.contains(Self::MOVED_FROM) {
            let _d = write!(f, "MOVED_FROM ");
        }
        if self.contains(Self::MOVED_TO) {
            let _d = write!(f, "MOVED_TO ");
        }
        if self.contains(Self::OPEN) {
            let _d = write!(f, "OPEN ");
        }
        if self.contains(Self::IGNORED) {
            let _d = write!(f, "IGNORED ");
        }
        if self.contains(Self::ISDIR) {
            let _d = write!(f, "ISDIR ");
        }
        if self.contains(Self::Q_OVERFLOW) {
            let _d = write!(f, "Q_OVERFLOW ");
        }
        if self.contains(Self::UNMOUNT) {
            let _d = write!(f, "UNMOUNT ");
        }
        write!(f, "")
    }
}
