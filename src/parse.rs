//! Record-by-record parsing of the inotify byte stream.
//!
//! A read returns one or more concatenated records, each a 16-byte header
//! (`struct inotify_event`: wd, mask, cookie, len) followed by `len` bytes of
//! NUL-padded name. Records must be walked using each header's declared `len`
//! to find the next offset.

use crate::errors::{Error, Result};

/// `sizeof(struct inotify_event)` without the flexible name member.
pub(crate) const HEADER_LEN: usize = 16;

/// Read buffer length. Holds several records; at minimum one maximal record
/// (header + NAME_MAX + 1) so the kernel never has to truncate.
pub(crate) const READ_BUF_LEN: usize = 4096;

/// One decoded record header with its borrowed (still NUL-padded) name bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawRecord<'a> {
    pub wd: i32,
    pub mask: u32,
    pub cookie: u32,
    pub len: u32,
    pub name: &'a [u8],
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Iterator over the records of one filled read buffer.
///
/// Yields every well-formed record in kernel order. A buffer ending in a
/// partial header or a short name yields the records before it followed by a
/// single [`Error::Truncated`]; partial records are rejected, never repaired.
pub(crate) struct RecordIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> RecordIter<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset == self.buf.len() {
            return None;
        }
        let offset = self.offset;
        let rest = &self.buf[offset..];
        if rest.len() < HEADER_LEN {
            self.offset = self.buf.len();
            return Some(Err(Error::Truncated { offset }));
        }

        let len = u32_at(rest, 12);
        let end = HEADER_LEN + len as usize;
        if rest.len() < end {
            self.offset = self.buf.len();
            return Some(Err(Error::Truncated { offset }));
        }

        self.offset += end;
        let wd = i32::from_ne_bytes([rest[0], rest[1], rest[2], rest[3]]);
        Some(Ok(RawRecord {
            wd,
            mask: u32_at(rest, 4),
            cookie: u32_at(rest, 8),
            len,
            name: &rest[HEADER_LEN..end],
        }))
    }
}
