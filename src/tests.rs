use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::thread;
use std::thread::sleep;
use std::time::Duration;

use tempfile::tempdir;

use crate::errors::Error;
use crate::parse::{RecordIter, HEADER_LEN};
use crate::session::{Event, EventHandler, HandlerError, Session, WatchDescriptor};
use crate::{EventMask, WatchMask};

fn init_log() {
    let _ = pretty_env_logger::try_init();
}

/// Collects everything a session delivers.
#[derive(Default)]
struct Collector {
    events: Vec<Event>,
    batches: usize,
}

impl EventHandler for Collector {
    fn on_event(&mut self, event: Event) -> Result<(), HandlerError> {
        self.events.push(event);
        Ok(())
    }

    fn end_of_batch(&mut self) -> Result<(), HandlerError> {
        self.batches += 1;
        Ok(())
    }
}

/// Encode one wire record: 16-byte native-endian header plus a name NUL-padded
/// to `pad_to` bytes, the way the kernel lays records out.
fn encode_record(wd: i32, mask: u32, cookie: u32, name: &[u8], pad_to: usize) -> Vec<u8> {
    assert!(name.len() < pad_to || (name.is_empty() && pad_to == 0));
    let mut buf = Vec::with_capacity(HEADER_LEN + pad_to);
    buf.extend_from_slice(&wd.to_ne_bytes());
    buf.extend_from_slice(&mask.to_ne_bytes());
    buf.extend_from_slice(&cookie.to_ne_bytes());
    buf.extend_from_slice(&u32::try_from(pad_to).expect("to fit").to_ne_bytes());
    buf.extend_from_slice(name);
    buf.resize(HEADER_LEN + pad_to, 0);
    buf
}

#[test]
fn must_match_kernel_bit_encoding() {
    // Masks are passed through unmodified, so the numeric values must match
    // the kernel's encoding exactly.
    assert_eq!(EventMask::ACCESS.bits(), 0x1);
    assert_eq!(EventMask::MODIFY.bits(), 0x2);
    assert_eq!(EventMask::ATTRIB.bits(), 0x4);
    assert_eq!(EventMask::MOVED_FROM.bits(), 0x40);
    assert_eq!(EventMask::MOVED_TO.bits(), 0x80);
    assert_eq!(EventMask::CREATE.bits(), 0x100);
    assert_eq!(EventMask::DELETE.bits(), 0x200);
    assert_eq!(EventMask::Q_OVERFLOW.bits(), 0x4000);
    assert_eq!(EventMask::IGNORED.bits(), 0x8000);
    assert_eq!(EventMask::ISDIR.bits(), 0x4000_0000);
    assert_eq!(WatchMask::ONLYDIR.bits(), 0x0100_0000);
    assert_eq!(WatchMask::ONESHOT.bits(), 0x8000_0000);
}

#[test]
fn must_parse_concatenated_records() {
    let mut buf = encode_record(1, EventMask::CREATE.bits(), 0, b"a.txt", 16);
    buf.extend(encode_record(1, EventMask::DELETE.bits(), 0, b"b.txt", 16));
    // A record with no name, e.g. an event on the watched object itself.
    buf.extend(encode_record(2, EventMask::MOVE_SELF.bits(), 0, b"", 0));

    let records: Vec<_> = RecordIter::new(&buf)
        .collect::<Result<_, _>>()
        .expect("to parse");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].wd, 1);
    assert_eq!(records[0].mask, EventMask::CREATE.bits());
    assert_eq!(records[0].len, 16);
    assert_eq!(&records[0].name[..5], b"a.txt");
    assert_eq!(&records[1].name[..5], b"b.txt");
    assert_eq!(records[2].len, 0);
    assert!(records[2].name.is_empty());
}

#[test]
fn must_reject_partial_trailing_record() {
    let mut buf = encode_record(1, EventMask::CREATE.bits(), 0, b"a.txt", 16);
    let complete = buf.len();
    // Append a record whose declared name runs past the end of the buffer.
    let partial = encode_record(1, EventMask::DELETE.bits(), 0, b"b.txt", 16);
    buf.extend(&partial[..HEADER_LEN + 3]);

    let mut it = RecordIter::new(&buf);
    assert!(it.next().expect("to yield").is_ok());
    assert!(matches!(
        it.next().expect("to yield"),
        Err(Error::Truncated { offset }) if offset == complete
    ));
    assert!(it.next().is_none());
}

#[test]
fn must_reject_partial_header() {
    let buf = [0_u8; HEADER_LEN - 1];
    let mut it = RecordIter::new(&buf);
    assert!(matches!(
        it.next().expect("to yield"),
        Err(Error::Truncated { offset: 0 })
    ));
    assert!(it.next().is_none());
}

#[test]
fn must_round_trip_record_fields() {
    let raw = EventMask::CREATE.bits() | EventMask::ISDIR.bits();
    let buf = encode_record(7, raw, 42, b"some-dir", 16);
    let record = RecordIter::new(&buf)
        .next()
        .expect("to yield")
        .expect("to parse");
    let event = Event::from_record(record).expect("to be built");

    assert_eq!(event.wd, WatchDescriptor(7));
    assert_eq!(event.mask, EventMask::CREATE | EventMask::ISDIR);
    assert_eq!(event.raw_mask, raw);
    assert_eq!(event.cookie, 42);
    assert_eq!(event.len, 16);
    // Name is the original bytes up to the first NUL.
    assert_eq!(event.name, Some(OsString::from("some-dir")));
}

#[test]
fn must_reject_unknown_mask_bits() {
    // ONLYDIR is a registration modifier; the kernel never reports it.
    let buf = encode_record(1, WatchMask::ONLYDIR.bits(), 0, b"", 0);
    let record = RecordIter::new(&buf)
        .next()
        .expect("to yield")
        .expect("to parse");
    assert!(matches!(
        Event::from_record(record),
        Err(Error::UnknownMask(_))
    ));
}

#[test]
fn must_reject_empty_mask() {
    let mut session = Session::new();
    assert!(matches!(
        session.add_watch(".", WatchMask::empty()),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn must_fail_remove_before_init() {
    let mut session = Session::new();
    assert!(matches!(
        session.remove_watch(WatchDescriptor(1)),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn must_add_and_remove_watch() {
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();

    // An add/remove pair leaves no watch entry behind; repeating it works.
    let wd = session
        .add_watch(dir.path(), WatchMask::ALL_EVENTS)
        .expect("to be watched");
    session.remove_watch(wd).expect("to be removed");
    let wd = session
        .add_watch(dir.path(), WatchMask::ALL_EVENTS)
        .expect("to be watched again");
    session.remove_watch(wd).expect("to be removed again");
}

#[test]
fn must_fail_remove_unknown_wd() {
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();
    session
        .add_watch(dir.path(), WatchMask::CREATE)
        .expect("to be watched");

    assert!(matches!(
        session.remove_watch(WatchDescriptor(12345)),
        Err(Error::Os(_))
    ));
}

#[test]
fn must_return_from_empty_nonblocking_step() {
    init_log();
    let mut session = Session::new();
    let mut collector = Collector::default();

    session
        .step(Some(Duration::ZERO), &mut collector)
        .expect("to step");

    // Nothing pending: the event callback stays silent, the per-cycle one
    // still runs once.
    assert!(collector.events.is_empty());
    assert_eq!(collector.batches, 1);
    assert!(session.is_armed());
}

#[test]
fn must_receive_create_event() {
    init_log();
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();
    let wd = session
        .add_watch(dir.path(), WatchMask::CREATE | WatchMask::DELETE)
        .expect("to be watched");

    File::create(dir.path().join("a.txt")).expect("to be created");

    let mut collector = Collector::default();
    session
        .step(Some(Duration::from_secs(5)), &mut collector)
        .expect("to step");

    assert_eq!(collector.events.len(), 1);
    let event = &collector.events[0];
    assert_eq!(event.wd, wd);
    assert!(event.mask.contains(EventMask::CREATE));
    assert_eq!(event.name, Some(OsString::from("a.txt")));
    assert_eq!(collector.batches, 1);
}

#[test]
fn must_pair_rename_cookies() {
    init_log();
    let dir = tempdir().expect("to be created");
    let from = dir.path().join("a.txt");
    let to = dir.path().join("b.txt");
    File::create(&from).expect("to be created");

    let mut session = Session::new();
    session
        .add_watch(dir.path(), WatchMask::MOVE)
        .expect("to be watched");

    fs::rename(&from, &to).expect("to be renamed");

    let mut collector = Collector::default();
    session
        .step(Some(Duration::from_secs(5)), &mut collector)
        .expect("to step");

    // Both halves of the rename arrive in order, linked by one cookie.
    assert_eq!(collector.events.len(), 2);
    let event_fst = &collector.events[0];
    let event_snd = &collector.events[1];
    assert!(event_fst.mask.contains(EventMask::MOVED_FROM));
    assert_eq!(event_fst.name, Some(OsString::from("a.txt")));
    assert!(event_snd.mask.contains(EventMask::MOVED_TO));
    assert_eq!(event_snd.name, Some(OsString::from("b.txt")));
    assert_ne!(event_fst.cookie, 0);
    assert_eq!(event_fst.cookie, event_snd.cookie);
}

#[test]
fn must_abort_on_handler_error() {
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();
    session
        .add_watch(dir.path(), WatchMask::CREATE)
        .expect("to be watched");

    File::create(dir.path().join("a.txt")).expect("to be created");

    let result = session.step(
        Some(Duration::from_secs(5)),
        &mut |_event: Event| -> Result<(), HandlerError> { Err("handler refused".into()) },
    );
    assert!(matches!(result, Err(Error::Handler(_))));

    // A handler failure does not tear the session down by itself.
    assert!(session.is_armed());
    session.stop();
}

#[test]
fn must_stop_twice() {
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();
    session
        .add_watch(dir.path(), WatchMask::CREATE)
        .expect("to be watched");
    let mut collector = Collector::default();
    session
        .step(Some(Duration::ZERO), &mut collector)
        .expect("to step");
    assert!(session.is_armed());

    session.stop();
    session.stop();

    // Both descriptors are gone; the session is back to its initial state.
    assert!(!session.is_armed());
    assert!(matches!(
        session.remove_watch(WatchDescriptor(1)),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn must_shutdown_blocking_run_from_thread() {
    init_log();
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();
    session
        .add_watch(dir.path(), WatchMask::CREATE)
        .expect("to be watched");

    let handle = session.handle();
    let shutdown_thread = thread::spawn(move || {
        sleep(Duration::from_millis(50));
        handle.shutdown();
    });

    // Returns normally once it observes the cleared flag at an iteration
    // boundary.
    let mut collector = Collector::default();
    session
        .run(Some(Duration::from_millis(10)), &mut collector)
        .expect("to unwind");
    assert!(collector.batches >= 1);

    shutdown_thread.join().expect("to join");
    session.stop();
}

#[test]
fn must_resume_after_shutdown_without_rearming() {
    let dir = tempdir().expect("to be created");
    let mut session = Session::new();
    session
        .add_watch(dir.path(), WatchMask::CREATE | WatchMask::DELETE)
        .expect("to be watched");

    // First pass arms; shutting down only clears the run flag.
    let mut collector = Collector::default();
    session
        .step(Some(Duration::ZERO), &mut collector)
        .expect("to step");
    session.handle().shutdown();
    assert!(session.is_armed());

    // Watches survive a shutdown (unlike a stop) and further passes still
    // deliver.
    File::create(dir.path().join("a.txt")).expect("to be created");
    session
        .step(Some(Duration::from_secs(5)), &mut collector)
        .expect("to step");
    assert_eq!(collector.events.len(), 1);
    assert!(collector.events[0].mask.contains(EventMask::CREATE));
}

#[test]
fn must_format_events() {
    let raw = EventMask::CREATE.bits() | EventMask::ISDIR.bits();
    let buf = encode_record(3, raw, 0, b"new-dir", 16);
    let record = RecordIter::new(&buf)
        .next()
        .expect("to yield")
        .expect("to parse");
    let event = Event::from_record(record).expect("to be built");

    let formatted = event.to_string();
    assert!(formatted.contains("wd 3"));
    assert!(formatted.contains("CREATE"));
    assert!(formatted.contains("ISDIR"));
    assert!(formatted.contains("new-dir"));
}

#[test]
fn must_keep_sessions_independent() {
    let dir_a = tempdir().expect("to be created");
    let dir_b = tempdir().expect("to be created");
    let mut session_a = Session::new();
    let mut session_b = Session::new();
    session_a
        .add_watch(dir_a.path(), WatchMask::CREATE)
        .expect("to be watched");
    session_b
        .add_watch(dir_b.path(), WatchMask::CREATE)
        .expect("to be watched");

    // Each session only sees changes under its own watches.
    File::create(dir_a.path().join("a.txt")).expect("to be created");

    let mut collector_a = Collector::default();
    let mut collector_b = Collector::default();
    session_a
        .step(Some(Duration::from_secs(5)), &mut collector_a)
        .expect("to step");
    session_b
        .step(Some(Duration::ZERO), &mut collector_b)
        .expect("to step");

    assert_eq!(collector_a.events.len(), 1);
    assert!(collector_b.events.is_empty());
}
