use active_probe::kernel::telemetry::{EventSink, LogEvent, Tag};
use std::sync::Arc;
use std::thread;

#[test]
fn test_capacity_drops_overflow_silently() {
    let sink = EventSink::in_memory(5);

    for i in 0..8 {
        sink.append(Tag::Tr, format!("call {}", i));
    }

    assert_eq!(sink.written(), 5, "Only the first N events are kept");
    assert_eq!(sink.dropped(), 3, "Overflow is counted, not written");
    let events = sink.events();
    assert_eq!(events.first().map(|e| e.message.as_str()), Some("call 0"));
    assert_eq!(events.last().map(|e| e.message.as_str()), Some("call 4"));
}

#[test]
fn test_concurrent_appends_respect_capacity() {
    let sink = Arc::new(EventSink::in_memory(500));

    let workers: Vec<_> = (0..8)
        .map(|w| {
            let sink = sink.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    sink.append(Tag::Ep, format!("worker {} call {}", w, i));
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(sink.written(), 500);
    assert_eq!(sink.dropped(), 300);
    // Lines are whole: one mutex guards every write.
    assert!(sink.lines().iter().all(|l| l.contains("] [EP][T") && l.contains(" call ")));
}

#[test]
fn test_line_format() {
    let event = LogEvent::now(Tag::Mark, "===== MARK =====");
    let line = event.to_string();

    // [HH:MM:SS.mmm] [MARK][T<n>] msg
    assert_eq!(&line[0..1], "[");
    assert_eq!(&line[3..4], ":");
    assert_eq!(&line[6..7], ":");
    assert_eq!(&line[9..10], ".");
    assert_eq!(&line[13..15], "] ");
    assert!(
        line[15..].starts_with(&format!("[MARK][T{}] ", event.thread_id)),
        "unexpected line: {}",
        line
    );
    assert!(line.ends_with("===== MARK ====="));
}

#[test]
fn test_disabled_sink_is_a_no_op() {
    let sink = EventSink::disabled();
    sink.append(Tag::Init, "hello");

    assert!(!sink.is_enabled());
    assert_eq!(sink.written(), 0);
    assert_eq!(sink.dropped(), 0, "Disabled sink does not count drops");
    assert!(sink.events().is_empty());
    assert!(sink.path().is_none());
}

#[test]
fn test_file_sink_writes_header_and_lines() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("probe").join("logs");
    let sink = EventSink::to_file(&logs, 2).unwrap();

    sink.append(Tag::Init, "first");
    sink.append(Tag::Init, "second");
    sink.append(Tag::Init, "third");

    let path = sink.path().expect("file sink has a path");
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("active_probe_") && name.ends_with(".log"), "{}", name);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "Header plus two capped lines: {:?}", lines);
    assert_eq!(lines[0], format!("[FileLog] {}", path.display()));
    assert!(lines[1].contains("] [INIT][T") && lines[1].ends_with("first"));
    assert!(lines[2].ends_with("second"));
    assert_eq!(sink.written(), 2, "Header does not count against capacity");
    assert_eq!(sink.dropped(), 1);
}

#[test]
fn test_file_sink_fails_on_unusable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "x").unwrap();

    assert!(EventSink::to_file(&blocker.join("logs"), 10).is_err());
}
