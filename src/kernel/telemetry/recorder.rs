use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::event::{LogEvent, Tag};

pub const DEFAULT_CAPACITY: usize = 20_000;

enum Target {
    Disabled,
    Memory(Vec<LogEvent>),
    File { path: PathBuf, file: File },
}

struct SinkState {
    target: Target,
    written: usize,
    dropped: usize,
}

/// Append-only event log shared by every thread that reaches a hook.
///
/// All writes go through one mutex. Once `capacity` events have been written, further events
/// are dropped without error. I/O failures are swallowed: the event is neither written nor
/// counted.
pub struct EventSink {
    capacity: usize,
    state: Mutex<SinkState>,
}

impl EventSink {
    fn with_target(target: Target, capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(SinkState {
                target,
                written: 0,
                dropped: 0,
            }),
        }
    }

    /// Sink that accepts and discards everything.
    pub fn disabled() -> Self {
        Self::with_target(Target::Disabled, 0)
    }

    pub fn in_memory(capacity: usize) -> Self {
        Self::with_target(Target::Memory(Vec::new()), capacity)
    }

    /// Creates `dir` and a timestamped log file inside it. The first line names the file and
    /// does not count against the capacity.
    pub fn to_file(dir: &Path, capacity: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "active_probe_{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "[FileLog] {}", path.display())?;
        Ok(Self::with_target(Target::File { path, file }, capacity))
    }

    pub fn append(&self, tag: Tag, message: impl Into<String>) {
        self.record(LogEvent::now(tag, message));
    }

    pub fn record(&self, event: LogEvent) {
        let mut state = self.state.lock();
        if matches!(state.target, Target::Disabled) {
            return;
        }
        if state.written >= self.capacity {
            state.dropped += 1;
            return;
        }
        let ok = match &mut state.target {
            Target::Disabled => false,
            Target::Memory(events) => {
                events.push(event);
                true
            }
            Target::File { file, .. } => match writeln!(file, "{}", event) {
                Ok(()) => true,
                Err(e) => {
                    debug!("event sink write failed: {}", e);
                    false
                }
            },
        };
        if ok {
            state.written += 1;
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.state.lock().target, Target::Disabled)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn written(&self) -> usize {
        self.state.lock().written
    }

    pub fn dropped(&self) -> usize {
        self.state.lock().dropped
    }

    pub fn path(&self) -> Option<PathBuf> {
        match &self.state.lock().target {
            Target::File { path, .. } => Some(path.clone()),
            _ => None,
        }
    }

    /// Copy of recorded events. Empty unless the sink is in-memory.
    pub fn events(&self) -> Vec<LogEvent> {
        match &self.state.lock().target {
            Target::Memory(events) => events.clone(),
            _ => Vec::new(),
        }
    }

    /// Rendered lines of an in-memory sink.
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(|e| e.to_string()).collect()
    }
}
