use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kernel::thread::current_thread_number;

/// Category printed in the second bracket of every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Attach header and lifecycle lines.
    Init,
    /// Operator separator.
    Mark,
    /// Type/method resolution results.
    Ref,
    /// Hook installation results.
    Patch,
    /// Watched-method callbacks.
    Ep,
    /// Candidate-method callbacks, only inside a trace window.
    Tr,
    /// Trace gate transitions.
    Trace,
    /// Forced invocation.
    Force,
    Err,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Init => "INIT",
            Tag::Mark => "MARK",
            Tag::Ref => "REF",
            Tag::Patch => "PATCH",
            Tag::Ep => "EP",
            Tag::Tr => "TR",
            Tag::Trace => "TRACE",
            Tag::Force => "FORCE",
            Tag::Err => "ERR",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the event log. Never mutated after it is recorded.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub thread_id: u64,
    pub tag: Tag,
    pub message: String,
}

impl LogEvent {
    /// Event stamped with the current local time and calling thread.
    pub fn now(tag: Tag, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            thread_id: current_thread_number(),
            tag,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}][T{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.tag,
            self.thread_id,
            self.message
        )
    }
}
