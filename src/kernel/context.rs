use uuid::Uuid;

use super::gate::TraceGate;
use super::telemetry::{EventSink, Tag};
use super::thread::current_thread_number;
use crate::config::ProbeConfig;

/// Process-wide probe state reachable from hook callbacks.
///
/// Created once at attach on the thread that owns the host's update loop, shared by `Arc` with
/// every installed callback, and dropped after detach once the last callback releases it.
/// Only `sink` is written from arbitrary threads; `gate` is read from them lock-free.
pub struct ProbeContext {
    pub config: ProbeConfig,
    pub sink: EventSink,
    pub gate: TraceGate,
    pub session: Uuid,
    main_thread: u64,
}

impl ProbeContext {
    /// Records the calling thread as the main thread.
    pub fn new(config: ProbeConfig, sink: EventSink) -> Self {
        let gate = TraceGate::new(config.trace.enable_trace);
        Self {
            config,
            sink,
            gate,
            session: Uuid::new_v4(),
            main_thread: current_thread_number(),
        }
    }

    pub fn main_thread(&self) -> u64 {
        self.main_thread
    }

    pub fn on_main_thread(&self) -> bool {
        current_thread_number() == self.main_thread
    }

    pub fn log(&self, tag: Tag, message: impl Into<String>) {
        self.sink.append(tag, message);
    }
}
