use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shortest window the gate will open, whatever the configured duration.
pub const MINIMUM_WINDOW_SECS: f64 = 0.5;

/// Observable states of the trace gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceState {
    /// Trace mode off. A window cannot open.
    Disarmed,
    /// Trace mode on, window closed.
    Armed,
    /// Window open: candidate hooks emit.
    Active,
}

/// Time-windowed switch consulted by every candidate hook.
///
/// Arming and the window are independent flags: toggling while a window is open only changes
/// where the gate lands when the window expires. Expiry is polled once per tick by the owning
/// context; hook callbacks on any thread only read `is_active`, a single atomic load.
#[derive(Debug)]
pub struct TraceGate {
    armed: AtomicBool,
    active: AtomicBool,
    end_bits: AtomicU64,
}

impl TraceGate {
    pub fn new(armed: bool) -> Self {
        Self {
            armed: AtomicBool::new(armed),
            active: AtomicBool::new(false),
            end_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn state(&self) -> TraceState {
        if self.is_active() {
            TraceState::Active
        } else if self.is_armed() {
            TraceState::Armed
        } else {
            TraceState::Disarmed
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn end_timestamp(&self) -> f64 {
        f64::from_bits(self.end_bits.load(Ordering::Acquire))
    }

    /// Flips armed/disarmed. Returns the new armed flag.
    pub fn toggle(&self) -> bool {
        !self.armed.fetch_xor(true, Ordering::AcqRel)
    }

    /// Opens (or re-opens) the window if armed. Returns the window end, or `None` when disarmed.
    pub fn open_window(&self, now: f64, duration: f64, minimum: f64) -> Option<f64> {
        if !self.is_armed() {
            return None;
        }
        let end = now + duration.max(minimum);
        self.end_bits.store(end.to_bits(), Ordering::Release);
        self.active.store(true, Ordering::Release);
        Some(end)
    }

    /// Closes the window once `now` is past its end. Returns true on the closing poll only.
    pub fn poll(&self, now: f64) -> bool {
        if self.is_active() && now > self.end_timestamp() {
            self.active.store(false, Ordering::Release);
            return true;
        }
        false
    }
}
