//! Event log.
//!
//! # CONCURRENCY INVARIANT
//! The sink is the only probe state written from arbitrary host threads. Every write takes the
//! sink's single lock; nothing else in the probe may be mutated from a hook callback.
//!
//! # STABILITY INVARIANT
//! Logging never fails outward. Full sink, disabled sink and I/O errors all end in a silent drop.

pub mod event;
pub mod recorder;

pub use event::{LogEvent, Tag};
pub use recorder::{EventSink, DEFAULT_CAPACITY};
