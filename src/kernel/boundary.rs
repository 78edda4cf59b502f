use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

use super::telemetry::{EventSink, Tag};

/// Failure boundary for everything that crosses into or out of the host: hook callbacks,
/// forced invocations, attach steps, per-tick cache refreshes.
///
/// Runs `f`; an `Err` or a panic is written to the sink as an `[ERR]` line tagged with `scope`
/// and turned into `None`. Nothing escapes to the caller.
pub fn guard<T, F>(sink: &EventSink, scope: &str, f: F) -> Option<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match contain(f) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("{} failed: {:#}", scope, e);
            sink.append(Tag::Err, format!("{} failed: {:#}", scope, e));
            None
        }
        Err(msg) => {
            warn!("{} panicked: {}", scope, msg);
            sink.append(Tag::Err, format!("{} panicked: {}", scope, msg));
            None
        }
    }
}

/// Runs `f`, turning a panic into its message. Callers that report failures through their own
/// error type use this instead of [`guard`].
pub fn contain<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
