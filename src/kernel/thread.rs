use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: u64 = NEXT_THREAD.fetch_add(1, Ordering::Relaxed);
}

/// Small stable number for the calling thread, assigned on first use. Printed as `T<n>` in the
/// event log.
pub fn current_thread_number() -> u64 {
    THREAD_NUMBER.with(|n| *n)
}
