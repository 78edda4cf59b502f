use serde::{Deserialize, Serialize};
use std::fmt;

/// Frames printed after a `STACK` line.
pub const MAX_STACK_LINES: usize = 40;

/// How an observed call reached its hook. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Ordinary host control flow.
    Native,
    /// Through the reflective invoke machinery, e.g. a forced invocation.
    Reflective,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Native => f.write_str("NATIVE"),
            Provenance::Reflective => f.write_str("REFLECT"),
        }
    }
}

/// `Reflective` when any frame contains one of `markers`.
pub fn classify(frames: &[String], markers: &[String]) -> Provenance {
    let reflective = frames
        .iter()
        .any(|frame| markers.iter().any(|m| frame.contains(m.as_str())));
    if reflective {
        Provenance::Reflective
    } else {
        Provenance::Native
    }
}
