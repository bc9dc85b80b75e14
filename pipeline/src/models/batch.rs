//! Per-batch processing state.
//!
//! Each batch moves through the pipeline stages as a small state machine:
//!
//! ```text
//! Received -> Classified -> Normalized -> Emitting
//!     -> { Emitted | PartiallyEmitted | FailedRetrying -> FailedFatal }
//! ```
//!
//! `Emitted`, `PartiallyEmitted`, and `FailedFatal` are terminal.

use serde::{Deserialize, Serialize};

/// Processing state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// The batch has been received and not yet decoded.
    Received,
    /// Records have been decoded and classified against rule sets.
    Classified,
    /// Records have been normalized into the canonical schema.
    Normalized,
    /// The batch is being sent to the sink.
    Emitting,
    /// Every surviving record was emitted.
    Emitted,
    /// At least one record failed to emit; the rest were sent.
    PartiallyEmitted,
    /// The sink send failed and a retry is pending.
    FailedRetrying,
    /// The batch failed terminally (retries exhausted or deadline hit).
    FailedFatal,
}

impl BatchState {
    /// Returns true if no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Emitted | Self::PartiallyEmitted | Self::FailedFatal
        )
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Classified => write!(f, "classified"),
            Self::Normalized => write!(f, "normalized"),
            Self::Emitting => write!(f, "emitting"),
            Self::Emitted => write!(f, "emitted"),
            Self::PartiallyEmitted => write!(f, "partially_emitted"),
            Self::FailedRetrying => write!(f, "failed_retrying"),
            Self::FailedFatal => write!(f, "failed_fatal"),
        }
    }
}
