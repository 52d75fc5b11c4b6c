//! Form lifecycle status
//!
//! ```text
//! Idle ──submit──▶ Validating ──errors──▶ Idle
//!                      │
//!                      └──valid──▶ Submitting ──settled / dropped──▶ Idle
//! ```

use crate::error::TransitionError;
use serde::{Deserialize, Serialize};

/// Where the form is in its submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    /// Awaiting input
    #[default]
    Idle,
    /// Running the validation evaluator
    Validating,
    /// Persistence callback in flight
    Submitting,
}

impl FormStatus {
    /// True while a submission holds the form
    #[inline]
    #[must_use]
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Validates a status change.
pub fn validate_transition(from: FormStatus, to: FormStatus) -> Result<(), TransitionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: FormStatus) -> Vec<FormStatus> {
    use FormStatus::{Idle, Submitting, Validating};
    match from {
        Idle => vec![Validating],
        Validating => vec![Idle, Submitting],
        Submitting => vec![Idle],
    }
}

fn allowed(from: FormStatus, to: FormStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
