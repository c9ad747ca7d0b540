//! Count-line status machine.
//!
//! ```text
//! pending --record--> counted --verify--> verified --approve--> adjusted
//!                                         verified --reject-->  verified
//! counted --approve--> adjusted
//! pending --skip--> skipped
//! ```
//!
//! Recording and skipping are gated on the owning audit being in progress,
//! not on the line's previous status, so a line can be re-counted (including a
//! skipped one) until the audit completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{append_note, WorkflowError};
use crate::models::{AuditCount, CountStatus, EquipmentCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountAction {
    Record,
    Skip,
    Verify,
    Approve,
    Reject,
}

impl std::fmt::Display for CountAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountAction::Record => write!(f, "record"),
            CountAction::Skip => write!(f, "skip"),
            CountAction::Verify => write!(f, "verify"),
            CountAction::Approve => write!(f, "approve an adjustment for"),
            CountAction::Reject => write!(f, "reject an adjustment for"),
        }
    }
}

impl CountStatus {
    /// The single guard for count-line status changes.
    pub fn transition(self, action: CountAction) -> Result<CountStatus, WorkflowError> {
        use CountAction::*;
        use CountStatus::*;

        match (self, action) {
            (_, Record) => Ok(Counted),
            (from, Skip) if from != Adjusted => Ok(Skipped),
            (Counted, Verify) => Ok(Verified),
            (Counted, Approve) | (Verified, Approve) => Ok(Adjusted),
            (Counted, Reject) | (Verified, Reject) => Ok(Verified),
            (from, action) => Err(WorkflowError::InvalidCountTransition { action, from }),
        }
    }
}

/// A physical count as entered by a counter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountInput {
    pub counted_quantity: i32,
    pub observed_condition: Option<EquipmentCondition>,
    pub notes: Option<String>,
}

/// Record (or overwrite) a count. The caller has already checked that the
/// owning audit is in progress.
pub fn record_count(
    line: &AuditCount,
    input: &CountInput,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<AuditCount, WorkflowError> {
    let status = line.status.transition(CountAction::Record)?;

    let mut counted = line.clone();
    counted.status = status;
    counted.counted_quantity = Some(input.counted_quantity);
    counted.discrepancy = Some(input.counted_quantity - line.expected_quantity);
    counted.observed_condition = input.observed_condition;
    if let Some(notes) = input.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        counted.notes = Some(notes.to_string());
    }
    counted.counted_by = Some(actor);
    counted.counted_at = Some(now);
    counted.updated_at = now;
    Ok(counted)
}

pub fn skip_count(
    line: &AuditCount,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AuditCount, WorkflowError> {
    let status = line.status.transition(CountAction::Skip)?;

    let mut skipped = line.clone();
    skipped.status = status;
    skipped.notes = append_note(
        line.notes.as_deref(),
        reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("Skipped: {r}"))
            .as_deref(),
    );
    skipped.updated_at = now;
    Ok(skipped)
}

/// Attest a count. Quantities are left as recorded.
pub fn verify_count(
    line: &AuditCount,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AuditCount, WorkflowError> {
    let status = line.status.transition(CountAction::Verify)?;

    let mut verified = line.clone();
    verified.status = status;
    verified.notes = append_note(line.notes.as_deref(), notes);
    verified.updated_at = now;
    Ok(verified)
}
