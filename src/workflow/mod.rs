//! Equipment audit workflow core.
//!
//! Everything in here is pure: functions take the current rows and return the
//! rows to write, or a [`WorkflowError`] when the status machine forbids the
//! operation. Persistence and locking live in `store`; orchestration lives in
//! `services`.

pub mod adjustment;
pub mod counting;
pub mod lifecycle;
pub mod snapshot;
pub mod summary;

use thiserror::Error;

use crate::models::{AuditStatus, CountStatus};

pub use adjustment::{apply_adjustment, reject_adjustment, AdjustmentOutcome};
pub use counting::{record_count, skip_count, verify_count, CountAction, CountInput};
pub use lifecycle::{cancel_audit, complete_audit, start_audit, AuditAction};
pub use snapshot::{build_snapshot, snapshot_filter};
pub use summary::{summarize, AuditSummary};

/// Violations of the audit and count-line status machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Only scheduled audits can be {} (current status: {status})", .action.past_tense())]
    AuditNotEditable { action: AuditAction, status: AuditStatus },

    #[error("Cannot {action} an audit that is {from}")]
    InvalidAuditTransition { action: AuditAction, from: AuditStatus },

    #[error("Audit is not in progress (current status: {status})")]
    AuditNotInProgress { status: AuditStatus },

    #[error("Cannot complete audit: {pending} item(s) still pending. Count or skip every item first")]
    PendingCountsRemain { pending: usize },

    #[error("No active equipment matches this audit's filters")]
    NothingToAudit,

    #[error("Cannot {action} a count that is {from}")]
    InvalidCountTransition { action: CountAction, from: CountStatus },

    #[error("Item has not been counted yet")]
    NotCounted,

    #[error("No discrepancy to adjust")]
    NoDiscrepancy,

    #[error("Adjustment has already been approved")]
    AlreadyAdjusted,

    #[error("Audit is {status}; adjustments are closed")]
    AuditClosed { status: AuditStatus },
}

/// Append `addition` to an existing notes field on a new line.
/// Blank additions leave the field untouched.
pub fn append_note(existing: Option<&str>, addition: Option<&str>) -> Option<String> {
    let addition = addition.map(str::trim).filter(|s| !s.is_empty());
    match (existing, addition) {
        (Some(old), Some(new)) if !old.is_empty() => Some(format!("{old}\n{new}")),
        (_, Some(new)) => Some(new.to_string()),
        (old, None) => old.map(str::to_string),
    }
}
