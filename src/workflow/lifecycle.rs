//! Audit status machine.
//!
//! ```text
//! scheduled --start-->    in_progress --complete--> completed
//! scheduled --cancel-->   cancelled
//! in_progress --cancel--> cancelled
//! scheduled --edit/delete--> scheduled
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{append_note, WorkflowError};
use crate::models::{Audit, AuditCount, AuditStatus, CountStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Edit,
    Delete,
    Start,
    Complete,
    Cancel,
}

impl AuditAction {
    pub fn past_tense(&self) -> &'static str {
        match self {
            AuditAction::Edit => "edited",
            AuditAction::Delete => "deleted",
            AuditAction::Start => "started",
            AuditAction::Complete => "completed",
            AuditAction::Cancel => "cancelled",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Edit => write!(f, "edit"),
            AuditAction::Delete => write!(f, "delete"),
            AuditAction::Start => write!(f, "start"),
            AuditAction::Complete => write!(f, "complete"),
            AuditAction::Cancel => write!(f, "cancel"),
        }
    }
}

impl AuditStatus {
    /// The single guard for audit status changes. Returns the status the audit
    /// is in after `action`.
    pub fn transition(self, action: AuditAction) -> Result<AuditStatus, WorkflowError> {
        use AuditAction::*;
        use AuditStatus::*;

        match (self, action) {
            (Scheduled, Edit) | (Scheduled, Delete) => Ok(Scheduled),
            (Scheduled, Start) => Ok(InProgress),
            (InProgress, Complete) => Ok(Completed),
            (Scheduled, Cancel) | (InProgress, Cancel) => Ok(Cancelled),
            (status, Edit) | (status, Delete) => {
                Err(WorkflowError::AuditNotEditable { action, status })
            }
            (from, action) => Err(WorkflowError::InvalidAuditTransition { action, from }),
        }
    }

    pub fn allowed_actions(self) -> Vec<AuditAction> {
        match self {
            AuditStatus::Scheduled => vec![
                AuditAction::Edit,
                AuditAction::Delete,
                AuditAction::Start,
                AuditAction::Cancel,
            ],
            AuditStatus::InProgress => vec![AuditAction::Complete, AuditAction::Cancel],
            AuditStatus::Completed | AuditStatus::Cancelled => vec![],
        }
    }
}

/// Counting is open only while the audit is running.
pub fn ensure_counting_open(audit: &Audit) -> Result<(), WorkflowError> {
    match audit.status {
        AuditStatus::InProgress => Ok(()),
        status => Err(WorkflowError::AuditNotInProgress { status }),
    }
}

/// Adjustments may be reviewed while counting or after completion.
pub fn ensure_adjustments_open(audit: &Audit) -> Result<(), WorkflowError> {
    match audit.status {
        AuditStatus::InProgress | AuditStatus::Completed => Ok(()),
        status => Err(WorkflowError::AuditClosed { status }),
    }
}

/// Move a scheduled audit into counting. `lines` is the snapshot that will be
/// persisted with it; an empty snapshot is refused.
pub fn start_audit(
    audit: &Audit,
    lines: &[AuditCount],
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<Audit, WorkflowError> {
    let status = audit.status.transition(AuditAction::Start)?;
    if lines.is_empty() {
        return Err(WorkflowError::NothingToAudit);
    }

    let mut started = audit.clone();
    started.status = status;
    started.performed_by = Some(actor);
    started.started_at = Some(now);
    started.total_items = lines.len() as i32;
    started.total_expected_quantity = lines.iter().map(|l| l.expected_quantity).sum();
    started.updated_at = now;
    Ok(started)
}

/// Close a running audit, freezing the counters from its lines.
pub fn complete_audit(
    audit: &Audit,
    lines: &[AuditCount],
    actor: Uuid,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Audit, WorkflowError> {
    let status = audit.status.transition(AuditAction::Complete)?;

    let pending = lines
        .iter()
        .filter(|l| l.status == CountStatus::Pending)
        .count();
    if pending > 0 {
        return Err(WorkflowError::PendingCountsRemain { pending });
    }

    let resolved: Vec<&AuditCount> = lines
        .iter()
        .filter(|l| l.status != CountStatus::Skipped)
        .collect();

    let mut completed = audit.clone();
    completed.status = status;
    completed.completed_at = Some(now);
    completed.approved_by = Some(actor);
    completed.counted_items = resolved.len() as i32;
    completed.items_with_discrepancy = resolved.iter().filter(|l| l.has_discrepancy()).count() as i32;
    completed.total_counted_quantity = resolved.iter().filter_map(|l| l.counted_quantity).sum();
    completed.notes = append_note(audit.notes.as_deref(), notes);
    completed.updated_at = now;
    Ok(completed)
}

pub fn cancel_audit(
    audit: &Audit,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Audit, WorkflowError> {
    let status = audit.status.transition(AuditAction::Cancel)?;

    let mut cancelled = audit.clone();
    cancelled.status = status;
    cancelled.notes = append_note(
        audit.notes.as_deref(),
        reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("Cancelled: {r}"))
            .as_deref(),
    );
    cancelled.updated_at = now;
    Ok(cancelled)
}
