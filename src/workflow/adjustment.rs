//! Writing counted quantities back into the equipment catalog.
//!
//! Both the single-line and the bulk approval paths go through
//! [`apply_adjustment`]; the stores call it with the rows they hold locked.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CountAction, WorkflowError};
use crate::models::{AuditCount, Equipment};

#[derive(Debug, Clone)]
pub struct AdjustmentOutcome {
    pub count: AuditCount,
    pub equipment: Equipment,
    /// Change applied to both `total_quantity` and `available_quantity`.
    pub delta: i32,
    pub condition_changed: bool,
}

/// Checks shared by approve and reject, in the order callers report them.
fn ensure_reviewable(line: &AuditCount) -> Result<i32, WorkflowError> {
    let counted = line.counted_quantity.ok_or(WorkflowError::NotCounted)?;
    if !line.has_discrepancy() {
        return Err(WorkflowError::NoDiscrepancy);
    }
    if line.adjustment_approved {
        return Err(WorkflowError::AlreadyAdjusted);
    }
    Ok(counted)
}

/// Approve a line's discrepancy and compute the catalog row after applying it.
///
/// The catalog total becomes the counted quantity. The same delta is added to
/// the available quantity so the number of units in use is preserved.
pub fn apply_adjustment(
    line: &AuditCount,
    equipment: &Equipment,
    reason: &str,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<AdjustmentOutcome, WorkflowError> {
    debug_assert_eq!(line.equipment_id, equipment.id);

    let counted = ensure_reviewable(line)?;
    let status = line.status.transition(CountAction::Approve)?;

    let delta = counted - equipment.total_quantity;

    let mut updated_equipment = equipment.clone();
    updated_equipment.total_quantity += delta;
    updated_equipment.available_quantity += delta;

    let condition_changed = match line.observed_condition {
        Some(observed) if observed != equipment.condition => {
            updated_equipment.condition = observed;
            true
        }
        _ => false,
    };
    updated_equipment.updated_at = now;

    let mut adjusted = line.clone();
    adjusted.status = status;
    adjusted.adjustment_approved = true;
    adjusted.adjustment_reason = Some(reason.trim().to_string());
    adjusted.adjusted_by = Some(actor);
    adjusted.adjusted_at = Some(now);
    adjusted.updated_at = now;

    Ok(AdjustmentOutcome {
        count: adjusted,
        equipment: updated_equipment,
        delta,
        condition_changed,
    })
}

/// Keep the system quantity: the line goes back to verified and the catalog
/// is not touched.
pub fn reject_adjustment(
    line: &AuditCount,
    reason: Option<&str>,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<AuditCount, WorkflowError> {
    ensure_reviewable(line)?;
    let status = line.status.transition(CountAction::Reject)?;

    let reason = match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => format!("Rejected: {r}"),
        None => "Rejected".to_string(),
    };

    let mut rejected = line.clone();
    rejected.status = status;
    rejected.adjustment_approved = false;
    rejected.adjustment_reason = Some(reason);
    rejected.adjusted_by = Some(actor);
    rejected.adjusted_at = Some(now);
    rejected.updated_at = now;
    Ok(rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CountStatus, EquipmentCondition};
    use crate::workflow::fixtures::{counted_line, equipment};

    fn pair(expected: i32, counted: i32, available: i32) -> (AuditCount, Equipment) {
        let mut l = counted_line(expected, counted);
        let e = equipment(Uuid::new_v4(), "balls", expected, available);
        l.equipment_id = e.id;
        (l, e)
    }

    #[test]
    fn test_shortage_reduces_total_and_available() {
        let (l, e) = pair(20, 18, 15);
        let out = apply_adjustment(&l, &e, "damaged, found 2 missing", Uuid::new_v4(), Utc::now()).unwrap();

        assert_eq!(out.delta, -2);
        assert_eq!(out.equipment.total_quantity, 18);
        assert_eq!(out.equipment.available_quantity, 13);
        assert_eq!(out.equipment.in_use(), e.in_use());
        assert_eq!(out.count.status, CountStatus::Adjusted);
        assert!(out.count.adjustment_approved);
        assert_eq!(out.count.adjustment_reason.as_deref(), Some("damaged, found 2 missing"));
    }

    #[test]
    fn test_total_follows_counted_even_if_catalog_moved() {
        // Catalog changed after the snapshot was taken.
        let (l, mut e) = pair(20, 23, 20);
        e.total_quantity = 25;
        e.available_quantity = 24;

        let out = apply_adjustment(&l, &e, "surplus", Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(out.equipment.total_quantity, 23);
        assert_eq!(
            out.equipment.available_quantity - e.available_quantity,
            out.equipment.total_quantity - e.total_quantity
        );
    }

    #[test]
    fn test_observed_condition_overwrites_catalog() {
        let (mut l, e) = pair(10, 9, 10);
        l.observed_condition = Some(EquipmentCondition::Poor);
        let out = apply_adjustment(&l, &e, "worn", Uuid::new_v4(), Utc::now()).unwrap();
        assert!(out.condition_changed);
        assert_eq!(out.equipment.condition, EquipmentCondition::Poor);

        let (mut same, e) = pair(10, 9, 10);
        same.observed_condition = Some(EquipmentCondition::Good);
        let out = apply_adjustment(&same, &e, "worn", Uuid::new_v4(), Utc::now()).unwrap();
        assert!(!out.condition_changed);
    }

    #[test]
    fn test_zero_discrepancy_cannot_be_adjusted() {
        let (l, e) = pair(10, 10, 10);
        assert_eq!(
            apply_adjustment(&l, &e, "nothing", Uuid::new_v4(), Utc::now()).unwrap_err(),
            WorkflowError::NoDiscrepancy
        );
    }

    #[test]
    fn test_uncounted_line_cannot_be_adjusted() {
        let (mut l, e) = pair(10, 8, 10);
        l.counted_quantity = None;
        l.discrepancy = None;
        assert_eq!(
            apply_adjustment(&l, &e, "x", Uuid::new_v4(), Utc::now()).unwrap_err(),
            WorkflowError::NotCounted
        );
    }

    #[test]
    fn test_second_approval_is_refused() {
        let (l, e) = pair(10, 8, 10);
        let first = apply_adjustment(&l, &e, "x", Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(
            apply_adjustment(&first.count, &first.equipment, "x", Uuid::new_v4(), Utc::now())
                .unwrap_err(),
            WorkflowError::AlreadyAdjusted
        );
    }

    #[test]
    fn test_skipped_line_is_outside_adjustment_flow() {
        let (mut l, e) = pair(10, 8, 10);
        l.status = CountStatus::Skipped;
        assert!(matches!(
            apply_adjustment(&l, &e, "x", Uuid::new_v4(), Utc::now()),
            Err(WorkflowError::InvalidCountTransition { .. })
        ));
    }

    #[test]
    fn test_reject_marks_verified_and_prefixes_reason() {
        let (l, _) = pair(10, 7, 10);
        let rejected = reject_adjustment(&l, Some("miscounted"), Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(rejected.status, CountStatus::Verified);
        assert!(!rejected.adjustment_approved);
        assert_eq!(rejected.adjustment_reason.as_deref(), Some("Rejected: miscounted"));

        let bare = reject_adjustment(&l, None, Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(bare.adjustment_reason.as_deref(), Some("Rejected"));
    }
}
