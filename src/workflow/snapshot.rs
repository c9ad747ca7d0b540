use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Audit, AuditCount, CountStatus, Equipment, EquipmentFilter};

pub fn snapshot_filter(audit: &Audit) -> EquipmentFilter {
    EquipmentFilter {
        category: audit.category_filter.clone(),
        location_id: audit.location_id,
    }
}

/// Materialize one pending count line per matching equipment item, copying the
/// item's current total as the expected quantity.
///
/// Items from other organizations, inactive items, items outside the audit's
/// filters and repeated ids are dropped.
pub fn build_snapshot(audit: &Audit, equipment: &[Equipment], now: DateTime<Utc>) -> Vec<AuditCount> {
    let filter = snapshot_filter(audit);
    let mut seen = HashSet::new();

    equipment
        .iter()
        .filter(|e| e.organization_id == audit.organization_id)
        .filter(|e| filter.matches(e))
        .filter(|e| seen.insert(e.id))
        .map(|e| AuditCount {
            id: Uuid::new_v4(),
            audit_id: audit.id,
            equipment_id: e.id,
            expected_quantity: e.total_quantity,
            counted_quantity: None,
            discrepancy: None,
            observed_condition: None,
            notes: None,
            status: CountStatus::Pending,
            adjustment_approved: false,
            adjustment_reason: None,
            adjusted_by: None,
            adjusted_at: None,
            counted_by: None,
            counted_at: None,
            created_at: now,
            updated_at: now,
        })
        .collect()
}
