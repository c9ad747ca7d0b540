//! In-memory `AuditStore` used by service and router tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AuditListFilter, AuditStore, CountListFilter, CountMutation};
use crate::{
    error::{AppError, AppResult},
    models::{
        Audit, AuditCount, AuditListing, AuditStatus, CountWithEquipment, Equipment,
        EquipmentFilter, Location, Membership,
    },
    workflow::{apply_adjustment, lifecycle::ensure_adjustments_open, AdjustmentOutcome},
};

#[derive(Default)]
pub struct MemoryState {
    pub memberships: Vec<Membership>,
    pub user_names: HashMap<Uuid, String>,
    pub locations: HashMap<Uuid, Location>,
    pub equipment: HashMap<Uuid, Equipment>,
    pub audits: HashMap<Uuid, Audit>,
    pub counts: HashMap<Uuid, AuditCount>,
}

#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub async fn add_member(&self, organization_id: Uuid, user_id: Uuid, name: &str, permissions: &[&str]) {
        let mut state = self.state.lock().await;
        state.user_names.insert(user_id, name.to_string());
        state.memberships.push(Membership {
            organization_id,
            user_id,
            role: "member".to_string(),
            permissions: sqlx::types::Json(permissions.iter().map(|p| p.to_string()).collect()),
            is_active: true,
            joined_at: Utc::now(),
        });
    }

    pub async fn add_location(&self, organization_id: Uuid, name: &str) -> Uuid {
        let location = Location {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        let id = location.id;
        self.state.lock().await.locations.insert(id, location);
        id
    }

    pub async fn add_equipment(&self, equipment: Equipment) {
        self.state.lock().await.equipment.insert(equipment.id, equipment);
    }

    pub async fn equipment(&self, id: Uuid) -> Equipment {
        self.state.lock().await.equipment[&id].clone()
    }

    pub async fn set_equipment_total(&self, id: Uuid, total: i32, available: i32) {
        let mut state = self.state.lock().await;
        if let Some(e) = state.equipment.get_mut(&id) {
            e.total_quantity = total;
            e.available_quantity = available;
        }
    }
}

fn audit_in_org(state: &MemoryState, organization_id: Uuid, audit_id: Uuid) -> Option<&Audit> {
    state
        .audits
        .get(&audit_id)
        .filter(|a| a.organization_id == organization_id)
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn find_membership(&self, organization_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .iter()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id && m.is_active)
            .cloned())
    }

    async fn find_location(&self, organization_id: Uuid, location_id: Uuid) -> AppResult<Option<Location>> {
        let state = self.state.lock().await;
        Ok(state
            .locations
            .get(&location_id)
            .filter(|l| l.organization_id == organization_id)
            .cloned())
    }

    async fn list_audits(&self, organization_id: Uuid, filter: &AuditListFilter) -> AppResult<Vec<AuditListing>> {
        let state = self.state.lock().await;
        let mut audits: Vec<&Audit> = state
            .audits
            .values()
            .filter(|a| a.organization_id == organization_id)
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.audit_type.map_or(true, |t| a.audit_type == t))
            .filter(|a| filter.date_from.map_or(true, |d| a.scheduled_date >= d))
            .filter(|a| filter.date_to.map_or(true, |d| a.scheduled_date <= d))
            .filter(|a| {
                filter.search.as_ref().map_or(true, |s| {
                    a.title.to_lowercase().contains(&s.to_lowercase())
                })
            })
            .collect();
        audits.sort_by(|a, b| {
            b.scheduled_date
                .cmp(&a.scheduled_date)
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(audits
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .map(|a| AuditListing {
                audit: a.clone(),
                location_name: a
                    .location_id
                    .and_then(|id| state.locations.get(&id))
                    .map(|l| l.name.clone()),
                created_by_name: state.user_names.get(&a.created_by).cloned(),
                performed_by_name: a.performed_by.and_then(|id| state.user_names.get(&id).cloned()),
            })
            .collect())
    }

    async fn find_audit(&self, organization_id: Uuid, audit_id: Uuid) -> AppResult<Option<Audit>> {
        let state = self.state.lock().await;
        Ok(audit_in_org(&state, organization_id, audit_id).cloned())
    }

    async fn insert_audit(&self, audit: &Audit) -> AppResult<()> {
        self.state.lock().await.audits.insert(audit.id, audit.clone());
        Ok(())
    }

    async fn update_audit(&self, audit: &Audit, expected: AuditStatus) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.audits.get_mut(&audit.id) {
            Some(stored) if stored.organization_id == audit.organization_id && stored.status == expected => {
                *stored = audit.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_audit(&self, organization_id: Uuid, audit_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let deletable = audit_in_org(&state, organization_id, audit_id)
            .is_some_and(|a| a.status == AuditStatus::Scheduled);
        if !deletable {
            return Ok(false);
        }
        state.audits.remove(&audit_id);
        state.counts.retain(|_, c| c.audit_id != audit_id);
        Ok(true)
    }

    async fn active_equipment(&self, organization_id: Uuid, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>> {
        let state = self.state.lock().await;
        let mut equipment: Vec<Equipment> = state
            .equipment
            .values()
            .filter(|e| e.organization_id == organization_id && filter.matches(e))
            .cloned()
            .collect();
        equipment.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(equipment)
    }

    async fn start_audit(&self, audit: &Audit, lines: &[AuditCount]) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.audits.get_mut(&audit.id) {
            Some(stored) if stored.status == AuditStatus::Scheduled => *stored = audit.clone(),
            _ => return Ok(false),
        }
        for line in lines {
            state.counts.insert(line.id, line.clone());
        }
        Ok(true)
    }

    async fn counts_for_audit(&self, audit_id: Uuid) -> AppResult<Vec<AuditCount>> {
        let state = self.state.lock().await;
        Ok(state
            .counts
            .values()
            .filter(|c| c.audit_id == audit_id)
            .cloned()
            .collect())
    }

    async fn list_counts(&self, audit_id: Uuid, filter: &CountListFilter) -> AppResult<Vec<CountWithEquipment>> {
        let state = self.state.lock().await;
        let mut counts: Vec<CountWithEquipment> = state
            .counts
            .values()
            .filter(|c| c.audit_id == audit_id)
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.has_discrepancy.map_or(true, |want| c.has_discrepancy() == want))
            .filter_map(|c| {
                let e = state.equipment.get(&c.equipment_id)?;
                Some(CountWithEquipment {
                    count: c.clone(),
                    equipment_name: e.name.clone(),
                    equipment_category: e.category.clone(),
                    equipment_brand: e.brand.clone(),
                    equipment_condition: e.condition,
                })
            })
            .filter(|c| {
                filter.search.as_ref().map_or(true, |s| {
                    c.equipment_name.to_lowercase().contains(&s.to_lowercase())
                })
            })
            .collect();
        counts.sort_by(|a, b| a.equipment_name.cmp(&b.equipment_name));
        Ok(counts)
    }

    async fn find_count(&self, organization_id: Uuid, count_id: Uuid) -> AppResult<Option<AuditCount>> {
        let state = self.state.lock().await;
        Ok(state
            .counts
            .get(&count_id)
            .filter(|c| audit_in_org(&state, organization_id, c.audit_id).is_some())
            .cloned())
    }

    async fn mutate_count(
        &self,
        organization_id: Uuid,
        count_id: Uuid,
        mutation: CountMutation,
    ) -> AppResult<AuditCount> {
        let mut state = self.state.lock().await;

        let count = state
            .counts
            .get(&count_id)
            .ok_or_else(|| AppError::NotFound("Count not found".to_string()))?;
        let audit = audit_in_org(&state, organization_id, count.audit_id)
            .ok_or_else(|| AppError::NotFound("Count not found".to_string()))?;

        let updated = mutation(audit, count)?;
        state.counts.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn approve_adjustment(
        &self,
        organization_id: Uuid,
        count_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> AppResult<AdjustmentOutcome> {
        let mut state = self.state.lock().await;

        let count = state
            .counts
            .get(&count_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Count not found".to_string()))?;
        let audit = audit_in_org(&state, organization_id, count.audit_id)
            .ok_or_else(|| AppError::NotFound("Count not found".to_string()))?;
        ensure_adjustments_open(audit)?;

        let equipment = state
            .equipment
            .get(&count.equipment_id)
            .ok_or_else(|| AppError::NotFound("Equipment not found".to_string()))?;

        let outcome = apply_adjustment(&count, equipment, reason, actor, Utc::now())?;
        state.equipment.insert(outcome.equipment.id, outcome.equipment.clone());
        state.counts.insert(outcome.count.id, outcome.count.clone());
        Ok(outcome)
    }
}
