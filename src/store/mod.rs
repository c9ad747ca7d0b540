//! Persistence seam for the audit workflow.
//!
//! Every lookup is scoped by organization so rows from another tenant are
//! indistinguishable from missing rows.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Audit, AuditCount, AuditListing, AuditStatus, AuditType, CountStatus, CountWithEquipment,
    Equipment, EquipmentFilter, Location, Membership,
};
use crate::workflow::AdjustmentOutcome;

pub use postgres::PgAuditStore;

/// Edit applied to a locked count line: receives the owning audit and the
/// current row, returns the row to store.
pub type CountMutation = Box<dyn FnOnce(&Audit, &AuditCount) -> AppResult<AuditCount> + Send>;

#[derive(Debug, Clone)]
pub struct AuditListFilter {
    pub status: Option<AuditStatus>,
    pub audit_type: Option<AuditType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditListFilter {
    fn default() -> Self {
        Self {
            status: None,
            audit_type: None,
            date_from: None,
            date_to: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountListFilter {
    pub status: Option<CountStatus>,
    pub has_discrepancy: Option<bool>,
    pub search: Option<String>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn find_membership(&self, organization_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>>;

    async fn find_location(&self, organization_id: Uuid, location_id: Uuid) -> AppResult<Option<Location>>;

    async fn list_audits(&self, organization_id: Uuid, filter: &AuditListFilter) -> AppResult<Vec<AuditListing>>;

    async fn find_audit(&self, organization_id: Uuid, audit_id: Uuid) -> AppResult<Option<Audit>>;

    async fn insert_audit(&self, audit: &Audit) -> AppResult<()>;

    /// Persist edits or a status change, provided the stored row is still in
    /// `expected` status. Returns false when nothing matched.
    async fn update_audit(&self, audit: &Audit, expected: AuditStatus) -> AppResult<bool>;

    /// Delete a scheduled audit. Returns false if no scheduled audit matched.
    async fn delete_audit(&self, organization_id: Uuid, audit_id: Uuid) -> AppResult<bool>;

    async fn active_equipment(&self, organization_id: Uuid, filter: &EquipmentFilter) -> AppResult<Vec<Equipment>>;

    /// Persist the started audit together with its snapshot lines, atomically.
    /// Returns false (writing nothing) if the audit was no longer scheduled.
    async fn start_audit(&self, audit: &Audit, lines: &[AuditCount]) -> AppResult<bool>;

    async fn counts_for_audit(&self, audit_id: Uuid) -> AppResult<Vec<AuditCount>>;

    async fn list_counts(&self, audit_id: Uuid, filter: &CountListFilter) -> AppResult<Vec<CountWithEquipment>>;

    async fn find_count(&self, organization_id: Uuid, count_id: Uuid) -> AppResult<Option<AuditCount>>;

    /// Apply `mutation` to a count line while the line is locked, and write
    /// its result. The mutation sees the committed row and its audit, never a
    /// copy read earlier, so it cannot undo a concurrent approval.
    async fn mutate_count(
        &self,
        organization_id: Uuid,
        count_id: Uuid,
        mutation: CountMutation,
    ) -> AppResult<AuditCount>;

    /// Approve one line's adjustment with the line and its equipment row held
    /// exclusively for the duration.
    async fn approve_adjustment(
        &self,
        organization_id: Uuid,
        count_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> AppResult<AdjustmentOutcome>;
}
