//! Equipment audit procedures: lifecycle, counting, adjustments and summary.
//!
//! Single-item operations validate fully before writing anything. The two
//! batch operations commit item by item and report what they skipped.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Audit, AuditCount, AuditDetail, AuditListing, AuditStatus, AuditType, CountWithEquipment,
    },
    store::{AuditListFilter, AuditStore, CountListFilter},
    workflow::{
        self, build_snapshot,
        lifecycle::{ensure_adjustments_open, ensure_counting_open},
        snapshot_filter, AuditAction, AuditSummary, CountInput,
    },
};

pub const MAX_BATCH_SIZE: usize = 500;
pub const MAX_PAGE_SIZE: i64 = 100;

/// The authenticated caller and the organization the request is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub organization_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAudit {
    pub title: String,
    pub scheduled_date: NaiveDate,
    pub audit_type: AuditType,
    pub category_filter: Option<String>,
    pub location_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Partial edit of a scheduled audit. An empty `categoryFilter` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAudit {
    pub id: Uuid,
    pub title: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub audit_type: Option<AuditType>,
    pub category_filter: Option<String>,
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub clear_location: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCountEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub input: CountInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSkip {
    pub id: Uuid,
    pub reason: String,
}

/// Per-item outcome of a best-effort batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub succeeded: Vec<Uuid>,
    pub skipped: Vec<BatchSkip>,
}

impl BatchOutcome {
    fn skip(&mut self, id: Uuid, err: AppError) {
        let reason = match &err {
            AppError::Database(e) => {
                log::error!("Batch item {} failed: {}", id, e);
                "Internal error".to_string()
            }
            other => other.to_string(),
        };
        self.skipped.push(BatchSkip { id, reason });
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    Ok(title.to_string())
}

fn validate_reason(reason: &str) -> AppResult<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("A reason is required to approve an adjustment".to_string()));
    }
    Ok(reason)
}

fn validate_quantity(input: &CountInput) -> AppResult<()> {
    if input.counted_quantity < 0 {
        return Err(AppError::BadRequest("Counted quantity cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_batch_size(len: usize) -> AppResult<()> {
    if len == 0 {
        return Err(AppError::BadRequest("At least one item is required".to_string()));
    }
    if len > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "At most {} items can be processed at once",
            MAX_BATCH_SIZE
        )));
    }
    Ok(())
}

pub fn validate_list_filter(filter: &AuditListFilter) -> AppResult<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&filter.limit) {
        return Err(AppError::BadRequest(format!("limit must be between 1 and {}", MAX_PAGE_SIZE)));
    }
    if filter.offset < 0 {
        return Err(AppError::BadRequest("offset cannot be negative".to_string()));
    }
    if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
        if from > to {
            return Err(AppError::BadRequest("dateFrom must not be after dateTo".to_string()));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct EquipmentAuditService {
    store: Arc<dyn AuditStore>,
}

impl EquipmentAuditService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn AuditStore {
        self.store.as_ref()
    }

    async fn load_audit(&self, actor: &Actor, audit_id: Uuid) -> AppResult<Audit> {
        self.store
            .find_audit(actor.organization_id, audit_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Audit not found".to_string()))
    }

    async fn ensure_location(&self, actor: &Actor, location_id: Uuid) -> AppResult<()> {
        self.store
            .find_location(actor.organization_id, location_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Location not found".to_string()))?;
        Ok(())
    }

    /// Persist a status change, failing if another request changed the audit
    /// since it was loaded.
    async fn save_transition(&self, audit: &Audit, from: AuditStatus) -> AppResult<()> {
        if !self.store.update_audit(audit, from).await? {
            return Err(AppError::Conflict(
                "Audit was modified by another request; reload and try again".to_string(),
            ));
        }
        Ok(())
    }

    // ---- Audit lifecycle ----

    pub async fn list(&self, actor: &Actor, filter: &AuditListFilter) -> AppResult<Vec<AuditListing>> {
        validate_list_filter(filter)?;
        self.store.list_audits(actor.organization_id, filter).await
    }

    pub async fn get(&self, actor: &Actor, audit_id: Uuid) -> AppResult<AuditDetail> {
        let audit = self.load_audit(actor, audit_id).await?;

        let location_name = match audit.location_id {
            Some(id) => self
                .store
                .find_location(actor.organization_id, id)
                .await?
                .map(|l| l.name),
            None => None,
        };
        let counts = self
            .store
            .list_counts(audit.id, &CountListFilter::default())
            .await?;

        Ok(AuditDetail {
            allowed_actions: audit.status.allowed_actions(),
            audit,
            location_name,
            counts,
        })
    }

    pub async fn create(&self, actor: &Actor, input: CreateAudit) -> AppResult<Audit> {
        let title = validate_title(&input.title)?;
        if let Some(location_id) = input.location_id {
            self.ensure_location(actor, location_id).await?;
        }

        let now = Utc::now();
        let audit = Audit {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            title,
            scheduled_date: input.scheduled_date,
            audit_type: input.audit_type,
            category_filter: non_blank(input.category_filter),
            location_id: input.location_id,
            notes: non_blank(input.notes),
            status: AuditStatus::Scheduled,
            total_items: 0,
            total_expected_quantity: 0,
            counted_items: 0,
            items_with_discrepancy: 0,
            total_counted_quantity: 0,
            created_by: actor.user_id,
            performed_by: None,
            approved_by: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };

        self.store.insert_audit(&audit).await?;
        log::info!(
            "Audit {} created in organization {} by {}",
            audit.id, actor.organization_id, actor.user_id
        );
        Ok(audit)
    }

    pub async fn update(&self, actor: &Actor, input: UpdateAudit) -> AppResult<Audit> {
        let audit = self.load_audit(actor, input.id).await?;
        audit.status.transition(AuditAction::Edit)?;

        let mut updated = audit.clone();
        if let Some(title) = &input.title {
            updated.title = validate_title(title)?;
        }
        if let Some(date) = input.scheduled_date {
            updated.scheduled_date = date;
        }
        if let Some(audit_type) = input.audit_type {
            updated.audit_type = audit_type;
        }
        if input.category_filter.is_some() {
            updated.category_filter = non_blank(input.category_filter);
        }
        if input.clear_location {
            updated.location_id = None;
        } else if let Some(location_id) = input.location_id {
            if audit.location_id != Some(location_id) {
                self.ensure_location(actor, location_id).await?;
            }
            updated.location_id = Some(location_id);
        }
        if input.notes.is_some() {
            updated.notes = non_blank(input.notes);
        }
        updated.updated_at = Utc::now();

        self.save_transition(&updated, AuditStatus::Scheduled).await?;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, audit_id: Uuid) -> AppResult<()> {
        let audit = self.load_audit(actor, audit_id).await?;
        audit.status.transition(AuditAction::Delete)?;

        if !self.store.delete_audit(actor.organization_id, audit_id).await? {
            return Err(AppError::Conflict(
                "Audit was modified by another request; reload and try again".to_string(),
            ));
        }
        log::info!("Audit {} deleted by {}", audit_id, actor.user_id);
        Ok(())
    }

    pub async fn start(&self, actor: &Actor, audit_id: Uuid) -> AppResult<Audit> {
        let audit = self.load_audit(actor, audit_id).await?;
        audit.status.transition(AuditAction::Start)?;

        let equipment = self
            .store
            .active_equipment(actor.organization_id, &snapshot_filter(&audit))
            .await?;
        let now = Utc::now();
        let lines = build_snapshot(&audit, &equipment, now);
        let started = workflow::start_audit(&audit, &lines, actor.user_id, now)?;

        if !self.store.start_audit(&started, &lines).await? {
            return Err(AppError::Conflict(
                "Audit was modified by another request; reload and try again".to_string(),
            ));
        }
        log::info!(
            "Audit {} started by {} with {} item(s), {} unit(s) expected",
            audit_id, actor.user_id, started.total_items, started.total_expected_quantity
        );
        Ok(started)
    }

    pub async fn complete(&self, actor: &Actor, audit_id: Uuid, notes: Option<&str>) -> AppResult<Audit> {
        let audit = self.load_audit(actor, audit_id).await?;
        audit.status.transition(AuditAction::Complete)?;

        let lines = self.store.counts_for_audit(audit.id).await?;
        let completed = workflow::complete_audit(&audit, &lines, actor.user_id, notes, Utc::now())?;

        self.save_transition(&completed, audit.status).await?;
        log::info!(
            "Audit {} completed by {}: {}/{} counted, {} with discrepancy",
            audit_id,
            actor.user_id,
            completed.counted_items,
            completed.total_items,
            completed.items_with_discrepancy
        );
        Ok(completed)
    }

    pub async fn cancel(&self, actor: &Actor, audit_id: Uuid, reason: Option<&str>) -> AppResult<Audit> {
        let audit = self.load_audit(actor, audit_id).await?;
        let cancelled = workflow::cancel_audit(&audit, reason, Utc::now())?;

        self.save_transition(&cancelled, audit.status).await?;
        log::info!("Audit {} cancelled by {}", audit_id, actor.user_id);
        Ok(cancelled)
    }

    // ---- Counting ----

    pub async fn list_counts(
        &self,
        actor: &Actor,
        audit_id: Uuid,
        filter: &CountListFilter,
    ) -> AppResult<Vec<CountWithEquipment>> {
        let audit = self.load_audit(actor, audit_id).await?;
        self.store.list_counts(audit.id, filter).await
    }

    pub async fn record_count(&self, actor: &Actor, count_id: Uuid, input: &CountInput) -> AppResult<AuditCount> {
        validate_quantity(input)?;

        let input_owned = input.clone();
        let user_id = actor.user_id;
        let counted = self
            .store
            .mutate_count(
                actor.organization_id,
                count_id,
                Box::new(move |audit: &Audit, count: &AuditCount| -> AppResult<AuditCount> {
                    ensure_counting_open(audit)?;
                    Ok(workflow::record_count(count, &input_owned, user_id, Utc::now())?)
                }),
            )
            .await?;
        log::debug!(
            "Count {} recorded as {} (expected {}) by {}",
            count_id, input.counted_quantity, counted.expected_quantity, actor.user_id
        );
        Ok(counted)
    }

    /// Best effort: entries that fail validation, ownership or the audit status
    /// check are reported in `skipped` and the rest still commit.
    pub async fn batch_record_counts(&self, actor: &Actor, entries: &[BatchCountEntry]) -> AppResult<BatchOutcome> {
        validate_batch_size(entries.len())?;

        let mut outcome = BatchOutcome::default();
        for entry in entries {
            match self.record_count(actor, entry.id, &entry.input).await {
                Ok(_) => outcome.succeeded.push(entry.id),
                Err(err) => outcome.skip(entry.id, err),
            }
        }

        log::info!(
            "Batch count by {}: {} recorded, {} skipped",
            actor.user_id,
            outcome.succeeded.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    pub async fn skip_count(&self, actor: &Actor, count_id: Uuid, reason: Option<&str>) -> AppResult<AuditCount> {
        let reason = reason.map(str::to_string);
        self.store
            .mutate_count(
                actor.organization_id,
                count_id,
                Box::new(move |audit: &Audit, count: &AuditCount| -> AppResult<AuditCount> {
                    ensure_counting_open(audit)?;
                    Ok(workflow::skip_count(count, reason.as_deref(), Utc::now())?)
                }),
            )
            .await
    }

    pub async fn verify_count(&self, actor: &Actor, count_id: Uuid, notes: Option<&str>) -> AppResult<AuditCount> {
        let notes = notes.map(str::to_string);
        self.store
            .mutate_count(
                actor.organization_id,
                count_id,
                Box::new(move |audit: &Audit, count: &AuditCount| -> AppResult<AuditCount> {
                    ensure_adjustments_open(audit)?;
                    Ok(workflow::verify_count(count, notes.as_deref(), Utc::now())?)
                }),
            )
            .await
    }

    // ---- Adjustments ----

    pub async fn approve_adjustment(&self, actor: &Actor, count_id: Uuid, reason: &str) -> AppResult<AuditCount> {
        let reason = validate_reason(reason)?;

        let outcome = self
            .store
            .approve_adjustment(actor.organization_id, count_id, reason, actor.user_id)
            .await?;
        log::info!(
            "Adjustment approved on count {} by {}: equipment {} {:+} (total now {}, {} in use)",
            count_id,
            actor.user_id,
            outcome.equipment.id,
            outcome.delta,
            outcome.equipment.total_quantity,
            outcome.equipment.in_use()
        );
        if outcome.condition_changed {
            log::info!(
                "Equipment {} condition set to {} from count {}",
                outcome.equipment.id, outcome.equipment.condition, count_id
            );
        }
        Ok(outcome.count)
    }

    pub async fn reject_adjustment(&self, actor: &Actor, count_id: Uuid, reason: Option<&str>) -> AppResult<AuditCount> {
        let reason = reason.map(str::to_string);
        let user_id = actor.user_id;
        let rejected = self
            .store
            .mutate_count(
                actor.organization_id,
                count_id,
                Box::new(move |audit: &Audit, count: &AuditCount| -> AppResult<AuditCount> {
                    ensure_adjustments_open(audit)?;
                    Ok(workflow::reject_adjustment(count, reason.as_deref(), user_id, Utc::now())?)
                }),
            )
            .await?;
        log::info!("Adjustment rejected on count {} by {}", count_id, actor.user_id);
        Ok(rejected)
    }

    /// Approve several lines of one audit. Lines that are missing, belong to
    /// another audit, are uncounted, have no discrepancy or are already
    /// approved are skipped.
    pub async fn bulk_approve_adjustments(
        &self,
        actor: &Actor,
        audit_id: Uuid,
        count_ids: &[Uuid],
        reason: &str,
    ) -> AppResult<BatchOutcome> {
        validate_batch_size(count_ids.len())?;
        let reason = validate_reason(reason)?;
        let audit = self.load_audit(actor, audit_id).await?;

        let mut outcome = BatchOutcome::default();
        for &count_id in count_ids {
            match self.store.find_count(actor.organization_id, count_id).await {
                Ok(Some(count)) if count.audit_id == audit.id => {}
                Ok(_) => {
                    outcome.skip(count_id, AppError::NotFound("Count not found in this audit".to_string()));
                    continue;
                }
                Err(err) => {
                    outcome.skip(count_id, err);
                    continue;
                }
            }

            match self
                .store
                .approve_adjustment(actor.organization_id, count_id, reason, actor.user_id)
                .await
            {
                Ok(_) => outcome.succeeded.push(count_id),
                Err(err) => outcome.skip(count_id, err),
            }
        }

        log::info!(
            "Bulk approval on audit {} by {}: {} approved, {} skipped",
            audit_id,
            actor.user_id,
            outcome.succeeded.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    // ---- Summary ----

    pub async fn summary(&self, actor: &Actor, audit_id: Uuid) -> AppResult<AuditSummary> {
        let audit = self.load_audit(actor, audit_id).await?;
        let lines = self.store.counts_for_audit(audit.id).await?;
        Ok(workflow::summarize(&lines))
    }
}
