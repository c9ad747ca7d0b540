use axum::{extract::State, response::Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiJson, ApiQuery};
use crate::{
    error::AppResult,
    middleware::CurrentMember,
    models::{
        rbac::{EQUIPMENT_ADJUST, EQUIPMENT_AUDIT, EQUIPMENT_READ},
        Audit, AuditCount, AuditDetail, AuditListing, AuditStatus, AuditType, CountStatus,
        CountWithEquipment,
    },
    services::{BatchCountEntry, BatchOutcome, CreateAudit, UpdateAudit},
    state::AppState,
    store::{AuditListFilter, CountListFilter},
    workflow::AuditSummary,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<AuditStatus>,
    pub audit_type: Option<AuditType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<ListQuery> for AuditListFilter {
    fn from(q: ListQuery) -> Self {
        let defaults = AuditListFilter::default();
        Self {
            status: q.status,
            audit_type: q.audit_type,
            date_from: q.date_from,
            date_to: q.date_to,
            search: q.search.filter(|s| !s.trim().is_empty()),
            limit: q.limit.unwrap_or(defaults.limit),
            offset: q.offset.unwrap_or(defaults.offset),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCountsQuery {
    pub audit_id: Uuid,
    pub status: Option<CountStatus>,
    pub has_discrepancy: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct IdInput {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NotesInput {
    pub id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonInput {
    pub id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveInput {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRecordInput {
    pub counts: Vec<BatchCountEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkApproveInput {
    pub audit_id: Uuid,
    pub count_ids: Vec<Uuid>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BatchRecordResponse {
    pub updated: usize,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

#[derive(Debug, Serialize)]
pub struct BulkApproveResponse {
    pub approved: usize,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

// ---- Queries ----

pub async fn list(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<Vec<AuditListing>>> {
    let actor = member.require(EQUIPMENT_READ)?;
    let audits = state.audits.list(&actor, &query.into()).await?;
    Ok(Json(audits))
}

pub async fn get(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> AppResult<Json<AuditDetail>> {
    let actor = member.require(EQUIPMENT_READ)?;
    Ok(Json(state.audits.get(&actor, query.id).await?))
}

pub async fn list_counts(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListCountsQuery>,
) -> AppResult<Json<Vec<CountWithEquipment>>> {
    let actor = member.require(EQUIPMENT_READ)?;
    let filter = CountListFilter {
        status: query.status,
        has_discrepancy: query.has_discrepancy,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    Ok(Json(state.audits.list_counts(&actor, query.audit_id, &filter).await?))
}

pub async fn get_summary(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> AppResult<Json<AuditSummary>> {
    let actor = member.require(EQUIPMENT_READ)?;
    Ok(Json(state.audits.summary(&actor, query.id).await?))
}

// ---- Audit lifecycle ----

pub async fn create(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateAudit>,
) -> AppResult<Json<Audit>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.create(&actor, input).await?))
}

pub async fn update(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<UpdateAudit>,
) -> AppResult<Json<Audit>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.update(&actor, input).await?))
}

pub async fn delete(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<IdInput>,
) -> AppResult<Json<Value>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    state.audits.delete(&actor, input.id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn start(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<IdInput>,
) -> AppResult<Json<Audit>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.start(&actor, input.id).await?))
}

pub async fn complete(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NotesInput>,
) -> AppResult<Json<Audit>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.complete(&actor, input.id, input.notes.as_deref()).await?))
}

pub async fn cancel(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ReasonInput>,
) -> AppResult<Json<Audit>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.cancel(&actor, input.id, input.reason.as_deref()).await?))
}

// ---- Counting ----

pub async fn record_count(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(entry): ApiJson<BatchCountEntry>,
) -> AppResult<Json<AuditCount>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.record_count(&actor, entry.id, &entry.input).await?))
}

pub async fn batch_record_counts(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BatchRecordInput>,
) -> AppResult<Json<BatchRecordResponse>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    let outcome = state.audits.batch_record_counts(&actor, &input.counts).await?;
    Ok(Json(BatchRecordResponse {
        updated: outcome.succeeded.len(),
        outcome,
    }))
}

pub async fn skip_count(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ReasonInput>,
) -> AppResult<Json<AuditCount>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.skip_count(&actor, input.id, input.reason.as_deref()).await?))
}

pub async fn verify_count(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NotesInput>,
) -> AppResult<Json<AuditCount>> {
    let actor = member.require(EQUIPMENT_AUDIT)?;
    Ok(Json(state.audits.verify_count(&actor, input.id, input.notes.as_deref()).await?))
}

// ---- Adjustments ----

pub async fn approve_adjustment(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ApproveInput>,
) -> AppResult<Json<AuditCount>> {
    let actor = member.require(EQUIPMENT_ADJUST)?;
    Ok(Json(state.audits.approve_adjustment(&actor, input.id, &input.reason).await?))
}

pub async fn reject_adjustment(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ReasonInput>,
) -> AppResult<Json<AuditCount>> {
    let actor = member.require(EQUIPMENT_ADJUST)?;
    Ok(Json(state.audits.reject_adjustment(&actor, input.id, input.reason.as_deref()).await?))
}

pub async fn bulk_approve_adjustments(
    member: CurrentMember,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BulkApproveInput>,
) -> AppResult<Json<BulkApproveResponse>> {
    let actor = member.require(EQUIPMENT_ADJUST)?;
    let outcome = state
        .audits
        .bulk_approve_adjustments(&actor, input.audit_id, &input.count_ids, &input.reason)
        .await?;
    Ok(Json(BulkApproveResponse {
        approved: outcome.succeeded.len(),
        outcome,
    }))
}
