use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

use super::EquipmentCondition;
use crate::workflow::AuditAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "equipment_audit_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::Scheduled => write!(f, "scheduled"),
            AuditStatus::InProgress => write!(f, "in_progress"),
            AuditStatus::Completed => write!(f, "completed"),
            AuditStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "equipment_audit_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    Full,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "equipment_count_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Pending,
    Counted,
    Verified,
    Adjusted,
    Skipped,
}

impl std::fmt::Display for CountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountStatus::Pending => write!(f, "pending"),
            CountStatus::Counted => write!(f, "counted"),
            CountStatus::Verified => write!(f, "verified"),
            CountStatus::Adjusted => write!(f, "adjusted"),
            CountStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// One physical inventory count exercise.
///
/// The counter columns (`total_items` .. `total_counted_quantity`) are a
/// historical snapshot: the totals are written at start, the counted figures at
/// completion. Live progress always comes from the count lines.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub scheduled_date: NaiveDate,
    pub audit_type: AuditType,
    pub category_filter: Option<String>,
    pub location_id: Option<Uuid>,
    pub notes: Option<String>,
    pub status: AuditStatus,
    pub total_items: i32,
    pub total_expected_quantity: i32,
    pub counted_items: i32,
    pub items_with_discrepancy: i32,
    pub total_counted_quantity: i32,
    pub created_by: Uuid,
    pub performed_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Row returned by `list`: the audit plus joined display names.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
    pub location_name: Option<String>,
    pub created_by_name: Option<String>,
    pub performed_by_name: Option<String>,
}

/// Expected-vs-counted record for one equipment item inside one audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditCount {
    pub id: Uuid,
    pub audit_id: Uuid,
    pub equipment_id: Uuid,
    pub expected_quantity: i32,
    pub counted_quantity: Option<i32>,
    pub discrepancy: Option<i32>,
    pub observed_condition: Option<EquipmentCondition>,
    pub notes: Option<String>,
    pub status: CountStatus,
    pub adjustment_approved: bool,
    pub adjustment_reason: Option<String>,
    pub adjusted_by: Option<Uuid>,
    pub adjusted_at: Option<DateTime<Utc>>,
    pub counted_by: Option<Uuid>,
    pub counted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditCount {
    pub fn has_discrepancy(&self) -> bool {
        matches!(self.discrepancy, Some(d) if d != 0)
    }
}

/// Count line joined with the catalog fields a counter needs on screen.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CountWithEquipment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub count: AuditCount,
    pub equipment_name: String,
    pub equipment_category: Option<String>,
    pub equipment_brand: Option<String>,
    pub equipment_condition: EquipmentCondition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetail {
    #[serde(flatten)]
    pub audit: Audit,
    pub location_name: Option<String>,
    pub allowed_actions: Vec<AuditAction>,
    pub counts: Vec<CountWithEquipment>,
}
