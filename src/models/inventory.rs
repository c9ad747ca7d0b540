use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Physical condition of a piece of equipment.
///
/// Shared by the catalog's recorded condition and the condition a counter
/// observes during an audit; the two are stored in separate columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "equipment_condition", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCondition {
    New,
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

impl std::fmt::Display for EquipmentCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EquipmentCondition::New => "new",
            EquipmentCondition::Excellent => "excellent",
            EquipmentCondition::Good => "good",
            EquipmentCondition::Fair => "fair",
            EquipmentCondition::Poor => "poor",
            EquipmentCondition::Damaged => "damaged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Equipment catalog entry. Audits reference these rows but do not own them;
/// only an approved adjustment writes back to the quantity/condition columns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub location_id: Option<Uuid>,
    pub total_quantity: i32,
    pub available_quantity: i32,
    pub condition: EquipmentCondition,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Units currently checked out or otherwise not available.
    pub fn in_use(&self) -> i32 {
        self.total_quantity - self.available_quantity
    }
}

/// Filter the snapshot provider applies to the catalog when an audit starts.
#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub category: Option<String>,
    pub location_id: Option<Uuid>,
}

impl EquipmentFilter {
    /// Whether an active catalog row falls inside this filter.
    pub fn matches(&self, equipment: &Equipment) -> bool {
        if !equipment.is_active {
            return false;
        }
        if let Some(category) = &self.category {
            if equipment.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(location_id) = self.location_id {
            if equipment.location_id != Some(location_id) {
                return false;
            }
        }
        true
    }
}
