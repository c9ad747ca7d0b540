use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

pub const EQUIPMENT_READ: &str = "equipment:read";
pub const EQUIPMENT_AUDIT: &str = "equipment:audit";
pub const EQUIPMENT_ADJUST: &str = "equipment:adjust";

/// A user's membership in one organization, with the permissions granted
/// through their organization role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub permissions: sqlx::types::Json<Vec<String>>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn has_permission(&self, key: &str) -> bool {
        // Owners get everything.
        self.role == "owner" || self.permissions.0.iter().any(|p| p == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(role: &str, permissions: &[&str]) -> Membership {
        Membership {
            organization_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: role.to_string(),
            permissions: sqlx::types::Json(permissions.iter().map(|p| p.to_string()).collect()),
            is_active: true,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_has_every_permission() {
        let m = membership("owner", &[]);
        assert!(m.has_permission(EQUIPMENT_ADJUST));
        assert!(m.has_permission(EQUIPMENT_READ));
    }

    #[test]
    fn test_member_permissions_are_explicit() {
        let m = membership("coach", &[EQUIPMENT_READ, EQUIPMENT_AUDIT]);
        assert!(m.has_permission(EQUIPMENT_AUDIT));
        assert!(!m.has_permission(EQUIPMENT_ADJUST));
    }
}
