pub mod audit;
pub mod inventory;
pub mod rbac;

pub use audit::{
    Audit, AuditCount, AuditDetail, AuditListing, AuditStatus, AuditType,
    CountStatus, CountWithEquipment,
};
pub use inventory::{Equipment, EquipmentCondition, EquipmentFilter, Location};
pub use rbac::Membership;
