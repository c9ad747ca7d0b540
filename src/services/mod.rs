pub mod equipment_audit;


pub use equipment_audit::{
    Actor, BatchCountEntry, BatchOutcome, CreateAudit, EquipmentAuditService, UpdateAudit,
};
