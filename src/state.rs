use std::sync::Arc;

use crate::{config::Config, services::EquipmentAuditService};

#[derive(Clone)]
pub struct AppState {
    pub audits: EquipmentAuditService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(audits: EquipmentAuditService, config: Config) -> Self {
        Self {
            audits,
            config: Arc::new(config),
        }
    }
}
