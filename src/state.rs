use std::sync::Arc;

use crate::auth::Signer;
use crate::config::AppConfig;
use crate::payment::InvoicePayer;

/// Shared application state accessible to all handlers. Read-only after startup.
pub struct AppState {
    pub config: AppConfig,
    pub identity: Arc<dyn Signer>,
    pub payer: Arc<dyn InvoicePayer>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, identity: Arc<dyn Signer>, payer: Arc<dyn InvoicePayer>) -> Self {
        Self {
            config,
            identity,
            payer,
        }
    }
}
