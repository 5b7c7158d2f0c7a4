//! HTTP API for swapdesk

mod handlers;
pub mod types;

pub use handlers::create_router;
pub use types::*;

use crate::db::Database;
use crate::engine::{DatabaseStorage, NegotiationEngine, ProductionEngine};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProductionEngine>,
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            engine: Arc::new(NegotiationEngine::new(DatabaseStorage::new(db.clone()))),
            db,
        }
    }
}
