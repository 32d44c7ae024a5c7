//! HTTP API for dealflow

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::store::ProductionStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProductionStore>,
}

impl AppState {
    pub fn new(store: Arc<ProductionStore>) -> Self {
        Self { store }
    }
}
