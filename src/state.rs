use std::sync::Arc;

use crate::db::EventStore;
use crate::services::catalog::CatalogService;

/// Shared application state.
///
/// Both collaborators are constructed once at startup and injected here;
/// business logic never builds a client on its own. Handlers only read,
/// so plain Arcs suffice.
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub catalog: Arc<dyn CatalogService>,
}
