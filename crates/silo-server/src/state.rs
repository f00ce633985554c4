use silo_core::store::DataStore;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub store: DataStore,
    /// Pretty-print served JSON (master setting, mainly for debugging).
    pub pretty_json: bool,
}
