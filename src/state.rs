use std::sync::Arc;

use crate::auth::TokenGate;
use crate::services::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub gate: Arc<TokenGate>,
}
