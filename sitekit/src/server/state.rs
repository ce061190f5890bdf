//! Server state

use std::sync::Arc;

use crate::server::reload::ReloadHub;
use crate::settings::ServeSettings;

/// Server state shared across handlers
pub struct ServerState {
    pub settings: ServeSettings,
    pub hub: Arc<ReloadHub>,
}

impl ServerState {
    pub fn new(settings: ServeSettings, hub: Arc<ReloadHub>) -> Self {
        Self { settings, hub }
    }
}
