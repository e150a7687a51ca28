use std::sync::Arc;

use crate::{
    audit::AuditLogger, broadcast::BroadcastScheduler, config::Config,
    directory::UserDirectory, messaging::port::MessagingPort, pairing::PairingDirectory,
    state::StateStore,
};

/// Shared handles the relay and operator flows work against.
#[derive(Clone)]
pub struct Services {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub states: Arc<StateStore>,
    pub pairing: Arc<PairingDirectory>,
    pub directory: Arc<dyn UserDirectory>,
    pub broadcaster: Arc<BroadcastScheduler>,
    pub audit: Arc<AuditLogger>,
}
