use std::sync::Arc;

use crate::auth::password;
use crate::config::Config;
use crate::mail::Mailer;
use crate::store::Store;

/// Shared handles every handler receives through `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<Config>,
    /// Stand-in hash checked when a login names an unknown email.
    pub dummy_hash: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        Self {
            store,
            mailer,
            dummy_hash: password::dummy_hash(config.bcrypt_cost).into(),
            config: Arc::new(config),
        }
    }
}
