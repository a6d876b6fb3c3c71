use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::StoreError,
    models::lifecycle::{LifecycleConfig, PollStatus},
    repositories::kv_store::{load_or_default, save_json, KeyValueStore, POLL_CONFIG_KEY},
};

pub struct LifecycleRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl LifecycleRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Missing or corrupt configuration is replaced with the default one.
    pub fn load(&self) -> LifecycleConfig {
        let first_run = matches!(self.kv.get(POLL_CONFIG_KEY), Ok(None));
        let mut config: LifecycleConfig = load_or_default(self.kv.as_ref(), POLL_CONFIG_KEY);

        for (poll_id, state) in config.polls.iter_mut() {
            if state.status == PollStatus::Ended && state.allow_voting {
                warn!(poll_id = %poll_id, "ended poll still allowed voting, closing it");
                state.allow_voting = false;
            }
        }

        if first_run {
            info!("initializing default poll lifecycle configuration");
            if let Err(e) = self.save(&config) {
                warn!(error = %e, "could not store default lifecycle configuration");
            }
        }
        config
    }

    pub fn save(&self, config: &LifecycleConfig) -> Result<(), StoreError> {
        save_json(self.kv.as_ref(), POLL_CONFIG_KEY, config)
    }
}
