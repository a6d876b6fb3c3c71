use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tower_sessions::{
    cookie::time::OffsetDateTime,
    session::{Id, Record},
    session_store, SessionStore,
};
use tracing::warn;

use crate::{
    error::StoreError,
    repositories::kv_store::{load_json, save_json, KeyValueStore},
};

const SESSION_PREFIX: &str = "voter_session.";

fn session_key(id: &Id) -> String {
    format!("{SESSION_PREFIX}{id}")
}

fn backend(e: StoreError) -> session_store::Error {
    session_store::Error::Backend(e.to_string())
}

/// Cookie sessions kept in the local key-value store, one document per
/// session, so voter ids outlive a restart.
#[derive(Clone)]
pub struct KvSessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl KvSessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }
}

impl fmt::Debug for KvSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvSessionStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for KvSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.kv.get(&session_key(&record.id)).map_err(backend)?.is_some() {
            record.id = Id::default();
        }
        self.save(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        save_json(self.kv.as_ref(), &session_key(&record.id), record).map_err(backend)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let key = session_key(session_id);
        let record = match load_json::<Record>(self.kv.as_ref(), &key) {
            Ok(record) => record,
            Err(StoreError::ConfigCorrupt { reason, .. }) => {
                warn!(key = %key, reason = %reason, "dropping unreadable session");
                self.kv.remove(&key).map_err(backend)?;
                return Ok(None);
            }
            Err(e) => return Err(backend(e)),
        };

        match record {
            Some(record) if record.expiry_date > OffsetDateTime::now_utc() => Ok(Some(record)),
            Some(_) => {
                self.kv.remove(&key).map_err(backend)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.kv.remove(&session_key(session_id)).map_err(backend)
    }
}
