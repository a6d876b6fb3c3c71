use chrono::Utc;
use tower_sessions::Session;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    repositories::kv_store::{KeyValueStore, SESSION_ID_KEY},
};

const VOTER_SESSION_KEY: &str = "voter_session_id";

/// `session_<millis>_<9 random chars>`
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}

fn is_well_formed(id: &str) -> bool {
    id.starts_with("session_") && id.len() > "session_".len()
}

/// The service's own identity, created once and reused across restarts.
pub fn load_or_create_installation_id(store: &dyn KeyValueStore) -> String {
    match store.get(SESSION_ID_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<String>(&raw) {
            Ok(id) if is_well_formed(&id) => return id,
            _ => warn!(key = SESSION_ID_KEY, "stored installation id is corrupt, replacing it"),
        },
        Ok(None) => {}
        Err(e) => error!(error = %e, "could not read installation id"),
    }

    let id = generate_session_id();
    match serde_json::to_string(&id) {
        Ok(raw) => {
            if let Err(e) = store.put(SESSION_ID_KEY, &raw) {
                error!(error = %e, "could not persist installation id");
            }
        }
        Err(e) => error!(error = %e, "could not encode installation id"),
    }
    info!(installation_id = %id, "created installation id");
    id
}

/// Per-browser voter id, kept in the cookie session for as long as it lives.
pub async fn voter_session_id(session: &Session) -> Result<String, AppError> {
    if let Some(id) = session.get::<String>(VOTER_SESSION_KEY).await? {
        return Ok(id);
    }
    let id = generate_session_id();
    session.insert(VOTER_SESSION_KEY, id.clone()).await?;
    Ok(id)
}

/// Reads the voter id without creating one.
pub async fn existing_voter_session_id(session: &Session) -> Result<Option<String>, AppError> {
    Ok(session.get::<String>(VOTER_SESSION_KEY).await?)
}
