use std::sync::Arc;

use tower_sessions::{
    cookie::{time::Duration, SameSite},
    Expiry, SessionManagerLayer,
};

use crate::{
    config::settings::Settings,
    repositories::{kv_store::KeyValueStore, session_repository::KvSessionStore},
};

/// Voter sessions live in a cookie; the id inside is what ties votes together.
/// Session records are kept in the local store and survive restarts.
pub fn init_session(
    settings: &Settings,
    kv: Arc<dyn KeyValueStore>,
) -> SessionManagerLayer<KvSessionStore> {
    SessionManagerLayer::new(KvSessionStore::new(kv))
        .with_name("civic_poll_session")
        .with_same_site(if settings.session_secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .with_secure(settings.session_secure)
        .with_path("/")
        .with_expiry(Expiry::OnInactivity(Duration::days(settings.session_days)))
}
