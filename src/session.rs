use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[allow(dead_code)]
    #[error("session backend failure: {0}")]
    Backend(String),
}

/// The authenticated principal behind a session cookie.
#[derive(Clone)]
pub struct Session {
    pub principal_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("principal_id", &self.principal_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Server-side session storage. Each call is atomic on its own key.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Stores a new session and returns its freshly generated id.
    async fn create(&self, principal_id: &str, access_token: &str)
        -> Result<String, SessionError>;

    /// Fails with `Unauthenticated` for empty, unknown, expired or revoked ids.
    async fn resolve(&self, session_id: &str) -> Result<Session, SessionError>;

    /// Removes the session. Absent ids are not an error.
    async fn invalidate(&self, session_id: &str) -> Result<(), SessionError>;
}

pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// First characters of a session id, safe to put in logs.
pub fn id_prefix(session_id: &str) -> &str {
    session_id.get(..6).unwrap_or(session_id)
}

struct Record {
    session: Session,
    created_at: Instant,
}

/// Process-local store. Sessions vanish on restart.
pub struct MemorySessionStore {
    sessions: DashMap<String, Record>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops every session older than the TTL. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions
            .retain(|_, record| record.created_at.elapsed() < ttl);
        before.saturating_sub(self.sessions.len())
    }

    fn insert_with(&self, session: Session, mut next_id: impl FnMut() -> String) -> String {
        loop {
            let id = next_id();
            match self.sessions.entry(id) {
                Entry::Occupied(_) => {
                    tracing::warn!("session id collision, regenerating");
                    continue;
                }
                Entry::Vacant(slot) => {
                    let id = slot.key().clone();
                    slot.insert(Record {
                        session,
                        created_at: Instant::now(),
                    });
                    return id;
                }
            }
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        principal_id: &str,
        access_token: &str,
    ) -> Result<String, SessionError> {
        let session = Session {
            principal_id: principal_id.to_string(),
            access_token: access_token.to_string(),
        };
        Ok(self.insert_with(session, generate_session_id))
    }

    async fn resolve(&self, session_id: &str) -> Result<Session, SessionError> {
        if session_id.is_empty() {
            return Err(SessionError::Unauthenticated);
        }

        match self.sessions.get(session_id) {
            Some(record) if record.created_at.elapsed() < self.ttl => {
                return Ok(record.session.clone());
            }
            Some(_) => {}
            None => return Err(SessionError::Unauthenticated),
        }

        // Past the TTL: drop it unless it was replaced in the meantime.
        let ttl = self.ttl;
        self.sessions
            .remove_if(session_id, |_, record| record.created_at.elapsed() >= ttl);
        Err(SessionError::Unauthenticated)
    }

    async fn invalidate(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

/// Periodically removes expired sessions so abandoned cookies don't pile up.
pub fn spawn_sweeper(store: Arc<MemorySessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.prune_expired();
            if removed > 0 {
                tracing::info!(removed, remaining = store.len(), "pruned expired sessions");
            }
        }
    })
}
