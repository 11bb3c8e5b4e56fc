//! Browser sessions: which database a client has selected, plus one-shot
//! notices shown on the next rendered page.
//!
//! Handlers never touch cookies. They read and mutate a [`Session`]; the
//! session middleware loads it through a [`SessionStore`] before the
//! handler runs and persists it afterwards. Two stores exist:
//!
//! - [`SignedCookieStore`]: the whole session lives in an HMAC-signed
//!   cookie. Nothing is kept on the server.
//! - [`MemorySessionStore`]: the cookie carries only a signed session id;
//!   the session itself is kept in process memory.
//!
//! Cookie format: `base64url(payload).hex(hmac_sha256(payload))`.

use base64::Engine;
use explorer_types::DatabaseName;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Severity of a one-shot notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

impl NoticeLevel {
    /// CSS class used when rendering.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A message queued for display on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Per-client session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    #[serde(default)]
    database: Option<DatabaseName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    notices: Vec<Notice>,
    #[serde(skip)]
    dirty: bool,
}

impl Session {
    /// Starts a fresh session. New sessions are dirty so the client
    /// receives a cookie on its first response.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            database: None,
            notices: Vec::new(),
            dirty: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The database file bound to this session, if any.
    pub fn active_database(&self) -> Option<&DatabaseName> {
        self.database.as_ref()
    }

    /// Binds `name` as the active database, replacing any previous choice.
    pub fn select_database(&mut self, name: DatabaseName) {
        self.database = Some(name);
        self.dirty = true;
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        self.dirty = true;
    }

    /// Drains queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        if !self.notices.is_empty() {
            self.dirty = true;
        }
        std::mem::take(&mut self.notices)
    }

    /// Whether the session changed since it was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(mut self) -> Self {
        self.dirty = false;
        self
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage backend for sessions.
///
/// A store resolves the value of the session cookie into a [`Session`] and
/// turns a session back into the cookie value to send to the client.
/// Implementations must treat unknown, tampered or malformed cookies as "no
/// session" and start a fresh one.
pub trait SessionStore: Send + Sync {
    /// Loads the session identified by `cookie`, or a new session.
    fn load(&self, cookie: Option<&str>) -> Session;

    /// Persists `session` and returns the cookie value identifying it.
    fn save(&self, session: &Session) -> String;
}

/// Signs and verifies cookie payloads with HMAC-SHA256.
#[derive(Clone)]
pub struct CookieSigner {
    key: [u8; 32],
}

impl CookieSigner {
    /// Derives the signing key from a configured secret.
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"explorer-session-v1:");
        hasher.update(secret);
        let mut key = [0u8; 32];
        key.copy_from_slice(&hasher.finalize());
        Self { key }
    }

    fn mac(&self) -> Hmac<Sha256> {
        // HMAC accepts keys of any length.
        Hmac::<Sha256>::new_from_slice(&self.key).expect("HMAC key length is valid")
    }

    /// Returns `base64url(payload).hex(signature)`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        let signature = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload),
            hex::encode(signature)
        )
    }

    /// Returns the payload if `value` carries a valid signature.
    pub fn verify(&self, value: &str) -> Option<Vec<u8>> {
        let (encoded, sig_hex) = value.split_once('.')?;
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .ok()?;
        let signature = hex::decode(sig_hex).ok()?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&signature).ok()?;
        Some(payload)
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

/// Keeps the whole session in the signed cookie.
#[derive(Debug, Clone)]
pub struct SignedCookieStore {
    signer: CookieSigner,
}

impl SignedCookieStore {
    pub fn new(signer: CookieSigner) -> Self {
        Self { signer }
    }
}

impl SessionStore for SignedCookieStore {
    fn load(&self, cookie: Option<&str>) -> Session {
        cookie
            .and_then(|value| self.signer.verify(value))
            .and_then(|payload| serde_json::from_slice::<Session>(&payload).ok())
            .map(Session::mark_clean)
            .unwrap_or_default()
    }

    fn save(&self, session: &Session) -> String {
        match serde_json::to_vec(session) {
            Ok(payload) => self.signer.sign(&payload),
            Err(e) => {
                // Only reachable if serialization of plain strings fails.
                tracing::error!(error = %e, "failed to serialize session");
                self.signer.sign(b"{}")
            }
        }
    }
}

/// Upper bound on sessions held at once.
const MAX_MEMORY_SESSIONS: usize = 10_000;

/// Sessions idle longer than this are eligible for eviction.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Sessions dropped in one go once the store is full, so eviction runs
/// once per batch of new sessions rather than on every insert.
const EVICTION_BATCH: usize = MAX_MEMORY_SESSIONS / 10;

/// Drops idle sessions, then the least recently seen ones until there is
/// room for `EVICTION_BATCH` new sessions.
fn evict(sessions: &mut HashMap<Uuid, (Session, Instant)>, now: Instant) {
    sessions.retain(|_, (_, seen)| now.duration_since(*seen) <= SESSION_IDLE_TTL);

    let target = MAX_MEMORY_SESSIONS - EVICTION_BATCH;
    if sessions.len() <= target {
        return;
    }
    let mut by_age: Vec<(Instant, Uuid)> = sessions
        .iter()
        .map(|(id, (_, seen))| (*seen, *id))
        .collect();
    by_age.sort_unstable();
    let excess = sessions.len() - target;
    for (_, id) in by_age.into_iter().take(excess) {
        sessions.remove(&id);
    }
    tracing::debug!(evicted = excess, "session store full, evicted oldest sessions");
}

/// Keeps sessions in process memory, keyed by id.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    signer: CookieSigner,
    sessions: Arc<RwLock<HashMap<Uuid, (Session, Instant)>>>,
}

impl MemorySessionStore {
    pub fn new(signer: CookieSigner) -> Self {
        Self {
            signer,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        match self.sessions.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, cookie: Option<&str>) -> Session {
        let id = cookie
            .and_then(|value| self.signer.verify(value))
            .and_then(|payload| String::from_utf8(payload).ok())
            .and_then(|raw| Uuid::parse_str(&raw).ok());

        let Some(id) = id else {
            return Session::new();
        };

        let sessions = match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("session store lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        match sessions.get(&id) {
            Some((session, _)) => session.clone().mark_clean(),
            // Valid signature but unknown id (e.g. after a restart): keep
            // the id so the client's cookie stays stable.
            None => Session {
                id,
                ..Session::new()
            },
        }
    }

    fn save(&self, session: &Session) -> String {
        let now = Instant::now();
        {
            let mut sessions = match self.sessions.write() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    tracing::error!("session store lock poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            if sessions.len() >= MAX_MEMORY_SESSIONS && !sessions.contains_key(&session.id) {
                evict(&mut sessions, now);
            }
            sessions.insert(session.id, (session.clone().mark_clean(), now));
        }
        self.signer.sign(session.id.to_string().as_bytes())
    }
}
