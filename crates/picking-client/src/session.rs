use std::collections::BTreeMap;
use std::sync::Mutex;

/// Key prefixes of session artifacts which the auth client persists
/// into a SessionStore. All matching keys are removed on sign-out.
pub const SESSION_KEY_PREFIXES: &[&str] = &["sb-", "supabase.auth."];

/// Session is an authenticated session of the hosted auth service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    // Secret access token of the REST API.
    pub access_token: String,
    // Secret refresh token of the REST API.
    #[serde(default)]
    pub refresh_token: Option<String>,
    // Unix timestamp, in seconds, at which `access_token` expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// Returns true if the access token expires within `margin`.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at < (chrono::Utc::now() + margin).timestamp(),
            None => false,
        }
    }
}

/// User is the authenticated identity of a Session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: uuid::Uuid,
    #[serde(default)]
    pub email: Option<String>,
    // Metadata provided at sign-up.
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Kind of an AuthEvent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// AuthEvent is broadcast by an AuthService when its session changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

/// SessionStore is a local key-value store into which the auth client
/// persists its session, so that it survives restarts of the process.
pub trait SessionStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// Remove every key of the `store` which begins with a session key prefix,
/// returning the removed keys.
pub fn clear_session_keys(store: &dyn SessionStore) -> Vec<String> {
    let removed: Vec<String> = store
        .keys()
        .into_iter()
        .filter(|key| SESSION_KEY_PREFIXES.iter().any(|p| key.starts_with(p)))
        .collect();

    for key in &removed {
        store.remove(key);
    }
    removed
}

/// Storage key of the session for the project at `endpoint`,
/// such as "sb-abcdefgh-auth-token" for https://abcdefgh.supabase.co.
pub fn storage_key(endpoint: &url::Url) -> String {
    let project_ref = endpoint
        .host_str()
        .and_then(|host| host.split('.').next())
        .unwrap_or("local");

    format!("sb-{project_ref}-auth-token")
}

pub(crate) fn load_session(store: &dyn SessionStore, key: &str) -> Option<Session> {
    let value = store.get(key)?;

    match serde_json::from_str(&value) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::warn!(%err, key, "discarding malformed stored session");
            store.remove(key);
            None
        }
    }
}

pub(crate) fn persist_session(store: &dyn SessionStore, key: &str, session: Option<&Session>) {
    match session.map(serde_json::to_string) {
        Some(Ok(value)) => store.set(key, value),
        Some(Err(err)) => tracing::warn!(%err, "failed to serialize session"),
        None => store.remove(key),
    }
}

/// MemoryStore is a SessionStore held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Snapshot the current entries of the store.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().unwrap().clone()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
    fn set(&self, key: &str, value: String) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}
