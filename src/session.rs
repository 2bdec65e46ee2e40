//! Login sessions and the thread-safe session registry.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Session token length in characters.
const TOKEN_LENGTH: usize = 128;

/// Sessions expire this long after creation. Expiry is informational only:
/// `check` tests presence, and nothing sweeps the registry.
const SESSION_HOURS: i64 = 8;

/// One login session.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn new(token: String) -> Self {
        let created_at = Utc::now();
        Self {
            token,
            created_at,
            expires_at: created_at + Duration::hours(SESSION_HOURS),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Creation time as a `%FT%TZ` UTC string.
    pub fn created_at(&self) -> String {
        self.created_at.format("%FT%TZ").to_string()
    }

    /// Expiry time as a `%FT%TZ` UTC string.
    pub fn expires_at(&self) -> String {
        self.expires_at.format("%FT%TZ").to_string()
    }
}

/// Generates a fresh random token from `[0-9a-zA-Z]`. Uniqueness is by
/// construction (128 uniform characters), not verified against the map.
fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Thread-safe token to session map. Mutation happens only through
/// `login` and `logout`; `check` is read-only.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a session with a fresh token. Does not insert it.
    pub fn generate(&self) -> Session {
        Session::new(generate_token())
    }

    /// Registers `token` with fresh timestamps. Returns false when the
    /// token is already logged in.
    pub fn login(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(token) {
            return false;
        }
        sessions.insert(token.to_string(), Session::new(token.to_string()));
        true
    }

    /// Removes `token`, returning whether it was present.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.lock().unwrap().remove(token).is_some()
    }

    /// Whether `token` is currently registered. The expiry timestamp is
    /// not consulted.
    pub fn check(&self, token: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(token)
    }
}
