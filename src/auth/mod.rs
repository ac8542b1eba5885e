use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::config::AuthConfig;

/// In-memory session tokens with expiry. There is a single admin identity,
/// so a token is all the state a session carries.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, DateTime<Utc>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new session token valid for `hours`.
    pub fn create(&mut self, hours: u64) -> String {
        let token = generate_token();
        self.sessions
            .insert(token.clone(), Utc::now() + Duration::hours(hours as i64));
        token
    }

    /// True when the token exists and has not expired. Expired tokens are
    /// dropped on the way through.
    pub fn validate(&mut self, token: &str) -> bool {
        match self.sessions.get(token) {
            Some(expires_at) if *expires_at > Utc::now() => true,
            Some(_) => {
                self.sessions.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn revoke(&mut self, token: &str) {
        self.sessions.remove(token);
    }
}

/// Check a submitted password against the configured credential: a bcrypt
/// hash when `password_hash` is set, a plain comparison otherwise. With no
/// credential configured, every attempt fails.
pub fn verify_password(config: &AuthConfig, submitted: &str) -> bool {
    if let Some(hash) = &config.password_hash {
        return bcrypt::verify(submitted, hash).unwrap_or(false);
    }
    match &config.password {
        Some(expected) => !expected.is_empty() && submitted == expected,
        None => false,
    }
}

/// Pull a named cookie out of request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            if key == name {
                Some(value.to_string())
            } else {
                None
            }
        })
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
