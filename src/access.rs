//! Access control — credentials, sessions and admin gating.
//!
//! Passwords are stored on the user as Argon2id PHC strings. Login hands
//! out an opaque session token that later resolves to an `Identity` until
//! it expires. Sessions live in memory only; a restart logs everyone out.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::Ledger;
use crate::types::{LedgerError, LedgerResult, User};

/// Who is making a request, as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub is_admin: bool,
    pub is_blocked: bool,
}

impl Identity {
    fn of(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            is_admin: user.is_admin,
            is_blocked: user.is_blocked,
        }
    }

    /// Fail unless this identity is an administrator.
    pub fn require_admin(&self, action: &str) -> LedgerResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            warn!(user = %self.username, action, "Admin action denied");
            Err(LedgerError::NotAdmin(action.to_string()))
        }
    }
}

/// Hash `password` with Argon2id and a fresh salt. Returns a PHC string.
pub fn hash_password(password: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::Credential(e.to_string()))
}

/// Check `password` against a stored PHC credential.
pub fn verify_password(credential: &str, password: &str) -> bool {
    match PasswordHash::new(credential) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

struct Session {
    username: String,
    issued_at: DateTime<Utc>,
}

pub struct AccessControl {
    admin_code: Option<SecretString>,
    sessions: HashMap<String, Session>,
    session_ttl: Duration,
}

impl AccessControl {
    /// `admin_code` gates both admin signup and promotion. `None` disables
    /// both. Sessions last one hour unless changed with `with_session_ttl`.
    pub fn new(admin_code: Option<String>) -> Self {
        Self {
            admin_code: admin_code.map(SecretString::new),
            sessions: HashMap::new(),
            session_ttl: Duration::hours(1),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn code_matches(&self, supplied: &str) -> bool {
        self.admin_code
            .as_ref()
            .is_some_and(|code| code.expose_secret().as_str() == supplied)
    }

    /// Register a new account. A matching admin code makes it an admin.
    pub fn signup(
        &self,
        ledger: &mut Ledger,
        username: &str,
        password: &str,
        admin_code: Option<&str>,
    ) -> LedgerResult<Identity> {
        if password.is_empty() {
            return Err(LedgerError::InvalidSignup("password is required".into()));
        }
        let is_admin = admin_code.is_some_and(|c| self.code_matches(c));
        let user = ledger.register_user(username, hash_password(password)?, is_admin)?;
        Ok(Identity::of(user))
    }

    /// Verify credentials and open a session. Returns the session token.
    ///
    /// The username is trimmed the same way signup trims it.
    pub fn login(&mut self, ledger: &Ledger, username: &str, password: &str) -> LedgerResult<String> {
        let username = username.trim();
        let user = ledger
            .find_user(username)
            .filter(|u| verify_password(&u.credential, password))
            .ok_or_else(|| {
                warn!(user = username, "Login failed");
                LedgerError::InvalidCredentials
            })?;

        let now = Utc::now();
        let ttl = self.session_ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.issued_at < ttl);
        if self.sessions.len() < before {
            debug!(pruned = before - self.sessions.len(), "Expired sessions dropped");
        }

        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                username: user.username.clone(),
                issued_at: now,
            },
        );
        info!(user = %user.username, "User logged in");
        Ok(token)
    }

    /// End a session. Unknown tokens are ignored.
    pub fn logout(&mut self, token: &str) {
        self.sessions.remove(token);
    }

    /// Resolve a session token to the current identity. Flags are read
    /// from the ledger each time so blocks and promotions apply at once.
    pub fn resolve(&self, ledger: &Ledger, token: &str) -> LedgerResult<Identity> {
        let session = self
            .sessions
            .get(token)
            .filter(|s| Utc::now() - s.issued_at < self.session_ttl)
            .ok_or(LedgerError::Unauthenticated)?;
        let user = ledger
            .find_user(&session.username)
            .ok_or(LedgerError::Unauthenticated)?;
        Ok(Identity::of(user))
    }

    /// Make `username` an administrator if `code` matches.
    pub fn promote(&self, ledger: &mut Ledger, username: &str, code: &str) -> LedgerResult<Identity> {
        if !self.code_matches(code) {
            warn!(user = username, "Promotion rejected: wrong admin code");
            return Err(LedgerError::WrongAdminCode);
        }
        ledger.promote(username)?;
        let user = ledger
            .find_user(username)
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))?;
        Ok(Identity::of(user))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
