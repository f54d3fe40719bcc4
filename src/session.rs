//! Session storage for the roombook console
//!
//! A session is the bearer token plus who the console thinks the user is.
//! Login responses that leave the user block incomplete are filled in from
//! the token's unverified claims; such identities are marked
//! [`IdentitySource::Claimed`] so views can tell them from server-confirmed
//! ones.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use roombook_protocol::{LoginResponse, UserRole};

use crate::claims;
use crate::error::Result;
use crate::storage::{Storage, SESSION_KEY};

/// Username shown when neither the server nor the token names the user
pub const PLACEHOLDER_USERNAME: &str = "usuario";

/// Where the identity of a session came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Sent by the server with the login response
    #[default]
    Server,
    /// Filled in on the client from unverified token claims or defaults
    Claimed,
}

impl IdentitySource {
    fn is_server(&self) -> bool {
        *self == IdentitySource::Server
    }
}

/// User block of a session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "IdentitySource::is_server")]
    pub source: IdentitySource,
}

/// Authenticated session as persisted under [`SESSION_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

impl AuthSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user: None,
        }
    }

    pub fn with_user(mut self, username: impl Into<String>, role: UserRole) -> Self {
        self.user = Some(SessionUser {
            username: Some(username.into()),
            role: Some(role),
            source: IdentitySource::Server,
        });
        self
    }

    /// Both username and role are known.
    pub fn is_complete(&self) -> bool {
        self.user.as_ref().is_some_and(|user| {
            user.username.as_deref().is_some_and(|name| !name.is_empty()) && user.role.is_some()
        })
    }

    pub fn username(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|user| user.username.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(PLACEHOLDER_USERNAME)
    }

    pub fn role(&self) -> UserRole {
        self.user
            .as_ref()
            .and_then(|user| user.role)
            .unwrap_or_default()
    }

    pub fn identity_source(&self) -> IdentitySource {
        self.user
            .as_ref()
            .map(|user| user.source)
            .unwrap_or(IdentitySource::Claimed)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == UserRole::Admin
    }
}

impl From<LoginResponse> for AuthSession {
    fn from(response: LoginResponse) -> Self {
        let user = response.user.map(|user| SessionUser {
            username: user.username,
            role: user.role.and_then(|role| role.parse().ok()),
            source: IdentitySource::Server,
        });
        Self {
            token: response.token,
            user,
        }
    }
}

/// Fill in a missing username or role from the token's claims.
///
/// Sessions without a token, and sessions that already carry both fields,
/// come back unchanged. Username falls back `sub` claim, `username` claim,
/// existing username, [`PLACEHOLDER_USERNAME`]; role falls back role claim,
/// existing role, `USER`.
pub fn normalize(session: Option<AuthSession>) -> Option<AuthSession> {
    let mut session = session?;
    if session.token.is_empty() || session.is_complete() {
        return Some(session);
    }

    let claims = claims::decode(&session.token);
    if claims.is_empty() {
        debug!("token carries no readable claims");
    }
    let existing = session.user.take().unwrap_or_default();

    let role = claims
        .user_role()
        .or(existing.role)
        .unwrap_or_default();
    let username = claims
        .sub
        .or(claims.username)
        .or(existing.username.filter(|name| !name.is_empty()))
        .unwrap_or_else(|| PLACEHOLDER_USERNAME.to_string());

    debug!(%username, %role, "derived session identity from token claims");

    session.user = Some(SessionUser {
        username: Some(username),
        role: Some(role),
        source: IdentitySource::Claimed,
    });
    Some(session)
}

/// Owner of the current session and its durable record
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    session: Option<AuthSession>,
}

impl SessionStore {
    /// Open the store, restoring and normalizing any persisted session.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let mut store = Self {
            storage,
            session: None,
        };
        store.session = normalize(store.load());
        store
    }

    /// Read the persisted session.
    ///
    /// Corrupt records are cleared from storage and reported as absent.
    pub fn load(&self) -> Option<AuthSession> {
        let raw = match self.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read stored session: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding unreadable stored session: {}", e);
                if let Err(e) = self.storage.remove(SESSION_KEY) {
                    warn!("Could not clear stored session: {}", e);
                }
                None
            }
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// Replace the current session and persist it; `None` clears storage.
    ///
    /// The in-memory session is updated even when persisting fails.
    pub fn set_session(&mut self, session: Option<AuthSession>) -> Result<()> {
        self.session = normalize(session);

        match &self.session {
            Some(session) => {
                let content = serde_json::to_string(session)?;
                self.storage.set(SESSION_KEY, &content)
            }
            None => self.storage.remove(SESSION_KEY),
        }
    }

    pub fn logout(&mut self) -> Result<()> {
        self.set_session(None)
    }

    pub fn is_admin(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_admin())
    }
}
