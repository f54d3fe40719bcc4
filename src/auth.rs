//! Authentication flows for the roombook console

use tracing::info;
use validator::Validate;

use roombook_protocol::CredentialsPayload;

use crate::client::BookingApi;
use crate::error::{Result, RoombookError};
use crate::session::{AuthSession, SessionStore};

/// Login, registration and logout against a [`BookingApi`]
pub struct AuthService<'a, C: BookingApi> {
    api: &'a C,
}

impl<'a, C: BookingApi> AuthService<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }

    /// Log in and store the resulting session.
    ///
    /// Returns the session as stored, which may carry an identity filled in
    /// from the token when the server left it out.
    pub async fn login(
        &self,
        sessions: &mut SessionStore,
        username: &str,
        password: &str,
    ) -> Result<AuthSession> {
        let credentials = credentials(username, password)?;
        let response = self.api.login(&credentials).await?;
        if response.token.trim().is_empty() {
            return Err(RoombookError::authentication("the server returned an empty token"));
        }

        sessions.set_session(Some(AuthSession::from(response)))?;
        let session = sessions
            .session()
            .cloned()
            .ok_or_else(RoombookError::session_not_found)?;

        info!(user = session.username(), role = %session.role(), "logged in");
        Ok(session)
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(
        &self,
        sessions: &mut SessionStore,
        username: &str,
        password: &str,
    ) -> Result<AuthSession> {
        let credentials = credentials(username, password)?;
        self.api.register(&credentials).await?;
        info!(user = username, "account registered");
        self.login(sessions, username, password).await
    }

    /// Forget the local session; the server keeps no logout state.
    pub fn logout(&self, sessions: &mut SessionStore) -> Result<()> {
        sessions.logout()
    }
}

fn credentials(username: &str, password: &str) -> Result<CredentialsPayload> {
    let payload = CredentialsPayload {
        username: username.trim().to_string(),
        password: password.to_string(),
    };
    payload.validate()?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IdentitySource;
    use crate::storage::{MemoryStorage, Storage, SESSION_KEY};
    use crate::tests::mocks::MockBookingApi;
    use crate::tests::test_helpers::make_token;
    use roombook_protocol::UserRole;
    use serde_json::json;
    use std::sync::Arc;

    fn sessions() -> (Arc<dyn Storage>, SessionStore) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        (storage.clone(), SessionStore::new(storage))
    }

    #[tokio::test]
    async fn test_login_with_full_user_block() {
        let api = MockBookingApi::new("opaque").with_user("jdoe", "ADMIN");
        let (storage, mut sessions) = sessions();

        let session = AuthService::new(&api)
            .login(&mut sessions, " jdoe ", "secret")
            .await
            .unwrap();

        assert_eq!(session.username(), "jdoe");
        assert_eq!(session.role(), UserRole::Admin);
        assert_eq!(session.identity_source(), IdentitySource::Server);
        assert_eq!(api.calls(), vec!["login jdoe".to_string()]);
        assert!(storage.get(SESSION_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_without_user_block_uses_claims() {
        let token = make_token(&json!({"sub": "ana", "role": "ROLE_ADMIN"}));
        let api = MockBookingApi::new(&token);
        let (_, mut sessions) = sessions();

        let session = AuthService::new(&api)
            .login(&mut sessions, "ana", "secret")
            .await
            .unwrap();

        assert_eq!(session.username(), "ana");
        assert!(session.is_admin());
        assert_eq!(session.identity_source(), IdentitySource::Claimed);
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let api = MockBookingApi::new("opaque").with_user("new", "USER");
        let (_, mut sessions) = sessions();

        AuthService::new(&api)
            .register(&mut sessions, "new", "pw")
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            vec!["register new".to_string(), "login new".to_string()]
        );
        assert_eq!(sessions.session().map(|s| s.username()), Some("new"));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_state() {
        let api = MockBookingApi::new("opaque");
        api.fail_with(401, "Credenciales inválidas");
        let (storage, mut sessions) = sessions();

        let err = AuthService::new(&api)
            .login(&mut sessions, "jdoe", "wrong")
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Credenciales inválidas");
        assert!(err.is_auth_error());
        assert!(sessions.session().is_none());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_credentials_never_reach_the_server() {
        let api = MockBookingApi::new("opaque");
        let (_, mut sessions) = sessions();

        assert!(AuthService::new(&api)
            .login(&mut sessions, "  ", "pw")
            .await
            .is_err());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_token_is_an_authentication_failure() {
        let api = MockBookingApi::new("");
        let (_, mut sessions) = sessions();

        let err = AuthService::new(&api)
            .login(&mut sessions, "jdoe", "pw")
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert!(sessions.session().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let api = MockBookingApi::new("opaque").with_user("jdoe", "USER");
        let (storage, mut sessions) = sessions();
        let service = AuthService::new(&api);
        service.login(&mut sessions, "jdoe", "pw").await.unwrap();

        service.logout(&mut sessions).unwrap();
        assert!(sessions.session().is_none());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }
}
