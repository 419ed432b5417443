// Allow dead code: Infrastructure methods for future use
#![allow(dead_code)]

use std::mem;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{normalize, ApiClient, ApiError};
use crate::auth::store::TokenStore;
use crate::models::UserProfile;

/// Where the session currently stands.
///
/// `Authenticating` and `ProfileLoading` cover the window where a network
/// call is in flight; a token without a resolved user only ever exists in
/// `ProfileLoading`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    ProfileLoading,
    Authenticated { user: UserProfile },
}

/// What a register call produced. Some backend variants return a token
/// (auto-login), others require a separate login afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    LoggedIn(UserProfile),
    Registered,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0} must not be empty")]
    Validation(&'static str),

    #[error("no token received from server")]
    MissingToken,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("token storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Owns the authentication token and the user profile it belongs to.
///
/// The manager is the only writer of the persisted token; the `ApiClient` it
/// wraps carries a copy so outgoing requests pick up the Authorization
/// header. All operations resolve on the caller's task; overlapping
/// `refresh_user` calls are not deduplicated and the last response wins.
pub struct SessionManager<S: TokenStore> {
    client: ApiClient,
    store: S,
    token: Option<String>,
    state: SessionState,
}

impl<S: TokenStore> SessionManager<S> {
    /// Restore the session from the store: a persisted token starts the
    /// session in `ProfileLoading` (resolve it with [`initialize`]),
    /// otherwise it starts `Unauthenticated`.
    ///
    /// [`initialize`]: SessionManager::initialize
    pub fn new(mut client: ApiClient, store: S) -> Self {
        let token = store.get().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read persisted token");
            None
        });
        let state = if token.is_some() {
            SessionState::ProfileLoading
        } else {
            SessionState::Unauthenticated
        };
        if let Some(ref t) = token {
            client.set_token(t.clone());
        }
        Self {
            client,
            store,
            token,
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match &self.state {
            SessionState::Authenticated { user } => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// True while a login/register call or a profile fetch is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticating | SessionState::ProfileLoading
        )
    }

    /// The HTTP client, carrying the current token.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Resolve a `ProfileLoading` startup state by fetching the profile the
    /// persisted token belongs to. A no-op when there was no token.
    pub async fn initialize(&mut self) -> Result<(), AuthError> {
        match self.state {
            SessionState::ProfileLoading => {
                let result = self.client.me().await;
                self.resolve_profile(result)
            }
            _ => Ok(()),
        }
    }

    /// Log in with the given credentials.
    ///
    /// The token is persisted and the in-memory state updated only on
    /// success; any failure leaves the session as it was before the call.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::Validation("email"));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("password"));
        }

        let prev = mem::replace(&mut self.state, SessionState::Authenticating);
        match self.client.login(email, password).await {
            Ok(body) => self.finish_login(&body, email, prev),
            Err(e) => {
                self.state = prev;
                Err(e.into())
            }
        }
    }

    /// Register a new account. A token in the response triggers the same
    /// persist-and-authenticate path as login; without one the session is
    /// left as it was and the caller must log in separately.
    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<RegisterOutcome, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::Validation("email"));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("password"));
        }

        let prev = mem::replace(&mut self.state, SessionState::Authenticating);
        match self.client.register(email, password).await {
            Ok(body) => self.finish_register(&body, email, prev),
            Err(e) => {
                self.state = prev;
                Err(e.into())
            }
        }
    }

    /// Clear the persisted token and the in-memory session. Cannot fail and
    /// is safe to call when already unauthenticated; a storage error is
    /// logged and the in-memory state clears regardless.
    pub fn logout(&mut self) {
        self.clear_session();
    }

    /// Re-fetch the profile for the current token.
    ///
    /// A 401 means the token has expired: the session demotes to
    /// `Unauthenticated` (persisted token cleared) and the call succeeds.
    /// Any other failure also demotes but is reported to the caller.
    pub async fn refresh_user(&mut self) -> Result<(), AuthError> {
        if self.token.is_none() {
            self.state = SessionState::Unauthenticated;
            return Ok(());
        }
        self.state = SessionState::ProfileLoading;
        let result = self.client.me().await;
        self.resolve_profile(result)
    }

    /// Apply a successful login/register response body.
    fn finish_login(
        &mut self,
        body: &Value,
        email: &str,
        prev: SessionState,
    ) -> Result<UserProfile, AuthError> {
        let payload = normalize::auth_payload(body);
        match self.apply_login_success(payload, email) {
            Ok(user) => Ok(user),
            Err(e) => {
                self.state = prev;
                Err(e)
            }
        }
    }

    /// Apply a successful register response body.
    fn finish_register(
        &mut self,
        body: &Value,
        email: &str,
        prev: SessionState,
    ) -> Result<RegisterOutcome, AuthError> {
        let payload = normalize::auth_payload(body);
        if payload.token.is_none() {
            debug!("Register response carried no token, separate login required");
            self.state = prev;
            return Ok(RegisterOutcome::Registered);
        }
        match self.apply_login_success(payload, email) {
            Ok(user) => Ok(RegisterOutcome::LoggedIn(user)),
            Err(e) => {
                self.state = prev;
                Err(e)
            }
        }
    }

    /// Persist the token and promote the session to `Authenticated`.
    /// A response without a usable profile falls back to `{email}`.
    fn apply_login_success(
        &mut self,
        payload: normalize::AuthPayload,
        email: &str,
    ) -> Result<UserProfile, AuthError> {
        let token = payload.token.ok_or(AuthError::MissingToken)?;
        let user = payload
            .user
            .unwrap_or_else(|| UserProfile::from_email(email));

        self.store.set(&token)?;
        self.client.set_token(token.clone());
        self.token = Some(token);
        info!(email = %user.email, "Authenticated");
        self.state = SessionState::Authenticated { user: user.clone() };
        Ok(user)
    }

    /// Apply the outcome of a profile fetch.
    fn resolve_profile(&mut self, result: Result<Value, ApiError>) -> Result<(), AuthError> {
        match result {
            Ok(body) => match normalize::user_profile(&body) {
                Some(user) => {
                    debug!(email = %user.email, "Profile refreshed");
                    self.state = SessionState::Authenticated { user };
                    Ok(())
                }
                None => {
                    self.clear_session();
                    Err(AuthError::Api(ApiError::InvalidResponse(
                        "profile missing from response".to_string(),
                    )))
                }
            },
            Err(ApiError::Unauthorized) => {
                info!("Stored token rejected, clearing session");
                self.clear_session();
                Ok(())
            }
            Err(e) => {
                self.clear_session();
                Err(e.into())
            }
        }
    }

    fn clear_session(&mut self) {
        if let Err(e) = self.store.remove() {
            warn!(error = %e, "Failed to clear persisted token");
        }
        self.client.clear_token();
        self.token = None;
        self.state = SessionState::Unauthenticated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryTokenStore;
    use serde_json::json;

    fn manager(store: MemoryTokenStore) -> SessionManager<MemoryTokenStore> {
        let client = ApiClient::new("http://127.0.0.1:9").expect("client");
        SessionManager::new(client, store)
    }

    fn authenticated_manager() -> SessionManager<MemoryTokenStore> {
        let mut session = manager(MemoryTokenStore::new());
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);
        session
            .finish_login(
                &json!({"data": {"token": "T1", "user": {"email": "a@b.com"}}}),
                "a@b.com",
                prev,
            )
            .expect("login");
        session
    }

    #[test]
    fn test_initial_state_with_persisted_token() {
        let session = manager(MemoryTokenStore::with_token("T0"));
        assert_eq!(*session.state(), SessionState::ProfileLoading);
        assert_eq!(session.token(), Some("T0"));
        assert_eq!(session.client().token(), Some("T0"));
        assert!(session.is_loading());
        assert!(session.user().is_none());
    }

    #[test]
    fn test_initial_state_without_token() {
        let session = manager(MemoryTokenStore::new());
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_login_rejects_empty_inputs() {
        let mut session = manager(MemoryTokenStore::new());

        let err = session.login("", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation("email")));

        let err = session.login("a@b.com", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation("password")));

        // Validation fails before any network call or state change
        assert_eq!(*session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_login_nested_payload_authenticates() {
        let mut session = manager(MemoryTokenStore::new());
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);

        let user = session
            .finish_login(
                &json!({"data": {"token": "T1", "user": {"email": "a@b.com"}}}),
                "a@b.com",
                prev,
            )
            .expect("login");

        assert_eq!(user.email, "a@b.com");
        assert_eq!(session.token(), Some("T1"));
        assert!(session.is_authenticated());
        assert_eq!(
            session.store.get().expect("store").as_deref(),
            Some("T1")
        );
    }

    #[test]
    fn test_login_without_profile_falls_back_to_email() {
        let mut session = manager(MemoryTokenStore::new());
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);

        let user = session
            .finish_login(&json!({"access_token": "T9"}), "x@y.zz", prev)
            .expect("login");

        assert_eq!(user.email, "x@y.zz");
        assert!(user.id.is_none());
        assert_eq!(session.token(), Some("T9"));
    }

    #[test]
    fn test_login_without_token_fails_and_preserves_state() {
        let mut session = manager(MemoryTokenStore::new());
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);

        let err = session.finish_login(&json!({}), "a@b.com", prev).unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
        assert_eq!(session.store.get().expect("store"), None);
    }

    #[test]
    fn test_failed_relogin_keeps_existing_session() {
        let mut session = authenticated_manager();
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);

        let err = session.finish_login(&json!({}), "a@b.com", prev).unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
        // The earlier session survives a failed re-login
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("T1"));
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut session = authenticated_manager();
        assert!(session.is_authenticated());

        session.logout();
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
        assert!(session.user().is_none());
        assert!(session.client().token().is_none());
        assert_eq!(session.store.get().expect("store"), None);

        // Safe to call again when already unauthenticated
        session.logout();
        assert_eq!(*session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_profile_success_updates_user() {
        let mut session = authenticated_manager();
        session.state = SessionState::ProfileLoading;

        session
            .resolve_profile(Ok(json!({"user": {"id": "u1", "email": "a@b.com", "name": "Ada"}})))
            .expect("refresh");

        let user = session.user().expect("user");
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert_eq!(user.id.as_deref(), Some("u1"));
        // The most recent successful fetch wins
        session
            .resolve_profile(Ok(json!({"user": {"id": "u1", "email": "a@b.com", "name": "Grace"}})))
            .expect("refresh");
        assert_eq!(session.user().expect("user").name.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_profile_unauthorized_demotes_quietly() {
        let mut session = authenticated_manager();
        session.state = SessionState::ProfileLoading;

        session
            .resolve_profile(Err(ApiError::Unauthorized))
            .expect("401 is locally recovered");

        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
        assert_eq!(session.store.get().expect("store"), None);
    }

    #[test]
    fn test_profile_failure_demotes_and_reports() {
        let mut session = authenticated_manager();
        session.state = SessionState::ProfileLoading;

        let err = session
            .resolve_profile(Err(ApiError::ServerError("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, AuthError::Api(ApiError::ServerError(_))));
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert_eq!(session.store.get().expect("store"), None);
    }

    #[test]
    fn test_profile_without_user_shape_demotes() {
        let mut session = authenticated_manager();
        session.state = SessionState::ProfileLoading;

        let err = session.resolve_profile(Ok(json!({"status": "ok"}))).unwrap_err();
        assert!(matches!(err, AuthError::Api(ApiError::InvalidResponse(_))));
        assert_eq!(*session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_register_without_token_leaves_unauthenticated() {
        let mut session = manager(MemoryTokenStore::new());
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);

        let outcome = session
            .finish_register(&json!({"data": {}}), "a@b.com", prev)
            .expect("register");

        assert_eq!(outcome, RegisterOutcome::Registered);
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_register_with_token_auto_logs_in() {
        let mut session = manager(MemoryTokenStore::new());
        let prev = mem::replace(&mut session.state, SessionState::Authenticating);

        let outcome = session
            .finish_register(
                &json!({"token": "T3", "user": {"email": "a@b.com"}}),
                "a@b.com",
                prev,
            )
            .expect("register");

        assert!(matches!(outcome, RegisterOutcome::LoggedIn(_)));
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("T3"));
    }

    #[tokio::test]
    async fn test_refresh_without_token_is_a_no_op() {
        let mut session = manager(MemoryTokenStore::new());
        session.refresh_user().await.expect("refresh");
        assert_eq!(*session.state(), SessionState::Unauthenticated);
    }
}
