use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::store::{CredentialStore, StoreSubscription};
use super::Credential;
use crate::api::{ApiError, ErrorKind};
use crate::models::{LoginResponse, UserSummary};
use crate::validate::{self, ValidationError};

/// Buffered session events per subscriber
const EVENT_CAPACITY: usize = 16;

/// Login state derived from the stored credential on every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Valid credential; the user is absent only if the service never sent one
    Authenticated(Option<UserSummary>),
    Anonymous,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out
    Explicit,
    /// The service answered 401
    Unauthorized,
    /// The credential was found past its expiry
    Expired,
}

/// Session transitions made by this tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user is absent if the service did not send one
    LoggedIn(Option<UserSummary>),
    LoggedOut(LogoutReason),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Login failed: the service did not return an access token")]
    MissingToken,

    #[error("Failed to save session: {0:#}")]
    Storage(anyhow::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Invalid(_) => ErrorKind::Validation,
            AuthError::Api(e) => e.kind(),
            AuthError::MissingToken | AuthError::Storage(_) => ErrorKind::Unknown,
        }
    }
}

/// Exchanges email and password for a token. Implemented by the gateway.
#[async_trait]
pub trait Authenticate: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
}

/// Owns the credential store and decides whether the user is logged in.
///
/// Every write to the store goes through `login`, `logout`, `invalidate`, or
/// the expiry check. Nothing is cached: each query re-reads the store, so a
/// change made by another tab is seen on the next call.
pub struct SessionManager {
    store: Box<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(store: impl CredentialStore + 'static, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Box::new(store),
            clock,
            events,
        }
    }

    pub fn with_system_clock(store: impl CredentialStore + 'static) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    /// Current time according to the session clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// True iff a credential exists with a non-empty token that has not expired.
    /// An expired credential is cleared as a side effect.
    pub fn is_authenticated(&self) -> bool {
        self.valid_credential().is_some()
    }

    pub fn state(&self) -> SessionState {
        match self.valid_credential() {
            Some(credential) => SessionState::Authenticated(credential.user),
            None => SessionState::Anonymous,
        }
    }

    pub fn current_user(&self) -> Option<UserSummary> {
        self.valid_credential().and_then(|c| c.user)
    }

    /// Bearer token of the current session, if it is still valid
    pub fn token(&self) -> Option<String> {
        self.valid_credential().map(|c| c.token)
    }

    /// Point-in-time copy of the valid credential
    pub fn credential(&self) -> Option<Credential> {
        self.valid_credential()
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.valid_credential().map(|c| c.time_until_expiry(now))
    }

    /// Log in through `api` and persist the credential for 24 hours.
    /// A token without an account still logs in; the user is then `None`.
    pub async fn login<A>(
        &self,
        api: &A,
        email: &str,
        password: &str,
    ) -> Result<Option<UserSummary>, AuthError>
    where
        A: Authenticate + ?Sized,
    {
        let email = validate::normalize_email(email);
        validate::validate_email(&email)?;
        validate::validate_password(password)?;

        let response = api.authenticate(&email, password).await?;

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let user = response.user;

        let credential = Credential::issue(token, user.clone(), self.clock.now());
        self.store.set(&credential).map_err(AuthError::Storage)?;

        info!(
            user_id = ?user.as_ref().map(|u| u.id),
            expires_at = %credential.expires_at,
            "Login successful"
        );
        let _ = self.events.send(SessionEvent::LoggedIn(user.clone()));
        Ok(user)
    }

    /// Clear the session. Safe to call when already logged out.
    pub fn logout(&self) {
        info!("Logging out");
        self.end(LogoutReason::Explicit);
    }

    /// Tear down the session after the service rejected the credential
    pub fn invalidate(&self) {
        warn!("Credential rejected by service, clearing session");
        self.end(LogoutReason::Unauthorized);
    }

    /// Session transitions made by this manager
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Store changes made by other tabs
    pub fn subscribe_store(&self) -> StoreSubscription {
        self.store.subscribe()
    }

    fn valid_credential(&self) -> Option<Credential> {
        let credential = self.load()?;
        if credential.is_valid_at(self.clock.now()) {
            Some(credential)
        } else {
            debug!(expires_at = %credential.expires_at, "Stored credential no longer valid");
            self.end(LogoutReason::Expired);
            None
        }
    }

    fn load(&self) -> Option<Credential> {
        match self.store.get() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session, discarding it");
                if let Err(e) = self.store.clear() {
                    error!(error = %e, "Failed to discard unreadable session");
                }
                None
            }
        }
    }

    /// Clear the store. `LoggedOut` is only announced if a credential was removed.
    fn end(&self, reason: LogoutReason) {
        let had_session = matches!(self.store.get(), Ok(Some(_)));
        if let Err(e) = self.store.clear() {
            error!(error = %e, ?reason, "Failed to clear session");
        }
        if had_session {
            let _ = self.events.send(SessionEvent::LoggedOut(reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ManualClock, MemoryCredentialStore};
    use crate::testing::{sample_user, FakeAuthenticator};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn manager() -> (SessionManager, ManualClock, MemoryCredentialStore) {
        let clock = ManualClock::new(start());
        let store = MemoryCredentialStore::new();
        let session = SessionManager::new(store.clone(), Arc::new(clock.clone()));
        (session, clock, store)
    }

    #[tokio::test]
    async fn test_login_stores_credential_for_24h() {
        let (session, _clock, store) = manager();
        let api = FakeAuthenticator::accepting("tok-1");

        let user = session.login(&api, "Lin@Example.com ", "secret1").await.unwrap();
        assert_eq!(user, Some(sample_user()));
        assert_eq!(api.last_email().as_deref(), Some("lin@example.com"));

        let stored = store.get().unwrap().expect("credential stored");
        assert_eq!(stored.token, "tok-1");
        assert_eq!(stored.expires_at, start() + Duration::hours(24));
        assert_eq!(stored.user, Some(sample_user()));
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (session, clock, store) = manager();
        let api = FakeAuthenticator::accepting("tok-1");
        session.login(&api, "lin@example.com", "secret1").await.unwrap();

        clock.set(start() + Duration::hours(24) - Duration::seconds(1));
        assert!(session.is_authenticated());

        clock.set(start() + Duration::hours(24) + Duration::seconds(1));
        assert!(!session.is_authenticated());
        assert!(store.get().unwrap().is_none());

        // Repeated checks after expiry stay false and leave the store empty
        assert!(!session.is_authenticated());
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_invalid_input_before_calling_service() {
        let (session, _clock, _store) = manager();
        let api = FakeAuthenticator::accepting("tok-1");

        let err = session.login(&api, "not-an-email", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(ValidationError::InvalidEmail)));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = session.login(&api, "lin@example.com", "123").await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(ValidationError::PasswordTooShort)));

        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_login_without_token_stores_nothing() {
        let (session, _clock, store) = manager();
        let api = FakeAuthenticator::accepting("");

        let err = session.login(&api, "lin@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_api_error() {
        let (session, _clock, store) = manager();
        let api = FakeAuthenticator::rejecting(ApiError::Unauthorized("wrong password".into()));

        let err = session.login(&api, "lin@example.com", "secret1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_emits_events() {
        let (session, _clock, store) = manager();
        let mut events = session.subscribe_events();
        let api = FakeAuthenticator::accepting("tok-1");
        session.login(&api, "lin@example.com", "secret1").await.unwrap();

        session.logout();
        session.logout();
        assert!(store.get().unwrap().is_none());
        assert!(!session.is_authenticated());

        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedIn(Some(sample_user()))
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut(LogoutReason::Explicit)
        );
        // Nothing left to remove the second time
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_login_without_user_still_authenticates() {
        let (session, _clock, store) = manager();
        let mut events = session.subscribe_events();
        let api = FakeAuthenticator::token_only("tok-2");

        let user = session.login(&api, "lin@example.com", "secret1").await.unwrap();
        assert_eq!(user, None);

        let stored = store.get().unwrap().expect("credential stored");
        assert_eq!(stored.token, "tok-2");
        assert_eq!(stored.user, None);
        assert_eq!(session.state(), SessionState::Authenticated(None));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn(None));
    }

    #[test]
    fn test_teardown_without_session_is_silent() {
        let (session, _clock, store) = manager();
        let mut events = session.subscribe_events();

        session.invalidate();
        session.logout();

        assert!(store.get().unwrap().is_none());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_current_user_and_state() {
        let (session, clock, store) = manager();
        assert_eq!(session.current_user(), None);
        assert_eq!(session.state(), SessionState::Anonymous);

        store
            .set(&Credential::issue("tok".into(), Some(sample_user()), clock.now()))
            .unwrap();
        assert_eq!(session.current_user(), Some(sample_user()));
        assert_eq!(session.state(), SessionState::Authenticated(Some(sample_user())));
        assert_eq!(session.token().as_deref(), Some("tok"));
        assert_eq!(session.time_until_expiry(), Some(Duration::hours(24)));
    }

    #[test]
    fn test_empty_token_is_cleared() {
        let (session, clock, store) = manager();
        let mut events = session.subscribe_events();
        store
            .set(&Credential::issue(String::new(), None, clock.now()))
            .unwrap();

        assert!(!session.is_authenticated());
        assert!(store.get().unwrap().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut(LogoutReason::Expired)
        );
    }

    #[test]
    fn test_invalidate_tags_reason() {
        let (session, clock, store) = manager();
        let mut events = session.subscribe_events();
        store
            .set(&Credential::issue("tok".into(), None, clock.now()))
            .unwrap();

        session.invalidate();
        assert!(store.get().unwrap().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut(LogoutReason::Unauthorized)
        );
    }

    #[test]
    fn test_unreadable_file_session_counts_as_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::auth::FileCredentialStore::new(dir.path());
        std::fs::write(store.path(), "garbage").unwrap();
        let path = store.path().to_path_buf();

        let session = SessionManager::with_system_clock(store);
        assert!(!session.is_authenticated());
        assert!(!path.exists());
    }
}
