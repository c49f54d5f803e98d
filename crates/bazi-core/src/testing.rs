//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{ApiError, HttpRequest, HttpResponse, Transport, TransportError};
use crate::auth::{Authenticate, Credential, CredentialStore, MemoryCredentialStore, SessionManager};
use crate::models::{LoginResponse, Pillars, UserSummary};

pub(crate) fn sample_user() -> UserSummary {
    UserSummary {
        id: 7,
        nickname: "lin".to_string(),
        email: "lin@example.com".to_string(),
    }
}

pub(crate) fn sample_pillars() -> Pillars {
    Pillars {
        year: "庚 午".parse().unwrap(),
        month: "辛 巳".parse().unwrap(),
        day: "甲 子".parse().unwrap(),
        hour: "庚 午".parse().unwrap(),
    }
}

/// A session on the system clock holding a fresh credential for `token`
pub(crate) fn logged_in_session(token: &str) -> (Arc<SessionManager>, MemoryCredentialStore) {
    let store = MemoryCredentialStore::new();
    store
        .set(&Credential::issue(
            token.to_string(),
            Some(sample_user()),
            chrono::Utc::now(),
        ))
        .unwrap();
    let session = Arc::new(SessionManager::with_system_clock(store.clone()));
    (session, store)
}

/// Transport that replays queued responses and records what was sent
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub(crate) fn fail(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted response".to_string())))
    }
}

/// Login backend that answers without any HTTP
pub(crate) struct FakeAuthenticator {
    outcome: Result<LoginResponse, ApiError>,
    calls: Mutex<Vec<String>>,
}

impl FakeAuthenticator {
    pub(crate) fn accepting(token: &str) -> Self {
        Self {
            outcome: Ok(LoginResponse {
                access_token: Some(token.to_string()),
                user: Some(sample_user()),
                message: None,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers with a token but no account
    pub(crate) fn token_only(token: &str) -> Self {
        Self {
            outcome: Ok(LoginResponse {
                access_token: Some(token.to_string()),
                user: None,
                message: None,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rejecting(error: ApiError) -> Self {
        Self {
            outcome: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn last_email(&self) -> Option<String> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Authenticate for FakeAuthenticator {
    async fn authenticate(&self, email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.calls.lock().unwrap().push(email.to_string());
        self.outcome.clone()
    }
}
