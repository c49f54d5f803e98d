use serde::{Deserialize, Serialize};

/// Account summary as returned by the service. Forwarded to the UI untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserSummary {
    pub id: i64,
    pub nickname: String,
    pub email: String,
}

impl UserSummary {
    /// Name to greet the user with
    pub fn display_name(&self) -> &str {
        if self.nickname.is_empty() {
            &self.email
        } else {
            &self.nickname
        }
    }
}

/// Body of `POST /register`
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct RegisterRequest {
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: UserSummary,
}

/// Success payload of `POST /login`.
/// `access_token` is optional on the wire so a malformed success can be
/// reported as a missing token rather than a decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub message: Option<String>,
}
