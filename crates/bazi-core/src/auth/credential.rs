use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserSummary;

/// Lifetime of a credential from the moment of login.
/// Fixed on the client; the service's own token lifetime is not consulted.
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Bearer token, its hard expiry, and the user it belongs to.
/// Stored as one record so the three fields can never be observed half-written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Option<UserSummary>,
}

impl Credential {
    /// Build the credential for a login that completed at `now`
    pub fn issue(token: String, user: Option<UserSummary>, now: DateTime<Utc>) -> Self {
        Self {
            token,
            expires_at: now + Duration::hours(SESSION_LIFETIME_HOURS),
            user,
        }
    }

    /// Valid iff the token is non-empty and `now` is strictly before expiry
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn login_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_issue_sets_24h_expiry() {
        let cred = Credential::issue("tok".to_string(), None, login_time());
        assert_eq!(cred.expires_at, login_time() + Duration::hours(24));
    }

    #[test]
    fn test_is_valid_at_boundaries() {
        let cred = Credential::issue("tok".to_string(), None, login_time());
        assert!(cred.is_valid_at(login_time()));
        assert!(cred.is_valid_at(cred.expires_at - Duration::seconds(1)));
        assert!(!cred.is_valid_at(cred.expires_at));
        assert!(!cred.is_valid_at(cred.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_empty_token_is_never_valid() {
        let cred = Credential::issue(String::new(), None, login_time());
        assert!(!cred.is_valid_at(login_time()));
    }

    #[test]
    fn test_minutes_until_expiry_clamps_at_zero() {
        let cred = Credential::issue("tok".to_string(), None, login_time());
        assert_eq!(cred.minutes_until_expiry(login_time()), 24 * 60);
        assert_eq!(cred.minutes_until_expiry(login_time() + Duration::hours(30)), 0);
    }
}
