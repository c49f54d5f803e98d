//! Authentication module for tracking the user's login state.
//!
//! This module provides:
//! - `Credential`: bearer token with its hard expiry and cached user
//! - `CredentialStore`: durable, origin-shared persistence with change notifications
//! - `SessionManager`: the sole writer of the store; login, logout, lazy expiry
//! - `Clock`: injectable time source
//!
//! Credentials expire 24 hours after login and are never renewed.

pub mod clock;
pub mod credential;
pub mod keyring_store;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::Credential;
pub use keyring_store::KeyringCredentialStore;
pub use session::{AuthError, Authenticate, LogoutReason, SessionEvent, SessionManager, SessionState};
pub use store::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, Origin, StoreChange, StoreEvent,
    StoreSubscription, TabId,
};
