//! Core library for the bazi chart client.
//!
//! This crate holds everything a frontend needs to talk to the chart service
//! and keep its login state straight:
//! - `auth`: credential storage backends, the session manager, and the clock
//! - `sync`: cross-instance session consistency over storage notifications
//! - `api`: the single HTTP chokepoint plus the endpoint service
//! - `router`: the view state machine that gates the saved-charts view
//! - `config`, `models`, `validate`: supporting types

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod router;
pub mod sync;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, ApiGateway, BaziApi, ErrorKind, HttpTransport, RequestOptions, Transport};
pub use auth::{
    AuthError, Clock, Credential, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    LogoutReason, ManualClock, MemoryCredentialStore, Origin, SessionEvent, SessionManager,
    SessionState, StoreChange, StoreEvent, SystemClock, TabId,
};
pub use config::{Config, CredentialBackend};
pub use models::{BirthData, Pillar, Pillars, SavedChart, UserSummary};
pub use router::{transition, Effect, Screen, Transition, UnknownView, View, ViewRouter};
pub use sync::CrossTabSync;
pub use validate::ValidationError;
