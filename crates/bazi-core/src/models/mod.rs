//! Data models exchanged with the chart service.
//!
//! The core does not interpret these beyond what routing and validation need:
//! - `UserSummary`: the account payload returned by login/register
//! - `BirthData`, `Pillar`, `Pillars`: calculation inputs and outputs
//! - `SavedChart`: a persisted chart as listed by the service

pub mod chart;
pub mod user;

pub use chart::{
    BirthData, ChartList, HealthStatus, Pillar, PillarError, Pillars, SaveChartRequest,
    SaveChartResponse, SavedChart,
};
pub use user::{LoginResponse, RegisterRequest, RegisterResponse, UserSummary};
