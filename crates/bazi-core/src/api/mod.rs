//! REST API layer for the chart service.
//!
//! This module provides the `ApiGateway`, the single path every request
//! takes, and `BaziApi`, the typed endpoint calls built on it.
//!
//! The service uses JWT bearer authentication obtained from `/login`.
//! A 401 from any endpoint ends the local session.

pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod transport;

pub use endpoints::BaziApi;
pub use error::{classify, ApiError, ErrorKind};
pub use gateway::{ApiGateway, RequestOptions, DEFAULT_BASE_URL};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};
