//! REST API client module for the KSEI AKSes portal.
//!
//! This module provides the `KseiClient` for fetching portfolio and identity
//! data, the `Transport` seam it sends requests through, and the single-flight
//! group that coalesces concurrent identical reads.
//!
//! The API uses JWT bearer token authentication obtained through the
//! `/login` endpoint; see the `auth` module.

pub mod client;
pub mod error;
pub mod flight;
pub mod transport;

pub use client::{ClientOptions, Fetched, KseiClient};
pub use error::{ApiError, Error, ErrorKind, Result};
pub use flight::{FlightGroup, Landed};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
