//! REST API client module for the SomaSave backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! cooperative's backend: login, dashboard figures, mobile-money deposits
//! and push subscription registration.
//!
//! The API uses token authentication (`Authorization: Token <token>`)
//! obtained from the login endpoint.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
