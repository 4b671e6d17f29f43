//! Core library for the SomaSave member client.
//!
//! Provides:
//! - `api`: REST client for the SomaSave backend (auth, dashboard, payments, push)
//! - `cache`: versioned offline cache and the request strategy router
//! - `worker`: install/activate lifecycle, push and notification-click handling
//! - `deposit`: mobile-money deposit confirmation state machine
//! - `push`: push subscription manager and key encoding
//! - `auth`, `config`, `models`: session persistence, settings, backend data types

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod deposit;
pub mod models;
pub mod push;
pub mod worker;

pub use api::{ApiClient, ApiError};
pub use config::Config;
