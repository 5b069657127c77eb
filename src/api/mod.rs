//! Backend interface
//!
//! The HTTP client, the wire types for each endpoint, and the account
//! operations.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::{AuthClient, AuthError};
pub use client::{ApiClient, ApiError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
