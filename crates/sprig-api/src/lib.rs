//! HTTP client for the entry API.
//!
//! Every request resolves a bearer token through the session context and
//! attaches it when present. A 401 response triggers at most one forced
//! token refresh and resend; if authorization still fails, the persisted
//! session is cleared and the failure surfaces to the caller.

pub mod client;
pub mod error;

pub use client::{CreateEntryResponse, EntryClient};
pub use error::{ApiError, ApiResult};
