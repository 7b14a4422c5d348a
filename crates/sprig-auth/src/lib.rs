//! Session handling for the sprig client.
//!
//! Three pieces cooperate here:
//!
//! - [`identity::IdentityClient`] talks to the identity provider: device-code
//!   sign-in, token refresh, revoke.
//! - [`store::SessionStore`] persists the profile and bearer token to disk so
//!   a restart can restore the session without signing in again.
//! - [`session::SessionContext`] ties the two together and implements the
//!   token-provider contract used by the API client: prefer a live token,
//!   refresh when forced or stale, fall back to the last persisted token,
//!   and never error — callers treat `None` as "send unauthenticated".

pub mod error;
pub mod identity;
pub mod session;
pub mod store;

pub use error::{AuthError, AuthResult};
pub use identity::{DeviceAuthorization, IdentityClient, IdentityEndpoints, SignIn, TokenGrant};
pub use session::{Profile, SessionContext};
pub use store::{SessionStore, StoredToken};
