//! Client-side session lifecycle for the storefront API.
//!
//! ARCHITECTURE
//! ============
//! Layers, bottom up:
//! - `storage`: durable key-value store for the token and cached user
//! - `store`: the mutex-guarded `Session` record, persisted on every change
//! - `http` / `api`: bearer injection, status mapping, typed endpoints
//! - `lifecycle`: `SessionManager` with login/logout/refresh orchestration
//! - `guard` / `router`: access control applied before each navigation

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod router;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use error::ApiError;
pub use guard::{GuardDecision, RouteGuard, RouteMeta};
pub use lifecycle::{FetchMode, SessionManager};
pub use router::{Navigator, RouteTable};
pub use store::{Session, SessionStore};
pub use types::{Credentials, ProfileUpdate, Registration, Role, User};
