//! Pre-navigation access control.
//!
//! DESIGN
//! ======
//! `decide` is the pure decision table over (authenticated, role, route
//! meta). `RouteGuard` wraps it with the one async step the table needs:
//! when a token is held but no user is cached (typically right after a
//! restart) the profile is fetched silently first, and a failed fetch logs
//! out so the table sees an unauthenticated session. The fetch completes
//! before the decision is made.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use tracing::{debug, warn};

use crate::lifecycle::{FetchMode, LOGIN_ROUTE, SessionManager};
use crate::types::Role;

pub const HOME_ROUTE: &str = "/";
pub const PRODUCTS_ROUTE: &str = "/products";
pub const REDIRECT_QUERY_KEY: &str = "redirect";

/// Access requirements attached to a route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
    pub requires_admin: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self { requires_auth: false, requires_guest: false, requires_admin: false };
    pub const AUTH: Self = Self { requires_auth: true, requires_guest: false, requires_admin: false };
    pub const GUEST: Self = Self { requires_auth: false, requires_guest: true, requires_admin: false };
    pub const ADMIN: Self = Self { requires_auth: false, requires_guest: false, requires_admin: true };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Navigate here instead (full path, possibly with a query).
    Redirect(String),
}

/// Evaluate the access table for one navigation.
#[must_use]
pub fn decide(meta: RouteMeta, full_path: &str, is_authenticated: bool, role: Option<Role>) -> GuardDecision {
    if meta.requires_admin {
        if !is_authenticated {
            return GuardDecision::Redirect(login_redirect(full_path));
        }
        if role != Some(Role::Admin) {
            return GuardDecision::Redirect(PRODUCTS_ROUTE.to_string());
        }
        return GuardDecision::Allow;
    }
    if meta.requires_auth {
        if is_authenticated {
            return GuardDecision::Allow;
        }
        return GuardDecision::Redirect(login_redirect(full_path));
    }
    if meta.requires_guest && is_authenticated {
        return GuardDecision::Redirect(HOME_ROUTE.to_string());
    }
    GuardDecision::Allow
}

/// `/login?redirect=<full_path>`, with the target percent-encoded.
#[must_use]
pub fn login_redirect(full_path: &str) -> String {
    format!("{LOGIN_ROUTE}?{REDIRECT_QUERY_KEY}={}", urlencoding::encode(full_path))
}

/// Session-aware guard run before every navigation.
#[derive(Clone)]
pub struct RouteGuard {
    manager: SessionManager,
}

impl RouteGuard {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Decide whether `full_path` (carrying `meta`) may be entered.
    pub async fn before_each(&self, meta: RouteMeta, full_path: &str) -> GuardDecision {
        self.sync_profile().await;
        let session = self.manager.session();
        let decision = decide(meta, full_path, session.is_authenticated(), session.user.map(|u| u.role));
        debug!(path = full_path, ?decision, "route guard");
        decision
    }

    async fn sync_profile(&self) {
        if !self.manager.store().needs_profile() {
            return;
        }
        if let Err(e) = self.manager.fetch_profile(FetchMode::Silent).await {
            warn!(error = %e, "profile sync before navigation failed; logging out");
            self.manager.logout().await;
        }
    }
}
