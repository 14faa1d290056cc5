//! Storefront route table and the navigator that enforces it.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every navigation runs through `Navigator::navigate`: resolve the path
//! against the table, run the guard, then follow whatever redirect comes
//! back until a route is allowed. Redirects forced by the session (a 401
//! anywhere) are applied at the same point.

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

use std::collections::BTreeMap;

use tokio::sync::watch;
use tracing::info;

use crate::guard::{GuardDecision, HOME_ROUTE, REDIRECT_QUERY_KEY, RouteGuard, RouteMeta};
use crate::lifecycle::{LOGIN_ROUTE, SessionManager};

/// Upper bound on redirects followed for one navigation.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    /// Path pattern; `:name` segments match any single segment.
    pub pattern: &'static str,
    pub name: &'static str,
    pub meta: RouteMeta,
}

/// The storefront's routes.
#[must_use]
pub fn storefront_routes() -> Vec<Route> {
    vec![
        Route { pattern: "/", name: "Dashboard", meta: RouteMeta::AUTH },
        Route { pattern: "/login", name: "Login", meta: RouteMeta::GUEST },
        Route { pattern: "/register", name: "Register", meta: RouteMeta::GUEST },
        Route { pattern: "/forgot-password", name: "ForgotPassword", meta: RouteMeta::GUEST },
        Route { pattern: "/profile", name: "Profile", meta: RouteMeta::AUTH },
        Route { pattern: "/products", name: "ProductList", meta: RouteMeta::PUBLIC },
        Route { pattern: "/products/:id", name: "ProductDetail", meta: RouteMeta::PUBLIC },
        Route { pattern: "/navigation", name: "SystemNavigation", meta: RouteMeta::AUTH },
        Route { pattern: "/admin", name: "Admin", meta: RouteMeta::ADMIN },
    ]
}

/// A route matched against a concrete path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: Route,
    pub params: BTreeMap<String, String>,
    pub full_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Matched(RouteMatch),
    /// No route matched; the catch-all sends the client here.
    Fallback(String),
}

/// Split a full path into its path part and query string.
#[must_use]
pub fn split_path(full_path: &str) -> (&str, Option<&str>) {
    let without_fragment = full_path.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    }
}

/// Look up one query parameter, decoded.
#[must_use]
pub fn query_param(full_path: &str, key: &str) -> Option<String> {
    let (_, query) = split_path(full_path);
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| {
            urlencoding::decode(v).map_or_else(|_| v.to_string(), std::borrow::Cow::into_owned)
        })
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub struct RouteTable {
    routes: Vec<Route>,
    fallback: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(storefront_routes(), HOME_ROUTE)
    }
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<Route>, fallback: impl Into<String>) -> Self {
        Self { routes, fallback: fallback.into() }
    }

    #[must_use]
    pub fn resolve(&self, full_path: &str) -> Resolution {
        let (path, _) = split_path(full_path);
        let wanted = segments(path);
        for route in &self.routes {
            let pattern = segments(route.pattern);
            if pattern.len() != wanted.len() {
                continue;
            }
            let mut params = BTreeMap::new();
            let matched = pattern.iter().zip(&wanted).all(|(p, w)| {
                if let Some(name) = p.strip_prefix(':') {
                    params.insert(name.to_string(), (*w).to_string());
                    true
                } else {
                    p == w
                }
            });
            if matched {
                return Resolution::Matched(RouteMatch { route: *route, params, full_path: full_path.to_string() });
            }
        }
        Resolution::Fallback(self.fallback.clone())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("navigation to {path} exceeded the redirect limit")]
    TooManyRedirects { path: String },
}

/// Applies the route table and guard to navigation requests and tracks the
/// current location on the session manager.
pub struct Navigator {
    table: RouteTable,
    guard: RouteGuard,
    manager: SessionManager,
    forced: watch::Receiver<Option<String>>,
}

impl Navigator {
    #[must_use]
    pub fn new(manager: SessionManager, table: RouteTable) -> Self {
        let forced = manager.redirects();
        Self { table, guard: RouteGuard::new(manager.clone()), manager, forced }
    }

    #[must_use]
    pub fn location(&self) -> String {
        self.manager.location()
    }

    /// Navigate to `full_path`, returning the path finally entered.
    ///
    /// # Errors
    ///
    /// Returns an error if redirects loop past [`MAX_REDIRECTS`].
    pub async fn navigate(&mut self, full_path: &str) -> Result<String, NavigationError> {
        let mut target = full_path.to_string();
        for _ in 0..=MAX_REDIRECTS {
            let route = match self.table.resolve(&target) {
                Resolution::Matched(m) => m.route,
                Resolution::Fallback(to) => {
                    target = to;
                    continue;
                }
            };

            let decision = self.guard.before_each(route.meta, &target).await;
            if let Some(forced) = self.take_forced_redirect(&target) {
                target = forced;
                continue;
            }
            match decision {
                GuardDecision::Allow => {
                    info!(path = %target, route = route.name, "navigated");
                    self.manager.set_location(&target);
                    return Ok(target);
                }
                GuardDecision::Redirect(to) => target = to,
            }
        }
        Err(NavigationError::TooManyRedirects { path: full_path.to_string() })
    }

    /// Follow a redirect the session forced outside of navigation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting navigation loops.
    pub async fn apply_pending_redirect(&mut self) -> Result<Option<String>, NavigationError> {
        let location = self.location();
        match self.take_forced_redirect(&location) {
            Some(target) => self.navigate(&target).await.map(Some),
            None => Ok(None),
        }
    }

    /// After a successful login, continue to the page the login redirect
    /// preserved, or home.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting navigation loops.
    pub async fn after_login(&mut self) -> Result<String, NavigationError> {
        let location = self.location();
        let (path, _) = split_path(&location);
        let target = if path == LOGIN_ROUTE { query_param(&location, REDIRECT_QUERY_KEY) } else { None };
        let target = target
            .filter(|t| t.starts_with('/'))
            .unwrap_or_else(|| HOME_ROUTE.to_string());
        self.navigate(&target).await
    }

    fn take_forced_redirect(&mut self, current: &str) -> Option<String> {
        if !self.forced.has_changed().unwrap_or(false) {
            return None;
        }
        let forced = self.forced.borrow_and_update().clone()?;
        (split_path(current).0 != split_path(&forced).0).then_some(forced)
    }
}
