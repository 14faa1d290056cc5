//! Session lifecycle: login, logout, registration, silent re-validation.
//!
//! ARCHITECTURE
//! ============
//! `SessionManager` is the single entry point for anything that changes the
//! session. It owns the `SessionStore` (through its `ApiClient`), the
//! periodic refresh task, and the redirect channel the navigator listens on.
//! Clones share one manager.
//!
//! The refresh task is a `JoinHandle` kept in a slot on the manager. At most
//! one is alive: scheduling aborts the previous handle before installing a
//! new one, logout always aborts it, and dropping the last manager clone
//! aborts it. The task only holds a weak reference between ticks so it never
//! keeps a discarded manager alive.
//!
//! ERROR HANDLING
//! ==============
//! Interactive operations record the user-facing message on the session and
//! return the error. Silent operations leave the session error alone and
//! let the caller decide; initialize and the refresh tick both treat any
//! failure as a dead session and log out. Nothing is retried.
//!
//! A 401 from any call has already cleared the session inside `ApiClient`;
//! here it additionally cancels the refresh task and publishes a redirect to
//! the login page.

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod lifecycle_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{ApiClient, ReqwestTransport, Transport};
use crate::storage::{FileStorage, SessionStorage};
use crate::store::{Session, SessionStore};
use crate::types::{AuthSuccess, Credentials, PasswordChange, ProfileUpdate, Registration, User};

pub const LOGIN_ROUTE: &str = "/login";

/// Whether a profile fetch reports failures on the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// Background fetch: errors go to the caller only.
    Silent,
    /// User-triggered fetch: drives `loading` and records `error`.
    Interactive,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    api: ApiClient,
    refresh_period: Duration,
    refresh: Mutex<Option<JoinHandle<()>>>,
    redirects: watch::Sender<Option<String>>,
    location: Mutex<String>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let slot = self.refresh.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(api: ApiClient, refresh_period: Duration) -> Self {
        let (redirects, _) = watch::channel(None);
        Self {
            inner: Arc::new(ManagerInner {
                api,
                refresh_period,
                refresh: Mutex::new(None),
                redirects,
                location: Mutex::new("/".to_string()),
            }),
        }
    }

    /// Wire a manager over an explicit transport and storage backend.
    #[must_use]
    pub fn with_parts(transport: Arc<dyn Transport>, storage: Arc<dyn SessionStorage>, refresh_period: Duration) -> Self {
        let store = SessionStore::restore(storage);
        Self::new(ApiClient::new(transport, store), refresh_period)
    }

    /// Build the production stack: reqwest transport plus file-backed storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.api_base_url.clone(), config.timeouts)?;
        let storage = FileStorage::new(config.session_file.clone());
        Ok(Self::with_parts(Arc::new(transport), Arc::new(storage), config.refresh_period))
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        self.inner.api.store()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.store().snapshot()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store().is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.store().current_user()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Re-validate a session restored from storage.
    ///
    /// Without a persisted token this does nothing. Otherwise the profile is
    /// fetched silently; success schedules the periodic refresh, failure logs
    /// out without surfacing an error. Returns whether a session survived.
    pub async fn initialize(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        match self.fetch_profile(FetchMode::Silent).await {
            Ok(user) => {
                info!(username = %user.username, "restored session");
                self.schedule_session_refresh();
                true
            }
            Err(e) => {
                warn!(error = %e, "session restore failed; continuing logged out");
                self.logout().await;
                false
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns the login failure; its user message is also recorded on the
    /// session. The session stays unauthenticated.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSuccess, ApiError> {
        let store = self.store();
        store.set_loading(true);
        store.clear_error();

        let result = api::login(&self.inner.api, credentials).await;
        let result = match result {
            Ok(auth) => {
                if let Err(e) = store.set_auth_data(auth.token.clone(), auth.user.clone()) {
                    warn!(error = %e, "failed to persist session");
                }
                info!(username = %credentials.username, "login succeeded");
                self.schedule_session_refresh();
                Ok(auth)
            }
            Err(e) => {
                info!(username = %credentials.username, error = %e, "login failed");
                store.set_error(e.user_message());
                Err(e)
            }
        };
        store.set_loading(false);
        self.observe(result)
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns the registration failure; its user message is also recorded
    /// on the session.
    pub async fn register(&self, registration: &Registration) -> Result<Value, ApiError> {
        let store = self.store();
        store.set_loading(true);
        store.clear_error();

        let result = api::register(&self.inner.api, registration).await;
        if let Err(e) = &result {
            store.set_error(e.user_message());
        } else {
            info!(username = %registration.username, "registration succeeded");
        }
        store.set_loading(false);
        self.observe(result)
    }

    /// End the session.
    ///
    /// The server call is best-effort and skipped when no token is held.
    /// Local teardown always happens: the refresh task is cancelled and the
    /// session plus its persisted copy are erased.
    pub async fn logout(&self) {
        if self.is_authenticated() {
            if let Err(e) = api::logout(&self.inner.api).await {
                warn!(error = %e, "server logout failed");
                if e.clears_session() {
                    self.handle_unauthorized();
                }
            }
        }
        self.cancel_session_refresh();
        if let Err(e) = self.store().clear() {
            warn!(error = %e, "failed to erase persisted session");
        }
        info!("logged out");
    }

    /// Fetch the current user's profile and cache it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` when no token is held, otherwise
    /// the fetch failure. Only `FetchMode::Interactive` records the failure
    /// on the session.
    pub async fn fetch_profile(&self, mode: FetchMode) -> Result<User, ApiError> {
        let store = self.store();
        if !store.is_authenticated() {
            return Err(ApiError::Unauthenticated);
        }
        let interactive = mode == FetchMode::Interactive;
        if interactive {
            store.set_loading(true);
            store.clear_error();
        }

        let result = api::get_profile(&self.inner.api).await;
        match &result {
            Ok(user) => {
                if let Err(e) = store.set_user(user.clone()) {
                    warn!(error = %e, "failed to persist profile");
                }
            }
            Err(e) if interactive => store.set_error(e.user_message()),
            Err(e) => debug!(error = %e, "silent profile fetch failed"),
        }
        if interactive {
            store.set_loading(false);
        }
        self.observe(result)
    }

    /// Submit profile edits. Fields are trimmed and blanks dropped first;
    /// on success the cached user is updated to match.
    ///
    /// # Errors
    ///
    /// Returns the update failure; its user message is also recorded on the
    /// session.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        let update = update.sanitized();
        self.interactive(async {
            api::update_profile(&self.inner.api, &update).await?;
            if let Err(e) = self.store().apply_profile_update(&update) {
                warn!(error = %e, "failed to persist profile");
            }
            info!("profile updated");
            Ok(())
        })
        .await
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// Returns the failure; its user message is also recorded on the session.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ApiError> {
        let change = PasswordChange { old_password: old_password.to_string(), new_password: new_password.to_string() };
        self.interactive(async {
            api::change_password(&self.inner.api, &change).await?;
            info!("password changed");
            Ok(())
        })
        .await
    }

    pub fn clear_error(&self) {
        self.store().clear_error();
    }

    async fn interactive<T>(&self, op: impl Future<Output = Result<T, ApiError>>) -> Result<T, ApiError> {
        let store = self.store();
        store.set_loading(true);
        store.clear_error();
        let result = op.await;
        if let Err(e) = &result {
            store.set_error(e.user_message());
        }
        store.set_loading(false);
        self.observe(result)
    }

    // =========================================================================
    // PERIODIC REFRESH
    // =========================================================================

    /// Start the periodic silent re-validation, replacing any running one.
    ///
    /// Does nothing without a token. Must be called from within a tokio
    /// runtime.
    pub fn schedule_session_refresh(&self) {
        if !self.is_authenticated() {
            return;
        }
        let period = self.inner.refresh_period;
        let weak = Arc::downgrade(&self.inner);

        let mut slot = self.refresh_slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(refresh_loop(weak, period)));
        info!(period_secs = period.as_secs(), "session refresh scheduled");
    }

    /// Stop the periodic refresh. Safe to call when none is running.
    pub fn cancel_session_refresh(&self) {
        if let Some(handle) = self.refresh_slot().take() {
            handle.abort();
            info!("session refresh cancelled");
        }
    }

    /// Whether a refresh task is installed and still running.
    #[must_use]
    pub fn has_scheduled_refresh(&self) -> bool {
        self.refresh_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// One refresh tick: silent profile fetch, logout on any failure.
    /// Returns whether the session is still alive.
    pub async fn refresh_session(&self) -> bool {
        match self.fetch_profile(FetchMode::Silent).await {
            Ok(_) => {
                debug!("session refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed; logging out");
                self.logout().await;
                false
            }
        }
    }

    fn refresh_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // NAVIGATION HOOKS
    // =========================================================================

    /// Subscribe to redirects the session forces (e.g. to `/login` after a 401).
    #[must_use]
    pub fn redirects(&self) -> watch::Receiver<Option<String>> {
        self.inner.redirects.subscribe()
    }

    /// Record where the client currently is.
    pub fn set_location(&self, full_path: &str) {
        *self.location_slot() = full_path.to_string();
    }

    #[must_use]
    pub fn location(&self) -> String {
        self.location_slot().clone()
    }

    fn location_slot(&self) -> MutexGuard<'_, String> {
        self.inner
            .location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn observe<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if e.clears_session() {
                self.handle_unauthorized();
            }
        }
        result
    }

    fn handle_unauthorized(&self) {
        self.cancel_session_refresh();
        let location = self.location();
        let path = location.split(['?', '#']).next().unwrap_or_default();
        if path != LOGIN_ROUTE {
            info!(from = %location, "session expired; redirecting to login");
            self.inner.redirects.send_replace(Some(LOGIN_ROUTE.to_string()));
        }
    }
}

async fn refresh_loop(weak: Weak<ManagerInner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let manager = SessionManager { inner };
        if !manager.refresh_session().await {
            break;
        }
    }
}
