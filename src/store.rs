//! Session record and its single shared store.
//!
//! DESIGN
//! ======
//! `SessionStore` is the only writer of the session. Every mutation goes
//! through a method here, takes the mutex, and mirrors the token and user
//! into durable storage. The in-memory record is updated first so a storage
//! failure never leaves the process believing in a session it just cleared.
//!
//! `is_authenticated` is derived from the token rather than stored, so it
//! cannot drift out of sync with it. The user may be transiently absent
//! while a token restored from storage waits for its profile fetch.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::storage::{ACCESS_TOKEN_KEY, CURRENT_USER_KEY, SessionStorage, StorageError, load_json, save_json};
use crate::types::{ProfileUpdate, User};

/// Authentication state of the current client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    /// An interactive request is in flight.
    pub loading: bool,
    /// Last user-facing error from an interactive operation.
    pub error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Token held but profile not yet fetched (e.g. right after a restart).
    #[must_use]
    pub fn needs_profile(&self) -> bool {
        self.token.is_some() && self.user.is_none()
    }
}

/// Shared handle to the session. Clones refer to the same record.
#[derive(Clone)]
pub struct SessionStore {
    session: Arc<Mutex<Session>>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Rebuild the session from durable storage.
    ///
    /// A persisted user without a token is discarded.
    #[must_use]
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Self {
        let token = match storage.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "failed to read persisted token; starting logged out");
                None
            }
        };
        let user = if token.is_some() { load_json::<User>(storage.as_ref(), CURRENT_USER_KEY) } else { None };
        let session = Session { token, user, loading: false, error: None };
        Self { session: Arc::new(Mutex::new(session)), storage }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    #[must_use]
    pub fn needs_profile(&self) -> bool {
        self.lock().needs_profile()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.lock().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Install a freshly issued token and its user, persisting both.
    ///
    /// # Errors
    ///
    /// Returns an error if the session could not be persisted. The in-memory
    /// session is updated regardless.
    pub fn set_auth_data(&self, token: String, user: Option<User>) -> Result<(), StorageError> {
        {
            let mut session = self.lock();
            session.token = Some(token.clone());
            session.user.clone_from(&user);
        }
        self.storage.set(ACCESS_TOKEN_KEY, &token)?;
        save_json(self.storage.as_ref(), CURRENT_USER_KEY, &user)
    }

    /// Replace the cached user after a profile fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the user could not be persisted.
    pub fn set_user(&self, user: User) -> Result<(), StorageError> {
        self.lock().user = Some(user.clone());
        save_json(self.storage.as_ref(), CURRENT_USER_KEY, &user)
    }

    /// Merge an accepted profile update into the cached user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user could not be persisted.
    pub fn apply_profile_update(&self, update: &ProfileUpdate) -> Result<(), StorageError> {
        let user = {
            let mut session = self.lock();
            let Some(user) = session.user.as_mut() else {
                return Ok(());
            };
            user.apply_update(update);
            user.clone()
        };
        save_json(self.storage.as_ref(), CURRENT_USER_KEY, &user)
    }

    /// Drop the token, user and error, and erase the persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted keys could not be removed. The
    /// in-memory session is cleared regardless.
    pub fn clear(&self) -> Result<(), StorageError> {
        {
            let mut session = self.lock();
            session.token = None;
            session.user = None;
            session.error = None;
        }
        let token_result = self.storage.remove(ACCESS_TOKEN_KEY);
        let user_result = self.storage.remove(CURRENT_USER_KEY);
        token_result.and(user_result)
    }

    pub fn set_loading(&self, loading: bool) {
        self.lock().loading = loading;
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.lock().error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }
}
