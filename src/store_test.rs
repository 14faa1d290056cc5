use super::*;
use crate::storage::MemoryStorage;
use crate::types::Role;

fn user(role: Role) -> User {
    User {
        id: "1".into(),
        username: "alice".into(),
        email: Some("alice@example.test".into()),
        phone: None,
        role,
        extra: serde_json::Map::new(),
    }
}

fn empty_store() -> (SessionStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (SessionStore::restore(storage.clone()), storage)
}

// =============================================================================
// restore
// =============================================================================

#[test]
fn restore_empty_storage_is_logged_out() {
    let (store, _) = empty_store();
    let session = store.snapshot();
    assert!(!session.is_authenticated());
    assert_eq!(session, Session::default());
}

#[test]
fn restore_token_and_user() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "abc").unwrap();
    save_json(storage.as_ref(), CURRENT_USER_KEY, &user(Role::Admin)).unwrap();

    let store = SessionStore::restore(storage);
    assert!(store.is_authenticated());
    assert_eq!(store.token().as_deref(), Some("abc"));
    assert_eq!(store.current_user().map(|u| u.role), Some(Role::Admin));
    assert!(!store.needs_profile());
}

#[test]
fn restore_token_without_user_needs_profile() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "abc").unwrap();
    storage.set(CURRENT_USER_KEY, "null").unwrap();

    let store = SessionStore::restore(storage);
    assert!(store.is_authenticated());
    assert!(store.needs_profile());
}

#[test]
fn restore_ignores_user_without_token() {
    let storage = Arc::new(MemoryStorage::new());
    save_json(storage.as_ref(), CURRENT_USER_KEY, &user(Role::User)).unwrap();

    let store = SessionStore::restore(storage);
    assert!(!store.is_authenticated());
    assert!(store.current_user().is_none());
}

// =============================================================================
// mutations
// =============================================================================

#[test]
fn set_auth_data_persists_token_and_user() {
    let (store, storage) = empty_store();
    store.set_auth_data("abc".into(), Some(user(Role::User))).unwrap();

    assert!(store.is_authenticated());
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("abc"));
    let persisted: Option<User> = load_json(storage.as_ref(), CURRENT_USER_KEY);
    assert_eq!(persisted.map(|u| u.username), Some("alice".into()));
}

#[test]
fn set_auth_data_without_user_persists_null() {
    let (store, storage) = empty_store();
    store.set_auth_data("abc".into(), None).unwrap();
    assert_eq!(storage.get(CURRENT_USER_KEY).unwrap().as_deref(), Some("null"));
    assert!(store.needs_profile());
}

#[test]
fn clear_removes_everything() {
    let (store, storage) = empty_store();
    store.set_auth_data("abc".into(), Some(user(Role::User))).unwrap();
    store.set_error("boom");

    store.clear().unwrap();

    let session = store.snapshot();
    assert!(!session.is_authenticated());
    assert!(session.user.is_none());
    assert!(session.error.is_none());
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(CURRENT_USER_KEY).unwrap(), None);
}

#[test]
fn clones_share_one_session() {
    let (store, _) = empty_store();
    let other = store.clone();
    store.set_auth_data("abc".into(), None).unwrap();
    assert!(other.is_authenticated());
}

#[test]
fn apply_profile_update_merges_and_persists() {
    let (store, storage) = empty_store();
    store.set_auth_data("abc".into(), Some(user(Role::User))).unwrap();

    let update = ProfileUpdate { username: None, email: None, phone: Some("555".into()) };
    store.apply_profile_update(&update).unwrap();

    assert_eq!(store.current_user().and_then(|u| u.phone), Some("555".into()));
    let persisted: Option<User> = load_json(storage.as_ref(), CURRENT_USER_KEY);
    assert_eq!(persisted.and_then(|u| u.phone), Some("555".into()));
}

#[test]
fn apply_profile_update_without_user_is_noop() {
    let (store, _) = empty_store();
    let update = ProfileUpdate { username: Some("x".into()), email: None, phone: None };
    store.apply_profile_update(&update).unwrap();
    assert!(store.current_user().is_none());
}

#[test]
fn loading_and_error_flags() {
    let (store, _) = empty_store();
    store.set_loading(true);
    store.set_error("nope");
    assert!(store.loading());
    assert_eq!(store.error().as_deref(), Some("nope"));
    store.clear_error();
    assert!(store.error().is_none());
}
