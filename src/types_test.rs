use super::*;
use serde_json::json;

// =============================================================================
// User
// =============================================================================

#[test]
fn user_accepts_short_field_names() {
    let user: User = serde_json::from_value(json!({
        "id": "u1", "username": "alice", "email": "a@example.test", "role": "admin"
    }))
    .unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.role, Role::Admin);
    assert!(user.is_admin());
    assert!(user.extra.is_empty());
}

#[test]
fn user_accepts_backend_column_names() {
    let user: User = serde_json::from_value(json!({
        "user_id": 42, "username": "bob", "phone": "13800000000",
        "user_role": "user", "is_verified": true
    }))
    .unwrap();
    assert_eq!(user.id, "42");
    assert_eq!(user.role, Role::User);
    assert_eq!(user.phone.as_deref(), Some("13800000000"));
    assert_eq!(user.extra.get("is_verified"), Some(&json!(true)));
}

#[test]
fn user_unknown_role_falls_back_to_user() {
    let user: User = serde_json::from_value(json!({ "id": 1, "username": "c", "role": "auditor" })).unwrap();
    assert_eq!(user.role, Role::User);
}

#[test]
fn role_serializes_lowercase_and_reads_back() {
    assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("admin"));
    assert_eq!(serde_json::to_value(Role::User).unwrap(), json!("user"));
    assert_eq!(serde_json::from_value::<Role>(json!("admin")).unwrap(), Role::Admin);
    assert_eq!(serde_json::from_value::<Role>(json!("superuser")).unwrap(), Role::User);
}

#[test]
fn user_missing_role_defaults_to_user() {
    let user: User = serde_json::from_value(json!({ "id": 1, "username": "c" })).unwrap();
    assert_eq!(user.role, Role::User);
}

#[test]
fn user_rejects_object_id() {
    let err = serde_json::from_value::<User>(json!({ "id": {}, "username": "c" })).unwrap_err();
    assert!(err.to_string().contains("expected string or number id"));
}

#[test]
fn apply_update_overwrites_only_present_fields() {
    let mut user: User =
        serde_json::from_value(json!({ "id": 1, "username": "old", "email": "old@example.test" })).unwrap();
    user.apply_update(&ProfileUpdate { username: None, email: Some("new@example.test".into()), phone: None });
    assert_eq!(user.username, "old");
    assert_eq!(user.email.as_deref(), Some("new@example.test"));
    assert_eq!(user.phone, None);
}

// =============================================================================
// Envelope
// =============================================================================

#[test]
fn envelope_success_with_login_data() {
    let env: Envelope<LoginData> = serde_json::from_value(json!({
        "code": 0, "message": "ok",
        "data": { "token": "abc", "user": { "id": 1, "username": "a", "role": "user" } }
    }))
    .unwrap();
    assert!(env.is_success());
    let data = env.data.unwrap();
    assert_eq!(data.token.as_deref(), Some("abc"));
    assert_eq!(data.user.unwrap().role, Role::User);
}

#[test]
fn envelope_null_data_is_none() {
    let env: Envelope<LoginData> = serde_json::from_value(json!({ "code": 401, "message": "bad", "data": null })).unwrap();
    assert!(!env.is_success());
    assert!(env.data.is_none());
    assert_eq!(env.message.as_deref(), Some("bad"));
}

#[test]
fn envelope_structured_message_flattened() {
    let env: Envelope<serde_json::Value> =
        serde_json::from_value(json!({ "code": 400, "message": { "username": ["required"] } })).unwrap();
    assert_eq!(env.message.as_deref(), Some(r#"{"username":["required"]}"#));
}

#[test]
fn envelope_empty_message_is_none() {
    let env: Envelope<serde_json::Value> = serde_json::from_value(json!({ "code": 1, "message": "" })).unwrap();
    assert_eq!(env.message, None);
}

// =============================================================================
// Request payloads
// =============================================================================

#[test]
fn profile_update_sanitized_trims_and_drops_blank() {
    let update = ProfileUpdate {
        username: Some("  alice ".into()),
        email: Some("   ".into()),
        phone: None,
    };
    let clean = update.sanitized();
    assert_eq!(clean.username.as_deref(), Some("alice"));
    assert_eq!(clean.email, None);
    assert!(!clean.is_empty());
    assert_eq!(serde_json::to_value(&clean).unwrap(), json!({ "username": "alice" }));
}

#[test]
fn registration_omits_missing_email() {
    let reg = Registration {
        username: "a".into(),
        password: "p".into(),
        phone: "1".into(),
        code: "123456".into(),
        email: None,
    };
    let value = serde_json::to_value(&reg).unwrap();
    assert!(value.get("email").is_none());
    assert_eq!(value["code"], json!("123456"));
}
