//! Wire DTOs for the storefront REST API.
//!
//! DESIGN
//! ======
//! Every endpoint answers with the same envelope: `code == 0` is success and
//! any other code is a domain failure whose `message` is shown to the user.
//! The user record tolerates both the short (`id`, `role`) and the backend's
//! column-style (`user_id`, `user_role`) field names.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// USER
// =============================================================================

/// Access level of a storefront user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrator with access to admin-only routes.
    Admin,
    /// Regular shopper. Unrecognized role strings also land here.
    #[default]
    #[serde(other)]
    User,
}

/// The authenticated user as returned by login and profile endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User identifier; numeric ids are normalized to strings.
    #[serde(alias = "user_id", deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "user_role")]
    pub role: Role,
    /// Remaining profile fields (`is_verified`, `last_login`, ...) kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Overlay the fields of a successful profile update onto this record.
    pub fn apply_update(&mut self, update: &ProfileUpdate) {
        if let Some(username) = &update.username {
            self.username.clone_from(username);
        }
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

// =============================================================================
// RESPONSE ENVELOPE
// =============================================================================

/// `{code, message, data}` wrapper shared by every endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default, deserialize_with = "deserialize_message")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Server messages are usually strings, but validation failures arrive as
/// field-error objects. Those are flattened to compact JSON.
pub(crate) fn deserialize_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(message_from_value))
}

pub(crate) fn message_from_value(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Payload of a successful login.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// A login that produced a usable token.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthSuccess {
    pub token: String,
    pub user: Option<User>,
}

// =============================================================================
// REQUEST PAYLOADS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Account creation request for `POST /users/register`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub phone: String,
    /// SMS verification code.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Trim every field, dropping the ones that end up empty.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        fn clean(value: Option<&str>) -> Option<String> {
            value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        }
        Self {
            username: clean(self.username.as_deref()),
            email: clean(self.email.as_deref()),
            phone: clean(self.phone.as_deref()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}
