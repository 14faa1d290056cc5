//! Typed calls for the auth and user endpoints.
//!
//! Each helper unwraps the envelope: `code != 0` becomes `ApiError::Domain`
//! with the server's message, or a per-endpoint fallback when it sent none.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{ApiClient, Method, into_data};
use crate::types::{AuthSuccess, Credentials, LoginData, PasswordChange, ProfileUpdate, Registration, User};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/users/profile";
pub const REGISTER_PATH: &str = "/users/register";
pub const CHANGE_PASSWORD_PATH: &str = "/users/change-password";

fn to_body<T: serde::Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

/// `POST /auth/login`. Succeeds only when the envelope is ok and carries a token.
///
/// # Errors
///
/// Returns the mapped HTTP/domain error, or `MissingData("token")`.
pub async fn login(client: &ApiClient, credentials: &Credentials) -> Result<AuthSuccess, ApiError> {
    let envelope = client
        .request::<LoginData>(Method::Post, LOGIN_PATH, Some(to_body(credentials)?))
        .await?;
    let data = into_data(envelope, "login failed")?.ok_or(ApiError::MissingData("token"))?;
    let token = data
        .token
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingData("token"))?;
    Ok(AuthSuccess { token, user: data.user })
}

/// `POST /auth/logout`.
///
/// # Errors
///
/// Returns the mapped HTTP/domain error.
pub async fn logout(client: &ApiClient) -> Result<(), ApiError> {
    let envelope = client.request::<Value>(Method::Post, LOGOUT_PATH, None).await?;
    into_data(envelope, "logout failed").map(|_| ())
}

/// `GET /users/profile`.
///
/// # Errors
///
/// Returns the mapped HTTP/domain error, or `MissingData("profile")`.
pub async fn get_profile(client: &ApiClient) -> Result<User, ApiError> {
    let envelope = client.request::<User>(Method::Get, PROFILE_PATH, None).await?;
    into_data(envelope, "failed to load profile")?.ok_or(ApiError::MissingData("profile"))
}

/// `POST /users/register`. Returns whatever `data` the server sent.
///
/// # Errors
///
/// Returns the mapped HTTP/domain error.
pub async fn register(client: &ApiClient, registration: &Registration) -> Result<Value, ApiError> {
    let envelope = client
        .request::<Value>(Method::Post, REGISTER_PATH, Some(to_body(registration)?))
        .await?;
    Ok(into_data(envelope, "registration failed")?.unwrap_or(Value::Null))
}

/// `PUT /users/profile`.
///
/// # Errors
///
/// Returns the mapped HTTP/domain error.
pub async fn update_profile(client: &ApiClient, update: &ProfileUpdate) -> Result<(), ApiError> {
    let envelope = client
        .request::<Value>(Method::Put, PROFILE_PATH, Some(to_body(update)?))
        .await?;
    into_data(envelope, "failed to update profile").map(|_| ())
}

/// `POST /users/change-password`.
///
/// # Errors
///
/// Returns the mapped HTTP/domain error.
pub async fn change_password(client: &ApiClient, change: &PasswordChange) -> Result<(), ApiError> {
    let envelope = client
        .request::<Value>(Method::Post, CHANGE_PASSWORD_PATH, Some(to_body(change)?))
        .await?;
    into_data(envelope, "failed to change password").map(|_| ())
}
