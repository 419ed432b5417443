//! Normalization of variant response shapes.
//!
//! The upstream API is inconsistent across versions: payloads may or may not
//! be wrapped in `{data: ...}`, the login token arrives as `token` or
//! `access_token`, the profile as `{user}`, `{data:{user}}`, or the bare
//! object, and ids as strings or numbers. Everything here is a pure function
//! from raw JSON to a canonical value, tried in a fixed precedence order
//! (wrapped before flat, `token` before `access_token`).

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::models::UserProfile;

/// Canonical fields of a login/register response.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthPayload {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

/// Unwrap a `{data: ...}` envelope, passing anything else through.
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            _ => Value::Object(map),
        },
        other => other,
    }
}

/// Extract the token and optional profile from a login/register body.
pub fn auth_payload(value: &Value) -> AuthPayload {
    let body = match value.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => value,
    };

    let token = body
        .get("token")
        .and_then(Value::as_str)
        .or_else(|| body.get("access_token").and_then(Value::as_str))
        .map(str::to_owned);

    let user = body
        .get("user")
        .and_then(|u| serde_json::from_value(u.clone()).ok());

    AuthPayload { token, user }
}

/// Extract the user profile from a `/auth/me` body.
/// Tries `{user}`, then `{data:{user}}`, then the bare object.
pub fn user_profile(value: &Value) -> Option<UserProfile> {
    let candidates = [
        value.get("user"),
        value.get("data").and_then(|d| d.get("user")),
        Some(value),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(user) = serde_json::from_value::<UserProfile>(candidate.clone()) {
            return Some(user);
        }
    }
    None
}

/// Extract a created entity's id, accepting string or numeric ids.
pub fn entity_id(value: &Value) -> Option<String> {
    let body = match value.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => value,
    };
    match body.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a list that may arrive bare or `{data: [...]}`-wrapped.
/// A non-array payload yields an empty list; malformed entries are dropped.
pub fn list_of<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match unwrap_data(value) {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed list entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}
