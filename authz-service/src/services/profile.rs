//! Maps a provider profile payload onto the normalized [`User`].

use chrono::DateTime;
use serde_json::Value;

use crate::models::User;
use crate::services::error::AuthzError;

/// Identity fields extracted from a GitHub `/user` payload.
///
/// `login` is required. Everything else is optional and falls back to the
/// zero value when absent or of the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitHubProfile {
    pub login: String,
    pub email: String,
    pub name: String,
    pub id: i64,
    pub created_on: i64,
    pub last_update: i64,
}

impl GitHubProfile {
    pub fn from_json(payload: &Value) -> Result<Self, AuthzError> {
        let object = payload
            .as_object()
            .ok_or_else(|| AuthzError::Mapping("profile payload is not a JSON object".to_string()))?;

        let login = match object.get("login") {
            Some(Value::String(login)) if !login.trim().is_empty() => login.trim().to_string(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(AuthzError::Mapping("profile has no login".to_string()));
            }
            Some(other) => {
                return Err(AuthzError::Mapping(format!(
                    "profile login is not a string: {}",
                    other
                )));
            }
        };

        Ok(Self {
            login,
            email: string_field(payload, "email"),
            name: string_field(payload, "name"),
            id: payload.get("id").and_then(Value::as_i64).unwrap_or_default(),
            created_on: timestamp_field(payload, &["created_at", "createdon"]),
            last_update: timestamp_field(payload, &["updated_at", "lastupdate"]),
        })
    }

    /// Parse a raw response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, AuthzError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| AuthzError::Mapping(format!("profile is not valid JSON: {}", e)))?;
        Self::from_json(&payload)
    }

    /// Populate the identity fields of `user`. Team memberships are left
    /// untouched.
    pub fn apply_to(self, user: &mut User) {
        user.username = self.login;
        user.email = self.email;
        user.name = self.name;
        user.id = self.id;
        user.created_on = self.created_on;
        user.last_update = self.last_update;
    }
}

fn string_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// First present key wins; accepts unix seconds or RFC 3339.
fn timestamp_field(payload: &Value, keys: &[&str]) -> i64 {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp()),
            _ => None,
        })
        .unwrap_or_default()
}
