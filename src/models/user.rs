use serde::{Deserialize, Serialize};

use crate::models::deserialize_opt_id;

/// The authenticated user's profile.
///
/// Only `email` is guaranteed by every backend variant; `id` may arrive as a
/// string or a number and is normalized to a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    /// Minimal profile for login responses that carry only a token.
    pub fn from_email(email: &str) -> Self {
        Self {
            id: None,
            email: email.to_string(),
            name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_string_and_number() {
        let from_string: UserProfile =
            serde_json::from_str(r#"{"id":"u1","email":"a@b.com"}"#).expect("string id");
        let from_number: UserProfile =
            serde_json::from_str(r#"{"id":42,"email":"a@b.com"}"#).expect("numeric id");
        assert_eq!(from_string.id.as_deref(), Some("u1"));
        assert_eq!(from_number.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = UserProfile::from_email("a@b.com");
        assert_eq!(user.display_name(), "a@b.com");

        let named = UserProfile {
            id: None,
            email: "a@b.com".to_string(),
            name: Some("Ada".to_string()),
        };
        assert_eq!(named.display_name(), "Ada");
    }
}
