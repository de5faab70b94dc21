//! Account models returned by the `/auth` endpoints.

use serde::{Deserialize, Serialize};

/// Response body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Profile of the authenticated user, as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub allow_auto_credentials: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    /// Name shown in the dashboard header: full name if set, email otherwise.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let json = r#"{"id": 7, "email": "ana@example.com", "full_name": null, "is_active": true, "is_admin": false, "allow_auto_credentials": true}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, 7);
        assert_eq!(user.email, "ana@example.com");
        assert!(user.full_name.is_none());
        assert!(user.allow_auto_credentials);
        assert!(!user.is_admin);
    }

    #[test]
    fn test_display_name() {
        let mut user = User {
            id: 1,
            email: "ana@example.com".to_string(),
            full_name: Some("Ana Souza".to_string()),
            is_active: true,
            is_admin: false,
            allow_auto_credentials: false,
        };
        assert_eq!(user.display_name(), "Ana Souza");

        user.full_name = Some("   ".to_string());
        assert_eq!(user.display_name(), "ana@example.com");

        user.full_name = None;
        assert_eq!(user.display_name(), "ana@example.com");
    }

    #[test]
    fn test_access_token_default_type() {
        let token: AccessToken =
            serde_json::from_str(r#"{"access_token": "abc"}"#).expect("Failed to parse token");
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type, "bearer");
    }
}
