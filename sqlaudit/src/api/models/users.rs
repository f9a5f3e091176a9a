//! API request/response models for users and sessions.

use super::audit::Privilege;
use crate::crypto::ProtectedSecret;
use crate::types::UserId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Role name the backend gives administrators.
pub const ADMIN_ROLE: &str = "admin";

/// Format of `expires` in login and refresh replies (`2024/05/01 10:00:00`).
const EXPIRES_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Body of `user/login`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub account: &'a str,
    pub password: &'a ProtectedSecret,
}

/// Body of `user/refresh-token`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Logged-in user as returned by `user/login`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub avatar: Option<String>,
    pub account: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Button-level permissions
    #[serde(default)]
    pub permissions: Vec<String>,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires: Option<String>,
}

impl Session {
    /// Resolve the review privilege from the session's roles.
    ///
    /// `None` when the backend sent no roles at all; such callers can only use the generic DDL
    /// review entry point.
    pub fn privilege(&self) -> Option<Privilege> {
        privilege_from_roles(self.roles.as_slice())
    }

    pub fn expires_at(&self) -> Option<NaiveDateTime> {
        parse_expires(self.expires.as_deref())
    }

    /// Replace the tokens after a successful refresh.
    pub fn apply_refresh(&mut self, tokens: TokenPair) {
        self.access_token = tokens.access_token;
        self.refresh_token = tokens.refresh_token;
        self.expires = tokens.expires;
    }
}

/// `data` of `user/refresh-token`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires: Option<String>,
}

impl TokenPair {
    pub fn expires_at(&self) -> Option<NaiveDateTime> {
        parse_expires(self.expires.as_deref())
    }
}

fn parse_expires(expires: Option<&str>) -> Option<NaiveDateTime> {
    expires.and_then(|s| NaiveDateTime::parse_from_str(s.trim(), EXPIRES_FORMAT).ok())
}

pub fn privilege_from_roles<S: AsRef<str>>(roles: &[S]) -> Option<Privilege> {
    if roles.is_empty() {
        None
    } else if roles.iter().any(|r| r.as_ref().eq_ignore_ascii_case(ADMIN_ROLE)) {
        Some(Privilege::Administrator)
    } else {
        Some(Privilege::Ordinary)
    }
}

/// A user account as listed by the user endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub account: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl User {
    pub fn privilege(&self) -> Option<Privilege> {
        privilege_from_roles(self.roles.as_slice())
    }
}

/// Body of `user/addUser` and `user/updateUserInfo/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWrite {
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Required on create; omitted on update to keep the current password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<ProtectedSecret>,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn session(roles: serde_json::Value) -> Session {
        serde_json::from_value(json!({
            "avatar": "https://example.com/a.png",
            "account": "alice",
            "nickname": "Alice",
            "roles": roles,
            "permissions": ["datasource:add"],
            "accessToken": "at",
            "refreshToken": "rt",
            "expires": "2030/01/02 03:04:05"
        }))
        .unwrap()
    }

    #[test]
    fn test_privilege_resolution() {
        assert_eq!(session(json!(["admin"])).privilege(), Some(Privilege::Administrator));
        assert_eq!(session(json!(["common", "ADMIN"])).privilege(), Some(Privilege::Administrator));
        assert_eq!(session(json!(["common"])).privilege(), Some(Privilege::Ordinary));
        assert_eq!(session(json!([])).privilege(), None);
    }

    #[test]
    fn test_expires_parsing() {
        let expires = session(json!(["common"])).expires_at().unwrap();
        assert_eq!((expires.year(), expires.month(), expires.day()), (2030, 1, 2));
        assert_eq!((expires.hour(), expires.minute(), expires.second()), (3, 4, 5));

        let tokens = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires: Some("not a date".to_string()),
        };
        assert!(tokens.expires_at().is_none());
    }

    #[test]
    fn test_apply_refresh() {
        let mut s = session(json!(["common"]));
        s.apply_refresh(TokenPair {
            access_token: "at2".to_string(),
            refresh_token: "rt2".to_string(),
            expires: None,
        });
        assert_eq!(s.access_token, "at2");
        assert_eq!(s.refresh_token, "rt2");
        assert!(s.expires_at().is_none());
    }

    #[test]
    fn test_user_write_omits_missing_password() {
        let write = UserWrite {
            account: "bob".to_string(),
            nickname: None,
            password: None,
            roles: vec!["common".to_string()],
        };
        assert_eq!(serde_json::to_value(&write).unwrap(), json!({"account": "bob", "roles": ["common"]}));
    }
}
