//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Raised when a stored enum column holds an unknown value
#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// User role carried in session claims
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(UnknownVariant {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Where the identity authenticates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Google => "google",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(AuthProvider::Local),
            "google" => Ok(AuthProvider::Google),
            _ => Err(UnknownVariant {
                kind: "auth provider",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for AuthProvider {
    type Error = UnknownVariant;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Favourite genre reference kept on the profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub genre_id: i32,
    pub genre_name: String,
}

/// User identity record
///
/// `password` is `Some` exactly when `auth_provider` is [`AuthProvider::Local`].
/// `token` / `refresh_token` hold the one live session pair; empty strings mean
/// the session was revoked.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[sqlx(try_from = "String")]
    pub auth_provider: AuthProvider,
    pub token: String,
    pub refresh_token: String,
    #[sqlx(json)]
    pub favourite_genres: Vec<Genre>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New locally registered identity
    pub fn new_local(
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
        favourite_genres: Vec<Genre>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            first_name,
            last_name,
            email,
            password: Some(password_hash),
            role: Role::User,
            auth_provider: AuthProvider::Local,
            token: String::new(),
            refresh_token: String::new(),
            favourite_genres,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// New identity created on first federated login
    pub fn new_federated(
        provider: AuthProvider,
        first_name: String,
        last_name: String,
        email: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            first_name,
            last_name,
            email,
            password: None,
            role: Role::User,
            auth_provider: provider,
            token: String::new(),
            refresh_token: String::new(),
            favourite_genres: Vec::new(),
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub last_name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
    #[serde(default)]
    pub favourite_genres: Vec<Genre>,
}

/// Profile update request (`PUT /me`)
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100))]
    pub last_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub favourite_genres: Vec<Genre>,
}

/// User response (without sensitive data)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub auth_provider: AuthProvider,
    pub favourite_genres: Vec<Genre>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            auth_provider: user.auth_provider,
            favourite_genres: user.favourite_genres,
            token: None,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_provider_round_trip_from_column() {
        assert_eq!(AuthProvider::try_from("google".to_string()).unwrap(), AuthProvider::Google);
        assert!(AuthProvider::try_from("github".to_string()).is_err());
    }

    #[test]
    fn test_password_presence_follows_provider() {
        let now = Utc::now();
        let local = User::new_local(
            "Ada".into(),
            "Lovelace".into(),
            "ada@example.com".into(),
            "hash".into(),
            vec![],
            now,
        );
        assert!(local.password.is_some());
        assert_eq!(local.role, Role::User);

        let federated = User::new_federated(
            AuthProvider::Google,
            "Ada".into(),
            "Lovelace".into(),
            "ada@example.com".into(),
            now,
        );
        assert!(federated.password.is_none());
        assert_ne!(local.user_id, federated.user_id);
    }

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"secret1"}"#).unwrap();
        assert!(req.validate().is_ok());

        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"not-an-email","password":"secret1"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@x.com","password":"secret1","first_name":"A"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_user_response_hides_password() {
        let user = User::new_local(
            "Ada".into(),
            "Lovelace".into(),
            "ada@example.com".into(),
            "$argon2id$secret".into(),
            vec![],
            Utc::now(),
        );
        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("\"token\""));
    }
}
