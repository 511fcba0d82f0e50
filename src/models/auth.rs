//! Authentication-related models

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::TokenPair;

use super::user::{User, UserResponse};

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Logout request
#[derive(Debug, Deserialize, Validate)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub user_id: String,
}

/// Password reset request (`POST /request-reset`)
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// Password reset completion (`POST /reset-password`)
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub token: String,
    #[validate(length(min = 1, message = "is required"))]
    pub new_password: String,
}

/// Query string of the OAuth provider callback
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Result of a flow that minted a fresh session pair
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

impl Session {
    /// Profile plus access token, as returned to the client on login
    pub fn into_login_response(self) -> UserResponse {
        UserResponse::from(self.user).with_token(self.tokens.access_token)
    }
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub access_token: String,
}

/// Plain message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
