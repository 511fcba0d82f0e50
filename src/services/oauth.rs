//! OAuth2 身份提供方
//! 授权码换取访问令牌，再读取用户资料；state 随机数防 CSRF

use crate::{config::OAuthConfig, error::AppError, models::user::AuthProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// 第三方返回的用户资料
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderProfile {
    pub email: String,
    #[serde(rename = "given_name", default)]
    pub first_name: String,
    #[serde(rename = "family_name", default)]
    pub last_name: String,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// 身份来源，写入新建用户的 auth_provider
    fn provider(&self) -> AuthProvider;

    /// 携带 state 的授权跳转地址
    fn authorize_url(&self, state: &str) -> Result<String, AppError>;

    /// 授权码换取第三方访问令牌
    async fn exchange_code(&self, code: &str) -> Result<String, AppError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError>;
}

/// 16 字节随机数，URL-safe base64（带填充）
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    redirect_url: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    scopes: Vec<String>,
}

impl GoogleOAuthClient {
    pub fn new(config: &OAuthConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_url: config.google_redirect_url.clone(),
            auth_url: config.google_auth_url.clone(),
            token_url: config.google_token_url.clone(),
            userinfo_url: config.google_userinfo_url.clone(),
            scopes: config.google_scopes.clone(),
        })
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Google
    }

    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Config(format!("Invalid OAuth authorization URL: {}", e)))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to exchange token: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            tracing::warn!(%status, "OAuth token exchange rejected");
            return Err(AppError::Internal(format!(
                "Failed to exchange token: provider returned {}",
                status
            )));
        }

        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse token response: {}", e)))?;

        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError> {
        let resp = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get user info: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "Failed to get user info: provider returned {}",
                resp.status()
            )));
        }

        resp.json::<ProviderProfile>()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse user info: {}", e)))
    }
}
