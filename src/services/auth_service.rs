//! 认证服务：注册、登录、OAuth、令牌刷新、登出、密码重置

use crate::{
    auth::{
        jwt::{JwtService, TokenError, TokenKind},
        password::PasswordHasher,
    },
    config::AppConfig,
    error::AppError,
    models::{
        auth::{LoginRequest, ResetPasswordRequest, Session},
        mail::MailTask,
        user::{AuthProvider, RegisterRequest, UpdateUserRequest, User},
    },
    repository::{UserLookup, UserStore},
    services::{
        clock::Clock,
        mail_service::MailDispatcher,
        oauth::{generate_state, OAuthProvider},
    },
};
use std::{future::Future, sync::Arc, time::Duration};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_RESET_TOKEN: &str = "Invalid or expired token";
const RESET_MAIL_SUBJECT: &str = "Password Reset";

/// 重置链接：前端地址 + /reset-password?token=
pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={}", frontend_url.trim_end_matches('/'), token)
}

pub struct AuthService {
    config: Arc<AppConfig>,
    store: Arc<dyn UserStore>,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
    oauth: Arc<dyn OAuthProvider>,
    mail: Arc<MailDispatcher>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn UserStore>,
        jwt_service: Arc<JwtService>,
        hasher: PasswordHasher,
        oauth: Arc<dyn OAuthProvider>,
        mail: Arc<MailDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            jwt_service,
            hasher,
            oauth,
            mail,
            clock,
        }
    }

    /// 存储操作统一超时，超时即放弃，不重试
    async fn with_timeout<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let secs = self.config.database.query_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| {
                tracing::error!(op, timeout_secs = secs, "Store operation timed out");
                AppError::Timeout(format!("{} timed out after {}s", op, secs))
            })?
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError> {
        self.with_timeout("find user", self.store.find_by(lookup)).await
    }

    // Argon2 是 CPU 密集操作，放到阻塞线程池
    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
    }

    /// 签发新的令牌对并覆盖存储中的旧令牌
    async fn start_session(&self, mut user: User) -> Result<Session, AppError> {
        let now = self.clock.now();
        let tokens = self.jwt_service.issue_session_pair(&user, now)?;

        let persisted = self
            .with_timeout(
                "persist tokens",
                self.store
                    .persist_tokens(&user.user_id, &tokens.access_token, &tokens.refresh_token, now),
            )
            .await?;
        if !persisted {
            return Err(AppError::not_found("User not found"));
        }

        user.token = tokens.access_token.clone();
        user.refresh_token = tokens.refresh_token.clone();
        user.updated_at = now;

        Ok(Session { user, tokens })
    }

    /// 注册本地账户，角色固定为 USER
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.config.security)?;

        if self.find_user(UserLookup::Email(&req.email)).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = self.hash_password(&req.password).await?;
        let user = User::new_local(
            req.first_name.unwrap_or_default(),
            req.last_name.unwrap_or_default(),
            req.email,
            password_hash,
            req.favourite_genres,
            self.clock.now(),
        );

        self.with_timeout("insert user", self.store.insert(&user)).await?;

        tracing::info!(user_id = %user.user_id, "User registered");
        Ok(user)
    }

    /// 本地账户登录
    pub async fn login(&self, req: LoginRequest) -> Result<Session, AppError> {
        req.validate()?;

        let Some(user) = self.find_user(UserLookup::Email(&req.email)).await? else {
            metrics::counter!("auth_login_total", "result" => "unknown_user").increment(1);
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        if user.auth_provider != AuthProvider::Local {
            metrics::counter!("auth_login_total", "result" => "wrong_provider").increment(1);
            return Err(AppError::Unauthorized(format!(
                "Please sign in with {}",
                user.auth_provider
            )));
        }

        let digest = user.password.clone().unwrap_or_default();
        if !self.verify_password(&req.password, &digest).await? {
            metrics::counter!("auth_login_total", "result" => "bad_password").increment(1);
            tracing::warn!(user_id = %user.user_id, "Login failed: password mismatch");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let session = self.start_session(user).await?;

        metrics::counter!("auth_login_total", "result" => "success").increment(1);
        tracing::info!(user_id = %session.user.user_id, "User logged in");
        Ok(session)
    }

    /// 生成 state 随机数和第三方授权地址
    pub fn begin_oauth_login(&self) -> Result<(String, String), AppError> {
        let state = generate_state();
        let url = self.oauth.authorize_url(&state)?;
        Ok((state, url))
    }

    /// OAuth 回调：校验 state，换取资料，查找或创建用户后签发令牌
    pub async fn complete_oauth_login(
        &self,
        returned_state: Option<&str>,
        stored_state: Option<&str>,
        code: Option<&str>,
    ) -> Result<Session, AppError> {
        match (returned_state, stored_state) {
            (Some(returned), Some(stored)) if !stored.is_empty() && returned == stored => {}
            _ => {
                tracing::warn!("OAuth callback state mismatch");
                return Err(AppError::BadRequest("invalid state".to_string()));
            }
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::validation("authorization code is required"))?;

        let provider_token = self.oauth.exchange_code(code).await?;
        let profile = self.oauth.fetch_profile(&provider_token).await?;

        let user = match self.find_user(UserLookup::Email(&profile.email)).await? {
            Some(user) => user,
            None => {
                let user = User::new_federated(
                    self.oauth.provider(),
                    profile.first_name,
                    profile.last_name,
                    profile.email,
                    self.clock.now(),
                );
                match self.with_timeout("insert user", self.store.insert(&user)).await {
                    Ok(()) => {
                        tracing::info!(user_id = %user.user_id, provider = %user.auth_provider, "Federated user created");
                        user
                    }
                    // 并发回调已创建同一邮箱的用户
                    Err(AppError::Conflict(_)) => self
                        .find_user(UserLookup::Email(&user.email))
                        .await?
                        .ok_or_else(|| AppError::internal_error("federated user vanished"))?,
                    Err(e) => return Err(e),
                }
            }
        };

        let session = self.start_session(user).await?;
        tracing::info!(user_id = %session.user.user_id, "User logged in via OAuth");
        Ok(session)
    }

    /// 用刷新令牌轮换出新的令牌对
    ///
    /// 旧令牌在存储中被覆盖，但签名在过期前依然有效。
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Session, AppError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Unable to retrieve refresh token from cookie"))?;

        let claims = self
            .jwt_service
            .verify_session(token, TokenKind::Refresh, self.clock.now())
            .map_err(|e| match e {
                TokenError::Signing(_) => AppError::from(e),
                _ => AppError::unauthorized("Invalid or expired refresh token"),
            })?;

        let user = self
            .find_user(UserLookup::Id(&claims.user_id))
            .await?
            .ok_or_else(|| AppError::unauthorized("User not found"))?;

        let session = self.start_session(user).await?;
        tracing::info!(user_id = %session.user.user_id, "Tokens refreshed");
        Ok(session)
    }

    /// 清空存储中的令牌对
    pub async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        let cleared = self
            .with_timeout(
                "clear tokens",
                self.store.persist_tokens(user_id, "", "", self.clock.now()),
            )
            .await?;
        if !cleared {
            return Err(AppError::not_found("User not found"));
        }

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// 生成重置令牌并投递邮件（不等待投递结果）
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .find_user(UserLookup::Email(email))
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        // 第三方账户没有本地密码
        if user.auth_provider != AuthProvider::Local {
            return Err(AppError::BadRequest(format!(
                "Please sign in with {}",
                user.auth_provider
            )));
        }

        let now = self.clock.now();
        let token = self.jwt_service.issue_reset_token(&user.user_id, now)?;
        let expires_at = now + self.jwt_service.reset_ttl();

        let stored = self
            .with_timeout(
                "store reset token",
                self.store.set_reset_token(&user.user_id, &token, expires_at, now),
            )
            .await?;
        if !stored {
            return Err(AppError::not_found("User not found"));
        }

        let task = MailTask {
            to: user.email.clone(),
            from: self.config.mail.from.clone(),
            subject: RESET_MAIL_SUBJECT.to_string(),
            content: reset_link(&self.config.app.frontend_url, &token),
            template: Some(self.config.mail.reset_template.clone()),
        };
        if !self.mail.enqueue(task) {
            tracing::warn!(user_id = %user.user_id, "Password reset mail dropped");
        }

        tracing::info!(user_id = %user.user_id, "Password reset requested");
        Ok(())
    }

    /// 使用重置令牌设置新密码，令牌只能使用一次
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.new_password, &self.config.security)?;

        let user = self
            .find_user(UserLookup::ResetToken(&req.token))
            .await?
            .ok_or_else(|| AppError::not_found(INVALID_RESET_TOKEN))?;

        let now = self.clock.now();
        match user.password_reset_expires {
            Some(expires_at) if now > expires_at => {
                return Err(AppError::BadRequest("Token has expired".to_string()));
            }
            Some(_) => {}
            None => return Err(AppError::not_found(INVALID_RESET_TOKEN)),
        }

        let password_hash = self.hash_password(&req.new_password).await?;
        let completed = self
            .with_timeout(
                "complete password reset",
                self.store
                    .complete_password_reset(&user.user_id, &req.token, &password_hash, now),
            )
            .await?;
        if !completed {
            return Err(AppError::not_found(INVALID_RESET_TOKEN));
        }

        tracing::info!(user_id = %user.user_id, "Password reset completed");
        Ok(())
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<User, AppError> {
        self.find_user(UserLookup::Id(user_id))
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        req.validate()?;

        let user = self
            .with_timeout(
                "update profile",
                self.store.update_profile(user_id, &req, self.clock.now()),
            )
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(user)
    }
}
