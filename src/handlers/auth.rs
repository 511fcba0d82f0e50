//! 认证相关的 HTTP 处理器

use super::{with_session_cookies, ValidatedJson};
use crate::{
    auth::cookies::{clear_access_cookie, clear_refresh_cookie, REFRESH_COOKIE},
    error::AppError,
    middleware::AppState,
    models::{
        auth::{
            LoginRequest, LogoutRequest, MessageResponse, PasswordResetRequest, RefreshResponse,
            ResetPasswordRequest,
        },
        user::{RegisterRequest, UserResponse},
    },
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.login(req).await?;
    let jar = with_session_cookies(jar, &state, &session.tokens);

    Ok((jar, Json(session.into_login_response())))
}

/// 登出：清空存储中的令牌并让浏览器删除 cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.logout(&req.user_id).await?;

    let jar = jar.add(clear_access_cookie()).add(clear_refresh_cookie());
    Ok((jar, Json(MessageResponse::new("Logged out successfully"))))
}

/// 刷新令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let session = state.auth_service.refresh(presented.as_deref()).await?;

    let jar = with_session_cookies(jar, &state, &session.tokens);
    Ok((
        jar,
        Json(RefreshResponse {
            message: "Tokens refreshed".to_string(),
            access_token: session.tokens.access_token,
        }),
    ))
}

/// 申请重置密码
pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.request_password_reset(&req.email).await?;
    Ok(Json(MessageResponse::new("Password reset email sent")))
}

/// 使用重置令牌设置新密码
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.reset_password(req).await?;
    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}
