//! HTTP 处理器模块

pub mod auth;
pub mod health;
pub mod oauth;
pub mod user;

use crate::{
    auth::{
        cookies::{access_cookie, refresh_cookie},
        jwt::TokenPair,
    },
    error::AppError,
    middleware::AppState,
};
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON 请求体提取器：反序列化失败和字段校验失败都返回 400
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(format!("Invalid input data: {}", e.body_text())))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// 写入会话 cookie，max-age 与令牌有效期一致
pub(crate) fn with_session_cookies(jar: CookieJar, state: &AppState, tokens: &TokenPair) -> CookieJar {
    jar.add(access_cookie(
        &tokens.access_token,
        state.jwt_service.access_ttl().num_seconds(),
    ))
    .add(refresh_cookie(
        &tokens.refresh_token,
        state.jwt_service.refresh_ttl().num_seconds(),
    ))
}
