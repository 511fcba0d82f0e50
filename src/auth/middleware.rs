//! JWT 认证中间件
//! 从 access_token cookie 读取会话令牌，校验后把身份放入请求扩展

use crate::{
    auth::{cookies::ACCESS_COOKIE, jwt::TokenKind},
    error::AppError,
    middleware::AppState,
    models::user::Role,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Roles accepted by the admin-review update endpoint.
///
/// Includes USER, so in practice any authenticated caller passes.
pub(crate) const ADMIN_REVIEW_ROLES: &[Role] = &[Role::Admin, Role::User];

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    /// 角色检查，不在允许列表内返回 Forbidden
    pub fn require_any_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, role = %self.role, "Role not permitted");
            Err(AppError::Forbidden)
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }
}

/// 从 cookie 提取访问令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    CookieJar::from_headers(headers)
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthorized("authentication required"))
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers())?;

    // 只校验签名和过期时间，不与存储中的令牌比对
    let claims = state
        .jwt_service
        .verify_session(&token, TokenKind::Access, state.clock.now())?;

    let auth_context = AuthContext {
        user_id: claims.user_id,
        email: claims.email,
        role: claims.role,
    };

    tracing::debug!(user_id = %auth_context.user_id, "Request authenticated");

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
