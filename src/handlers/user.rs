//! 当前用户资料的 HTTP 处理器

use super::ValidatedJson;
use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::user::{UpdateUserRequest, UserResponse},
};
use axum::{extract::State, Json};
use std::sync::Arc;

/// 获取当前用户
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth_service.get_profile(&auth_context.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// 更新当前用户资料
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .auth_service
        .update_profile(&auth_context.user_id, req)
        .await?;
    Ok(Json(UserResponse::from(user)))
}
