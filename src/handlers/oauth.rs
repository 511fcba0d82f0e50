//! Google OAuth 登录处理器

use super::with_session_cookies;
use crate::{
    auth::cookies::{clear_oauth_state_cookie, oauth_state_cookie, OAUTH_STATE_COOKIE},
    error::AppError,
    middleware::AppState,
    models::auth::OAuthCallbackParams,
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// 跳转到 Google 授权页，state 写入 cookie
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (nonce, url) = state.auth_service.begin_oauth_login()?;
    let jar = jar.add(oauth_state_cookie(
        &nonce,
        state.config.oauth.state_cookie_ttl_secs as i64,
    ));

    Ok((jar, Redirect::temporary(&url)))
}

/// 授权回调，成功后写入会话 cookie 并跳回前端
///
/// state cookie 只能使用一次，失败时同样清除。
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    let stored_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(clear_oauth_state_cookie());

    let result = state
        .auth_service
        .complete_oauth_login(
            params.state.as_deref(),
            stored_state.as_deref(),
            params.code.as_deref(),
        )
        .await;

    match result {
        Ok(session) => {
            let jar = with_session_cookies(jar, &state, &session.tokens);
            (jar, Redirect::temporary(&state.config.app.frontend_url)).into_response()
        }
        Err(err) => (jar, err).into_response(),
    }
}
