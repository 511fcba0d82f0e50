//! 认证 cookie 构造
//! access_token / refresh_token 承载会话令牌，oauthstate 承载 OAuth 防 CSRF 随机数

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the access token
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie name for the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";
/// Cookie name for the OAuth state nonce
pub const OAUTH_STATE_COOKIE: &str = "oauthstate";

// 前端与 API 跨站部署，会话 cookie 需 SameSite=None + Secure
fn session_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(max_age)
        .build()
}

pub fn access_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, token.to_string(), Duration::seconds(max_age_secs))
}

pub fn refresh_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    session_cookie(REFRESH_COOKIE, token.to_string(), Duration::seconds(max_age_secs))
}

/// Expired access cookie, instructs the client to drop it
pub fn clear_access_cookie() -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, String::new(), Duration::ZERO)
}

pub fn clear_refresh_cookie() -> Cookie<'static> {
    session_cookie(REFRESH_COOKIE, String::new(), Duration::ZERO)
}

/// Short-lived cookie carrying the state nonce across the provider redirect
pub fn oauth_state_cookie(state: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state.to_string()))
        .http_only(true)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

pub fn clear_oauth_state_cookie() -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, String::new()))
        .http_only(true)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = access_cookie("abc", 86400);
        assert_eq!(cookie.name(), "access_token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86400)));

        let header = refresh_cookie("def", 604800).to_string();
        assert!(header.contains("refresh_token=def"));
        assert!(header.contains("Max-Age=604800"));
    }

    #[test]
    fn test_clear_cookies_expire_immediately() {
        for cookie in [clear_access_cookie(), clear_refresh_cookie()] {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn test_state_cookie() {
        let cookie = oauth_state_cookie("nonce", 1200);
        assert_eq!(cookie.name(), "oauthstate");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(20)));
    }
}
