//! 测试公共模块
//! 基于进程内存储、假 OAuth 提供方、记录型邮件发送器和手动时钟构建应用

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use axum_extra::extract::cookie::Cookie;
use http_body_util::BodyExt;
use movie_stream::{
    auth::password::PasswordHasher,
    config::{
        AppConfig, CorsConfig, DatabaseConfig, FrontendConfig, LoggingConfig, MailConfig,
        OAuthConfig, SecurityConfig, ServerConfig,
    },
    error::AppError,
    middleware::AppState,
    models::{mail::MailTask, user::AuthProvider},
    repository::{MemoryUserStore, UserStore},
    routes,
    services::{Clock, MailDispatcher, MailSender, ManualClock, OAuthProvider, ProviderProfile},
};
use secrecy::Secret;
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Mutex;

pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const GOOGLE_CODE: &str = "valid-code";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            backend: "memory".to_string(),
            url: Secret::new(String::new()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
            query_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            access_token_secret: Secret::new(
                "test-access-secret-for-testing-only-min-32-chars".to_string(),
            ),
            refresh_token_secret: Secret::new(
                "test-refresh-secret-for-testing-only-min-32-chars".to_string(),
            ),
            access_token_issuer: "MovieStreamApp".to_string(),
            refresh_token_issuer: "MagicStream".to_string(),
            access_token_exp_secs: 86400,
            refresh_token_exp_secs: 604800,
            reset_token_exp_secs: 900,
            password_min_length: 6,
        },
        oauth: OAuthConfig {
            google_client_id: "test-client".to_string(),
            google_client_secret: Secret::new("test-client-secret".to_string()),
            google_redirect_url: "http://localhost:8080/api/v1/auth/google/callback".to_string(),
            google_auth_url: "https://accounts.example.com/o/oauth2/auth".to_string(),
            google_token_url: "https://accounts.example.com/token".to_string(),
            google_userinfo_url: "https://accounts.example.com/userinfo".to_string(),
            google_scopes: vec!["email".to_string(), "profile".to_string()],
            state_cookie_ttl_secs: 1200,
        },
        mail: MailConfig {
            from: "no-reply@movieapp.com".to_string(),
            reset_template: "password-reset.html".to_string(),
            template_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string(),
            queue_capacity: 16,
            workers: 1,
        },
        app: FrontendConfig {
            frontend_url: FRONTEND_URL.to_string(),
        },
        cors: CorsConfig {
            allowed_origins: vec![FRONTEND_URL.to_string()],
        },
    }
}

/// 低成本参数，测试中哈希足够快
pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_params(1024, 1, 1).expect("valid argon2 params")
}

/// 假 OAuth 提供方：只接受 GOOGLE_CODE
pub struct FakeOAuthProvider {
    pub profile: ProviderProfile,
    pub exchanges: AtomicUsize,
}

impl FakeOAuthProvider {
    pub fn new(email: &str) -> Self {
        Self {
            profile: ProviderProfile {
                email: email.to_string(),
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
            },
            exchanges: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuthProvider {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Google
    }

    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let url = url::Url::parse_with_params(
            "https://accounts.example.com/o/oauth2/auth",
            &[("client_id", "test-client"), ("state", state)],
        )
        .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == GOOGLE_CODE {
            Ok("provider-access-token".to_string())
        } else {
            Err(AppError::internal_error("Failed to exchange token"))
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError> {
        assert_eq!(access_token, "provider-access-token");
        Ok(self.profile.clone())
    }
}

/// 记录所有投递的邮件
#[derive(Default)]
pub struct RecordingMailSender {
    pub sent: Mutex<Vec<MailTask>>,
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, task: &MailTask) -> Result<(), AppError> {
        self.sent.lock().await.push(task.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryUserStore>,
    pub clock: Arc<ManualClock>,
    pub mail: Arc<RecordingMailSender>,
    pub oauth: Arc<FakeOAuthProvider>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// 等待邮件 worker 处理完并返回已发送邮件
    pub async fn sent_mail(&self) -> Vec<MailTask> {
        assert!(self.state.mail_dispatcher.wait_idle(Duration::from_secs(5)).await);
        self.mail.sent.lock().await.clone()
    }
}

/// 创建测试应用（需在 tokio 运行时内调用）
pub fn spawn_app() -> TestApp {
    spawn_app_with(create_test_config(), Arc::new(MemoryUserStore::new()))
}

pub fn spawn_app_with(config: AppConfig, store: Arc<MemoryUserStore>) -> TestApp {
    spawn_app_with_store(config, store.clone(), store)
}

/// 使用自定义存储（例如慢存储）创建应用
pub fn spawn_app_with_store(
    config: AppConfig,
    store: Arc<dyn UserStore>,
    memory: Arc<MemoryUserStore>,
) -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let mail = Arc::new(RecordingMailSender::default());
    let oauth = Arc::new(FakeOAuthProvider::new("grace@example.com"));
    let dispatcher = Arc::new(MailDispatcher::start(
        mail.clone(),
        config.mail.queue_capacity,
        config.mail.workers,
    ));

    let state = Arc::new(AppState::new(
        config,
        store,
        fast_hasher(),
        oauth.clone(),
        dispatcher,
        clock.clone() as Arc<dyn Clock>,
    ));

    TestApp {
        state,
        store: memory,
        clock,
        mail,
        oauth,
    }
}

/// 构造 JSON 请求
pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// 构造无请求体的请求
pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// 所有 Set-Cookie 头
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// 指定名称的 Set-Cookie 头
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find(|c| c.starts_with(&prefix))
}

/// Set-Cookie 中的值（已做百分号解码）
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookie(response, name)
        .and_then(|c| Cookie::parse_encoded(c).ok())
        .map(|c| c.value().to_string())
}

pub async fn register(app: &TestApp, email: &str, password: &str) -> Response<Body> {
    use tower::ServiceExt;

    app.router()
        .oneshot(json_request(
            "POST",
            "/api/v1/register",
            serde_json::json!({ "email": email, "password": password }),
            None,
        ))
        .await
        .unwrap()
}

pub async fn login(app: &TestApp, email: &str, password: &str) -> Response<Body> {
    use tower::ServiceExt;

    app.router()
        .oneshot(json_request(
            "POST",
            "/api/v1/login",
            serde_json::json!({ "email": email, "password": password }),
            None,
        ))
        .await
        .unwrap()
}
