//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// 令牌有效期上限（10 年）
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:8080"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 存储后端: postgres, memory
    pub backend: String,
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
    /// 单次存储操作超时（秒），超时后放弃，不重试
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 访问令牌签名密钥
    pub access_token_secret: Secret<String>,
    /// 刷新令牌签名密钥（与访问令牌密钥分离）
    pub refresh_token_secret: Secret<String>,
    /// 访问令牌 issuer
    pub access_token_issuer: String,
    /// 刷新令牌 issuer
    pub refresh_token_issuer: String,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 密码重置令牌过期时间（秒）
    pub reset_token_exp_secs: u64,
    /// 密码最小长度
    pub password_min_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub google_client_id: String,
    pub google_client_secret: Secret<String>,
    /// 回调地址，需与 Google 控制台登记的一致
    pub google_redirect_url: String,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_userinfo_url: String,
    pub google_scopes: Vec<String>,
    /// oauthstate cookie 有效期（秒）
    pub state_cookie_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// 发件人地址
    pub from: String,
    /// 重置密码邮件模板文件名
    pub reset_template: String,
    /// 模板目录
    pub template_dir: String,
    /// 邮件队列容量，满时丢弃并计数
    pub queue_capacity: usize,
    /// 邮件 worker 数量
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// 前端地址，OAuth 登录完成后跳转，也是重置链接的前缀
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub oauth: OAuthConfig,
    pub mail: MailConfig,
    pub app: FrontendConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.backend", "postgres")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("database.query_timeout_secs", 100)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.access_token_issuer", "MovieStreamApp")?
            .set_default("security.refresh_token_issuer", "MagicStream")?
            .set_default("security.access_token_exp_secs", 86400)?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("security.reset_token_exp_secs", 900)?
            .set_default("security.password_min_length", 6)?
            .set_default("oauth.google_client_id", "")?
            .set_default("oauth.google_client_secret", "")?
            .set_default(
                "oauth.google_redirect_url",
                "http://localhost:8080/api/v1/auth/google/callback",
            )?
            .set_default("oauth.google_auth_url", "https://accounts.google.com/o/oauth2/auth")?
            .set_default("oauth.google_token_url", "https://oauth2.googleapis.com/token")?
            .set_default(
                "oauth.google_userinfo_url",
                "https://www.googleapis.com/oauth2/v2/userinfo",
            )?
            .set_default(
                "oauth.google_scopes",
                vec![
                    "https://www.googleapis.com/auth/userinfo.email",
                    "https://www.googleapis.com/auth/userinfo.profile",
                ],
            )?
            .set_default("oauth.state_cookie_ttl_secs", 1200)?
            .set_default("mail.from", "no-reply@movieapp.com")?
            .set_default("mail.reset_template", "password-reset.html")?
            .set_default("mail.template_dir", "./templates")?
            .set_default("mail.queue_capacity", 256)?
            .set_default("mail.workers", 2)?
            .set_default("app.frontend_url", "http://localhost:5173")?
            .set_default("cors.allowed_origins", vec!["http://localhost:5173"])?;

        // 从环境变量加载配置（前缀为 STREAM_）
        settings = settings.add_source(
            Environment::with_prefix("STREAM")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .with_list_parse_key("oauth.google_scopes")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        match self.database.backend.to_lowercase().as_str() {
            "postgres" => {
                if self.database.url.expose_secret().is_empty() {
                    return Err(ConfigError::Message(
                        "database.url is required for the postgres backend".to_string(),
                    ));
                }
            }
            "memory" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid database backend: {}. Must be one of: postgres, memory",
                    other
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        if self.database.query_timeout_secs == 0 {
            return Err(ConfigError::Message("query_timeout_secs must be > 0".to_string()));
        }

        // 两把签名密钥都至少 32 字符，且不能相同
        let access = self.security.access_token_secret.expose_secret();
        let refresh = self.security.refresh_token_secret.expose_secret();
        if access.len() < 32 || refresh.len() < 32 {
            return Err(ConfigError::Message(
                "Token signing secrets must be at least 32 characters long".to_string(),
            ));
        }
        if access == refresh {
            return Err(ConfigError::Message(
                "Access and refresh signing secrets must differ".to_string(),
            ));
        }

        if self.security.access_token_exp_secs < 60
            || self.security.refresh_token_exp_secs <= self.security.access_token_exp_secs
        {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be >= 60 and shorter than refresh_token_exp_secs"
                    .to_string(),
            ));
        }

        if self.security.reset_token_exp_secs < 60 {
            return Err(ConfigError::Message("reset_token_exp_secs must be >= 60".to_string()));
        }

        for (name, secs) in [
            ("access_token_exp_secs", self.security.access_token_exp_secs),
            ("refresh_token_exp_secs", self.security.refresh_token_exp_secs),
            ("reset_token_exp_secs", self.security.reset_token_exp_secs),
        ] {
            if secs > MAX_TOKEN_TTL_SECS {
                return Err(ConfigError::Message(format!(
                    "{} must be <= {}",
                    name, MAX_TOKEN_TTL_SECS
                )));
            }
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        if self.mail.queue_capacity == 0 || self.mail.workers == 0 {
            return Err(ConfigError::Message(
                "mail.queue_capacity and mail.workers must be > 0".to_string(),
            ));
        }

        if url::Url::parse(&self.app.frontend_url).is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid app.frontend_url: {}",
                self.app.frontend_url
            )));
        }

        Ok(())
    }
}
