//! 电影流媒体认证服务主入口

use movie_stream::{
    auth::password::PasswordHasher,
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    routes,
    services::{GoogleOAuthClient, MailDispatcher, SystemClock, TemplateLogSender},
    telemetry,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("movie-stream {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(name) = std::env::var("STREAM_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Movie stream auth service starting...");

    // 3. 身份存储（PostgreSQL 会执行迁移）
    let store = db::init_store(&config.database).await?;
    tracing::info!(backend = %config.database.backend, "User store initialized");

    // 4. 邮件 worker
    let mail_sender = Arc::new(TemplateLogSender::new(config.mail.template_dir.clone()));
    let mail_dispatcher = Arc::new(MailDispatcher::start(
        mail_sender,
        config.mail.queue_capacity,
        config.mail.workers,
    ));

    // 5. 构建应用状态
    let oauth = Arc::new(GoogleOAuthClient::new(&config.oauth)?);
    let app_state = Arc::new(AppState::new(
        config.clone(),
        store,
        PasswordHasher::new(),
        oauth,
        mail_dispatcher.clone(),
        Arc::new(SystemClock),
    ));

    // 6. 构建路由
    let app = routes::create_router(app_state);

    // 7. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 8. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    // 尽量把已入队的邮件处理完
    if !mail_dispatcher.wait_idle(Duration::from_secs(5)).await {
        tracing::warn!(stats = ?mail_dispatcher.stats(), "Mail queue not drained before exit");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制退出
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("movie-stream {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: movie-stream [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 STREAM_ 前缀的环境变量完成");
    println!("  可用选项请参考 .env.example");
}
