//! 邮件派发
//! 有界队列 + 固定数量的 worker；入队从不阻塞请求，队列满时丢弃并计数

use crate::{error::AppError, models::mail::MailTask};
use async_trait::async_trait;
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};

/// 邮件投递
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, task: &MailTask) -> Result<(), AppError>;
}

/// 渲染模板并写入日志，实际投递由外部 MTA 完成
pub struct TemplateLogSender {
    template_dir: PathBuf,
}

impl TemplateLogSender {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    /// 有模板时替换 `{{reset_link}}`，否则直接使用 content
    pub async fn render(&self, task: &MailTask) -> Result<String, AppError> {
        let Some(name) = task.template.as_deref() else {
            return Ok(task.content.clone());
        };

        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(AppError::Validation(format!("Invalid mail template name: {}", name)));
        }

        let path = self.template_dir.join(name);
        let template = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::Internal(format!("Failed to read template {}: {}", path.display(), e))
        })?;

        Ok(template.replace("{{reset_link}}", &task.content))
    }
}

#[async_trait]
impl MailSender for TemplateLogSender {
    async fn send(&self, task: &MailTask) -> Result<(), AppError> {
        let body = self.render(task).await?;

        tracing::info!(
            to = %task.to,
            from = %task.from,
            subject = %task.subject,
            template = task.template.as_deref().unwrap_or("-"),
            body_len = body.len(),
            "Mail rendered"
        );
        tracing::debug!(to = %task.to, body = %body, "Mail body");

        Ok(())
    }
}

/// 队列计数快照
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MailStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub sent: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> MailStats {
        MailStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct MailDispatcher {
    tx: mpsc::Sender<MailTask>,
    counters: Arc<Counters>,
}

impl MailDispatcher {
    /// 创建队列并启动 worker（需在 tokio 运行时内调用）
    pub fn start(sender: Arc<dyn MailSender>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<MailTask>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        for worker_id in 0..workers.max(1) {
            let rx = rx.clone();
            let sender = sender.clone();
            let counters = counters.clone();

            tokio::spawn(async move {
                loop {
                    // 锁只在取任务时持有，发送期间其他 worker 可继续取
                    let task = { rx.lock().await.recv().await };
                    let Some(task) = task else {
                        break;
                    };

                    match sender.send(&task).await {
                        Ok(()) => {
                            counters.sent.fetch_add(1, Ordering::Relaxed);
                            metrics::counter!("mail_tasks_sent_total").increment(1);
                        }
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            metrics::counter!("mail_tasks_failed_total").increment(1);
                            tracing::warn!(worker_id, to = %task.to, error = %e, "Mail delivery failed");
                        }
                    }
                }

                tracing::debug!(worker_id, "Mail worker stopped");
            });
        }

        tracing::info!(capacity, workers, "Mail dispatcher started");

        Self { tx, counters }
    }

    /// 非阻塞入队；返回 false 表示任务被丢弃
    pub fn enqueue(&self, task: MailTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("mail_tasks_enqueued_total").increment(1);
                true
            }
            Err(TrySendError::Full(task)) | Err(TrySendError::Closed(task)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("mail_tasks_dropped_total").increment(1);
                tracing::warn!(to = %task.to, subject = %task.subject, "Mail queue unavailable, task dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> MailStats {
        self.counters.snapshot()
    }

    /// 等待已入队任务全部处理完；超时返回 false
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let poll = async {
            loop {
                let stats = self.stats();
                if stats.sent + stats.failed >= stats.enqueued {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Notify, Semaphore};

    fn task(to: &str) -> MailTask {
        MailTask {
            to: to.to_string(),
            from: "no-reply@movieapp.com".to_string(),
            subject: "Password Reset".to_string(),
            content: "http://localhost:5173/reset-password?token=abc".to_string(),
            template: Some("password-reset.html".to_string()),
        }
    }

    /// 第一封邮件开始后阻塞，直到放行
    struct GatedSender {
        started: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl MailSender for GatedSender {
        async fn send(&self, _task: &MailTask) -> Result<(), AppError> {
            self.started.notify_one();
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            permit.forget();
            Ok(())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl MailSender for FailingSender {
        async fn send(&self, _task: &MailTask) -> Result<(), AppError> {
            Err(AppError::internal_error("smtp down"))
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_counts() {
        let sender = Arc::new(GatedSender {
            started: Notify::new(),
            gate: Semaphore::new(0),
        });
        let dispatcher = MailDispatcher::start(sender.clone(), 1, 1);

        assert!(dispatcher.enqueue(task("a@x.com")));
        // worker 已取走第一封并阻塞
        sender.started.notified().await;

        assert!(dispatcher.enqueue(task("b@x.com")));
        assert!(!dispatcher.enqueue(task("c@x.com")));

        let stats = dispatcher.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dropped, 1);

        sender.gate.add_permits(10);
        assert!(dispatcher.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(dispatcher.stats().sent, 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_counted() {
        let dispatcher = MailDispatcher::start(Arc::new(FailingSender), 4, 2);
        assert!(dispatcher.enqueue(task("a@x.com")));
        assert!(dispatcher.wait_idle(Duration::from_secs(5)).await);

        let stats = dispatcher.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.sent, 0);
    }

    #[tokio::test]
    async fn test_render_substitutes_reset_link() {
        let sender = TemplateLogSender::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"));
        let body = sender.render(&task("a@x.com")).await.unwrap();

        assert!(body.contains("http://localhost:5173/reset-password?token=abc"));
        assert!(!body.contains("{{reset_link}}"));
    }

    #[tokio::test]
    async fn test_render_substitutes_every_placeholder() {
        let dir = std::env::temp_dir().join(format!("mail-templates-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("links.html"), "{{reset_link}} ".repeat(5))
            .await
            .unwrap();

        let sender = TemplateLogSender::new(dir.clone());
        let mut links = task("a@x.com");
        links.template = Some("links.html".to_string());
        let body = sender.render(&links).await.unwrap();

        assert_eq!(body.matches("reset-password?token=abc").count(), 5);
        assert!(!body.contains("{{reset_link}}"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_render_plain_content_and_bad_names() {
        let sender = TemplateLogSender::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"));

        let mut plain = task("a@x.com");
        plain.template = None;
        assert_eq!(sender.render(&plain).await.unwrap(), plain.content);

        let mut escape = task("a@x.com");
        escape.template = Some("../Cargo.toml".to_string());
        assert!(matches!(sender.render(&escape).await, Err(AppError::Validation(_))));

        let mut missing = task("a@x.com");
        missing.template = Some("missing.html".to_string());
        assert!(matches!(sender.render(&missing).await, Err(AppError::Internal(_))));
    }
}
