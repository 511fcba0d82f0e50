//! Outbound mail task

use serde::Serialize;

/// One message handed to the mail workers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MailTask {
    pub to: String,
    pub from: String,
    pub subject: String,
    /// Body, or the value substituted into `template` when one is set
    pub content: String,
    pub template: Option<String>,
}
