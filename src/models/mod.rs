//! 数据模型模块
//! 用户身份、认证流程的请求/响应以及邮件任务

pub mod auth;
pub mod mail;
pub mod user;
