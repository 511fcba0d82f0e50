//! 电影流媒体认证服务库
//! 会话令牌签发与轮换、本地与 Google 登录、密码重置

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
