//! User repository (数据库访问层)

use crate::{
    error::AppError,
    models::user::{UpdateUserRequest, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

/// 身份记录的查找字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup<'a> {
    Id(&'a str),
    Email(&'a str),
    ResetToken(&'a str),
}

/// 身份记录存储
///
/// 写操作返回 `false` / `None` 表示没有匹配的记录。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 插入新身份，邮箱重复时返回 Conflict
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    async fn find_by(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError>;

    /// 覆盖当前会话令牌对；传入空字符串即撤销
    async fn persist_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// 写入新密码并清除重置令牌；仅当令牌仍是 `token` 时生效
    async fn complete_password_reset(
        &self,
        user_id: &str,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: &UpdateUserRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;

    /// 存储可用性检查
    async fn ping(&self) -> Result<(), AppError>;
}

/// 唯一约束冲突只可能来自邮箱
fn map_unique_violation(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("User already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id, first_name, last_name, email, password, role, auth_provider,
                token, refresh_token, favourite_genres, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(user.auth_provider.as_str())
        .bind(&user.token)
        .bind(&user.refresh_token)
        .bind(Json(&user.favourite_genres))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }

    async fn find_by(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError> {
        let (sql, value) = match lookup {
            UserLookup::Id(id) => ("SELECT * FROM users WHERE user_id = $1", id),
            UserLookup::Email(email) => ("SELECT * FROM users WHERE email = $1", email),
            UserLookup::ResetToken(token) => {
                ("SELECT * FROM users WHERE password_reset_token = $1", token)
            }
        };

        let user = sqlx::query_as::<_, User>(sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn persist_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET token = $2, refresh_token = $3, updated_at = $4
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_expires = $3, updated_at = $4
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete_password_reset(
        &self,
        user_id: &str,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        // 条件更新保证同一个令牌只能使用一次
        let result = sqlx::query(
            r#"
            UPDATE users
            SET
                password = $3,
                password_reset_token = NULL,
                password_reset_expires = NULL,
                updated_at = $4
            WHERE user_id = $1 AND password_reset_token = $2
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &UpdateUserRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                first_name = $2,
                last_name = $3,
                email = $4,
                favourite_genres = $5,
                updated_at = $6
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(Json(&update.favourite_genres))
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
