//! 进程内身份存储
//! 用于测试以及 `database.backend = "memory"` 的本地运行，重启即丢失

use crate::{
    error::AppError,
    models::user::{UpdateUserRequest, User},
    repository::user_repo::{UserLookup, UserStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn email_taken(users: &HashMap<String, User>, email: &str, except: Option<&str>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.user_id.as_str()) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_id) || email_taken(&users, &user.email, None) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn find_by(&self, lookup: UserLookup<'_>) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        let found = match lookup {
            UserLookup::Id(id) => users.get(id),
            UserLookup::Email(email) => users.values().find(|u| u.email == email),
            UserLookup::ResetToken(token) => users
                .values()
                .find(|u| u.password_reset_token.as_deref() == Some(token)),
        };
        Ok(found.cloned())
    }

    async fn persist_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };
        user.token = access_token.to_string();
        user.refresh_token = refresh_token.to_string();
        user.updated_at = now;
        Ok(true)
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };
        user.password_reset_token = Some(token.to_string());
        user.password_reset_expires = Some(expires_at);
        user.updated_at = now;
        Ok(true)
    }

    async fn complete_password_reset(
        &self,
        user_id: &str,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };
        if user.password_reset_token.as_deref() != Some(token) {
            return Ok(false);
        }
        user.password = Some(password_hash.to_string());
        user.password_reset_token = None;
        user.password_reset_expires = None;
        user.updated_at = now;
        Ok(true)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &UpdateUserRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        if !users.contains_key(user_id) {
            return Ok(None);
        }
        if email_taken(&users, &update.email, Some(user_id)) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        let Some(user) = users.get_mut(user_id) else {
            return Ok(None);
        };
        user.first_name = update.first_name.clone();
        user.last_name = update.last_name.clone();
        user.email = update.email.clone();
        user.favourite_genres = update.favourite_genres.clone();
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
