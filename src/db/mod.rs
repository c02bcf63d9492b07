use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::users::Role;

pub mod migrator;
pub mod repositories;

pub use repositories::token::{AuthToken, mask_key};
pub use repositories::user::{AccessUpdate, NewUser, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(std::time::Duration::from_secs(10))
            .acquire_timeout(std::time::Duration::from_secs(10))
            .idle_timeout(std::time::Duration::from_secs(300))
            .max_lifetime(std::time::Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn legacy_token_repo(&self) -> repositories::legacy_token::LegacyTokenRepository {
        repositories::legacy_token::LegacyTokenRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(
        &self,
        new_user: NewUser,
        config: Option<&SecurityConfig>,
    ) -> Result<User> {
        self.user_repo().create(new_user, config).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.user_repo().username_exists(username).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        self.user_repo().email_exists(email).await
    }

    pub async fn verify_user_password(
        &self,
        username: &str,
        password: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<Option<User>> {
        self.user_repo()
            .verify_password(username, password, config)
            .await
    }

    pub async fn user_password_hash(&self, user_id: i32) -> Result<Option<String>> {
        self.user_repo().password_hash(user_id).await
    }

    pub async fn update_user_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<()> {
        self.user_repo()
            .update_password(user_id, new_password, config)
            .await
    }

    pub async fn update_user_access(&self, user_id: i32, update: AccessUpdate) -> Result<User> {
        self.user_repo().update_access(user_id, update).await
    }

    pub async fn touch_last_login(&self, user_id: i32) -> Result<()> {
        self.user_repo().touch_last_login(user_id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn count_users_by_role(&self, role: Role) -> Result<u64> {
        self.user_repo().count_by_role(role).await
    }

    pub async fn delete_user(&self, user_id: i32) -> Result<bool> {
        self.user_repo().delete(user_id).await
    }

    // Tokens

    pub async fn create_token(
        &self,
        user_id: i32,
        device_name: &str,
        lifetime: Duration,
        password_hash: Option<String>,
    ) -> Result<AuthToken> {
        self.token_repo()
            .create(user_id, device_name, lifetime, password_hash)
            .await
    }

    pub async fn find_token(&self, key: &str) -> Result<Option<AuthToken>> {
        self.token_repo().find_by_key(key).await
    }

    pub async fn refresh_token(&self, token: &AuthToken, lifetime: Duration) -> Result<AuthToken> {
        self.token_repo().refresh(token, lifetime).await
    }

    pub async fn mark_token_used(&self, token_id: i32) -> Result<()> {
        self.token_repo().mark_used(token_id).await
    }

    pub async fn delete_token_by_key(&self, key: &str) -> Result<u64> {
        self.token_repo().delete_by_key(key).await
    }

    pub async fn delete_tokens_for_user(&self, user_id: i32) -> Result<u64> {
        self.token_repo().delete_for_user(user_id).await
    }

    pub async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        self.token_repo().delete_expired(now).await
    }

    pub async fn delete_idle_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.token_repo().delete_idle(cutoff).await
    }

    pub async fn list_tokens(&self, user_id: Option<i32>) -> Result<Vec<AuthToken>> {
        self.token_repo().list(user_id).await
    }

    pub async fn latest_token_for_user(&self, user_id: i32) -> Result<Option<AuthToken>> {
        self.token_repo().latest_for_user(user_id).await
    }

    // Legacy tokens

    pub async fn legacy_token_for_user(&self, user_id: i32) -> Result<String> {
        self.legacy_token_repo().get_or_create(user_id).await
    }

    pub async fn user_id_for_legacy_token(&self, key: &str) -> Result<Option<i32>> {
        self.legacy_token_repo().find_user_id(key).await
    }

    pub async fn has_legacy_token(&self, user_id: i32) -> Result<bool> {
        self.legacy_token_repo().has_token(user_id).await
    }

    pub async fn delete_legacy_token(&self, user_id: i32) -> Result<u64> {
        self.legacy_token_repo().delete_for_user(user_id).await
    }
}
