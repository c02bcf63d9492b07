use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, Unchanged,
};
use serde::Serialize;
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users::{self, Role};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            role: model.role,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            is_active: model.is_active,
            date_joined: model.date_joined,
            last_login: model.last_login,
        }
    }
}

impl User {
    #[must_use]
    pub fn full_name_or_username(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Input for account creation. The password is hashed by the repository.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    /// Self-service registration shape: always a plain customer.
    #[must_use]
    pub fn customer(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Customer,
            is_staff: false,
            is_superuser: false,
        }
    }
}

/// Role and flag changes made from admin screens.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessUpdate {
    pub role: Option<Role>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Create a user, hashing the password off the async runtime.
    pub async fn create(&self, new_user: NewUser, config: Option<&SecurityConfig>) -> Result<User> {
        let password = new_user.password.clone();
        let config = config.cloned();
        let password_hash = task::spawn_blocking(move || hash_password(&password, config.as_ref()))
            .await
            .context("Password hashing task panicked")??;

        let active = users::ActiveModel {
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            role: Set(new_user.role),
            is_staff: Set(new_user.is_staff),
            is_superuser: Set(new_user.is_superuser),
            is_active: Set(true),
            date_joined: Set(Utc::now()),
            last_login: Set(None),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.conn)
            .await
            .context("Failed to check username")?;

        Ok(count > 0)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .count(&self.conn)
            .await
            .context("Failed to check email")?;

        Ok(count > 0)
    }

    /// Verify password for a user and return the account on a match.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    ///
    /// An unknown username still pays for one Argon2 hash under `config`, so
    /// misses take as long as a wrong password.
    pub async fn verify_password(
        &self,
        username: &str,
        password: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            let password = password.to_string();
            let config = config.cloned();
            task::spawn_blocking(move || hash_password(&password, config.as_ref()))
                .await
                .context("Password hashing task panicked")??;
            return Ok(None);
        };

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || verify_hash(&password, &password_hash))
            .await
            .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }

    /// Stored Argon2 hash, copied onto token rows at issue time.
    pub async fn password_hash(&self, user_id: i32) -> Result<Option<String>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query password hash")?;

        Ok(user.map(|u| u.password_hash))
    }

    /// Update password for a user (hashes the new password)
    pub async fn update_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<()> {
        let password = new_password.to_string();
        let config = config.cloned();
        let new_hash = task::spawn_blocking(move || hash_password(&password, config.as_ref()))
            .await
            .context("Password hashing task panicked")??;

        let active = users::ActiveModel {
            id: Unchanged(user_id),
            password_hash: Set(new_hash),
            ..Default::default()
        };
        active
            .update(&self.conn)
            .await
            .with_context(|| format!("Failed to update password for user {user_id}"))?;

        Ok(())
    }

    /// Apply role/flag changes. The superuser rule in the entity's save hook
    /// still applies, so a superuser cannot be moved off the admin role.
    pub async fn update_access(&self, user_id: i32, update: AccessUpdate) -> Result<User> {
        let mut active = users::ActiveModel {
            id: Unchanged(user_id),
            ..Default::default()
        };
        if let Some(role) = update.role {
            active.role = Set(role);
        }
        if let Some(is_staff) = update.is_staff {
            active.is_staff = Set(is_staff);
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_superuser) = update.is_superuser {
            active.is_superuser = Set(is_superuser);
        }

        let model = active
            .update(&self.conn)
            .await
            .with_context(|| format!("Failed to update access for user {user_id}"))?;

        Ok(User::from(model))
    }

    pub async fn touch_last_login(&self, user_id: i32) -> Result<()> {
        let active = users::ActiveModel {
            id: Unchanged(user_id),
            last_login: Set(Some(Utc::now())),
            ..Default::default()
        };
        active.update(&self.conn).await?;
        Ok(())
    }

    /// All users, newest first.
    pub async fn list(&self) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .order_by_desc(users::Column::DateJoined)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    pub async fn count_by_role(&self, role: Role) -> Result<u64> {
        users::Entity::find()
            .filter(users::Column::Role.eq(role))
            .count(&self.conn)
            .await
            .context("Failed to count users by role")
    }

    pub async fn delete(&self, user_id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(user_id)
            .exec(&self.conn)
            .await
            .with_context(|| format!("Failed to delete user {user_id}"))?;

        Ok(result.rows_affected > 0)
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the library default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

fn verify_hash(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
