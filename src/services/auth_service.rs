//! Domain service for credential exchange.
//!
//! Handles login, signup, logout and token revocation. Cookie and session
//! handling stays in the HTTP layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::{AuthToken, User};

/// Errors specific to authentication and account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password.")]
    InvalidCredentials,

    /// Rendered exactly like `InvalidCredentials` to callers.
    #[error("Account is disabled")]
    InactiveAccount,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Self-service registration form.
#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
    pub device_name: String,
}

/// Everything a successful login or signup hands back.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub user: User,
    pub token: AuthToken,
    /// Static key from the legacy table, kept for older clients.
    pub backup_token: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RevokeSummary {
    pub tokens: u64,
    pub legacy_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub device_name: String,
    pub token_created: DateTime<Utc>,
    pub token_expires: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub days_until_expiry: i64,
}

impl TokenInfo {
    #[must_use]
    pub fn describe(token: &AuthToken, now: DateTime<Utc>) -> Self {
        Self {
            device_name: token.device_name.clone(),
            token_created: token.created_at,
            token_expires: token.expires_at,
            last_used: token.last_used,
            is_expired: token.is_expired(now),
            days_until_expiry: token.days_until_expiry(now),
        }
    }
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verify credentials and issue a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or a wrong
    /// password and [`AuthError::InactiveAccount`] for a disabled account.
    async fn login(
        &self,
        username: &str,
        password: &str,
        device_name: &str,
    ) -> Result<IssuedCredentials, AuthError>;

    /// Create a customer account and sign it in. Role and staff flags are
    /// never taken from the caller.
    async fn signup(&self, input: SignupInput) -> Result<IssuedCredentials, AuthError>;

    /// Drop the presented token and the user's legacy token.
    async fn logout(&self, user_id: i32, presented_key: Option<&str>) -> Result<(), AuthError>;

    /// Revoke every token of a user, custom and legacy.
    async fn revoke_all(&self, user_id: i32) -> Result<RevokeSummary, AuthError>;

    /// Details of `current` if given, else of the user's newest token.
    async fn token_info(
        &self,
        user_id: i32,
        current: Option<&AuthToken>,
    ) -> Result<Option<TokenInfo>, AuthError>;
}
