//! Operator-side account and token management.
//!
//! Shared by the admin API and the CLI.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{AccessUpdate, AuthToken, User};
use crate::entities::users::Role;
use crate::services::auth_service::{AuthError, RevokeSummary};

/// A token row as operators see it: owner resolved, key masked.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSummary {
    pub id: i32,
    pub username: String,
    pub masked_key: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub is_expired: bool,
}

impl TokenSummary {
    #[must_use]
    pub fn new(token: &AuthToken, username: String, now: DateTime<Utc>) -> Self {
        Self {
            id: token.id,
            username,
            masked_key: token.masked_key(),
            device_name: token.device_name.clone(),
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used: token.last_used,
            is_expired: token.is_expired(now),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepRequest {
    pub expired: bool,
    pub idle_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    pub expired_removed: u64,
    pub idle_removed: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RoleCounts {
    pub admin: u64,
    pub support: u64,
    pub customer: u64,
}

#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, AuthError>;

    async fn role_counts(&self) -> Result<RoleCounts, AuthError>;

    /// Change role and flags. A superuser always ends up with the admin role.
    async fn update_access(
        &self,
        actor: &User,
        user_id: i32,
        update: AccessUpdate,
    ) -> Result<User, AuthError>;

    /// Hard-delete an account.
    ///
    /// # Errors
    ///
    /// [`AuthError::Forbidden`] when `actor` targets themselves or a superuser.
    async fn delete_user(&self, actor: &User, user_id: i32) -> Result<(), AuthError>;

    async fn list_tokens(&self, username: Option<&str>) -> Result<Vec<TokenSummary>, AuthError>;

    async fn revoke_user_tokens(&self, user_id: i32) -> Result<RevokeSummary, AuthError>;

    async fn revoke_tokens_by_username(&self, username: &str) -> Result<RevokeSummary, AuthError>;

    async fn sweep_tokens(&self, request: SweepRequest) -> Result<SweepReport, AuthError>;

    /// Give every user without a legacy key one. Returns how many were created.
    async fn issue_missing_legacy_tokens(&self) -> Result<usize, AuthError>;

    async fn create_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError>;

    /// Admin role plus staff and superuser flags.
    async fn fix_admin_role(&self, username: &str) -> Result<User, AuthError>;

    async fn set_role(&self, username: &str, role: Role) -> Result<User, AuthError>;
}
