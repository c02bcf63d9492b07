//! `SeaORM` implementation of the `AccountService` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::info;

use crate::auth::validation::{sanitize_username, validate_email, validate_username};
use crate::config::SecurityConfig;
use crate::db::{AccessUpdate, NewUser, Store, User};
use crate::entities::users::Role;
use crate::services::account_service::{
    AccountService, RoleCounts, SweepReport, SweepRequest, TokenSummary,
};
use crate::services::auth_service::{AuthError, RevokeSummary};

pub struct SeaOrmAccountService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAccountService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    async fn require_user(&self, user_id: i32) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn require_username(&self, username: &str) -> Result<User, AuthError> {
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_users().await?)
    }

    async fn role_counts(&self) -> Result<RoleCounts, AuthError> {
        Ok(RoleCounts {
            admin: self.store.count_users_by_role(Role::Admin).await?,
            support: self.store.count_users_by_role(Role::Support).await?,
            customer: self.store.count_users_by_role(Role::Customer).await?,
        })
    }

    async fn update_access(
        &self,
        actor: &User,
        user_id: i32,
        update: AccessUpdate,
    ) -> Result<User, AuthError> {
        self.require_user(user_id).await?;

        let user = self.store.update_user_access(user_id, update).await?;
        info!(
            actor = %actor.username,
            user_id,
            role = %user.role,
            is_staff = user.is_staff,
            is_active = user.is_active,
            is_superuser = user.is_superuser,
            "User access updated"
        );

        if !user.is_active {
            self.revoke_user_tokens(user_id).await?;
        }
        Ok(user)
    }

    async fn delete_user(&self, actor: &User, user_id: i32) -> Result<(), AuthError> {
        let target = self.require_user(user_id).await?;

        if target.id == actor.id {
            return Err(AuthError::Forbidden(
                "You cannot delete your own account.".to_string(),
            ));
        }
        if target.is_superuser {
            return Err(AuthError::Forbidden(
                "Superuser accounts cannot be deleted.".to_string(),
            ));
        }

        self.revoke_user_tokens(user_id).await?;
        self.store.delete_user(user_id).await?;

        info!(actor = %actor.username, username = %target.username, "User deleted");
        Ok(())
    }

    async fn list_tokens(&self, username: Option<&str>) -> Result<Vec<TokenSummary>, AuthError> {
        let user_id = match username {
            Some(name) => Some(self.require_username(name).await?.id),
            None => None,
        };

        let usernames: HashMap<i32, String> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let now = Utc::now();
        let tokens = self.store.list_tokens(user_id).await?;
        Ok(tokens
            .iter()
            .map(|token| {
                let owner = usernames
                    .get(&token.user_id)
                    .cloned()
                    .unwrap_or_default();
                TokenSummary::new(token, owner, now)
            })
            .collect())
    }

    async fn revoke_user_tokens(&self, user_id: i32) -> Result<RevokeSummary, AuthError> {
        Ok(RevokeSummary {
            tokens: self.store.delete_tokens_for_user(user_id).await?,
            legacy_tokens: self.store.delete_legacy_token(user_id).await?,
        })
    }

    async fn revoke_tokens_by_username(&self, username: &str) -> Result<RevokeSummary, AuthError> {
        let user = self.require_username(username).await?;
        let summary = self.revoke_user_tokens(user.id).await?;
        info!(
            username,
            tokens = summary.tokens,
            legacy_tokens = summary.legacy_tokens,
            "Tokens revoked"
        );
        Ok(summary)
    }

    async fn sweep_tokens(&self, request: SweepRequest) -> Result<SweepReport, AuthError> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        if request.expired {
            report.expired_removed = self.store.delete_expired_tokens(now).await?;
        }
        if let Some(days) = request.idle_days {
            let cutoff = now - Duration::days(i64::from(days));
            report.idle_removed = self.store.delete_idle_tokens(cutoff).await?;
        }

        info!(
            expired_removed = report.expired_removed,
            idle_removed = report.idle_removed,
            "Token sweep finished"
        );
        Ok(report)
    }

    async fn issue_missing_legacy_tokens(&self) -> Result<usize, AuthError> {
        let mut created = 0;
        for user in self.store.list_users().await? {
            if !self.store.has_legacy_token(user.id).await? {
                self.store.legacy_token_for_user(user.id).await?;
                created += 1;
            }
        }
        Ok(created)
    }

    async fn create_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = sanitize_username(username);
        validate_username(&username).map_err(AuthError::Validation)?;
        validate_email(email).map_err(AuthError::Validation)?;
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required.".to_string()));
        }

        if self.store.username_exists(&username).await? {
            return Err(AuthError::Conflict(format!(
                "User '{username}' already exists."
            )));
        }
        if self.store.email_exists(email).await? {
            return Err(AuthError::Conflict(format!(
                "Email '{email}' is already in use."
            )));
        }

        let new_user = NewUser {
            role: Role::Admin,
            is_staff: true,
            is_superuser: true,
            ..NewUser::customer(&username, email, password)
        };
        let user = self.store.create_user(new_user, Some(&self.security)).await?;
        self.store.legacy_token_for_user(user.id).await?;

        info!(username = %user.username, "Admin account created");
        Ok(user)
    }

    async fn fix_admin_role(&self, username: &str) -> Result<User, AuthError> {
        let user = self.require_username(username).await?;
        let update = AccessUpdate {
            role: Some(Role::Admin),
            is_staff: Some(true),
            is_superuser: Some(true),
            is_active: None,
        };
        Ok(self.store.update_user_access(user.id, update).await?)
    }

    async fn set_role(&self, username: &str, role: Role) -> Result<User, AuthError> {
        let user = self.require_username(username).await?;
        let update = AccessUpdate {
            role: Some(role),
            ..AccessUpdate::default()
        };
        Ok(self.store.update_user_access(user.id, update).await?)
    }
}
