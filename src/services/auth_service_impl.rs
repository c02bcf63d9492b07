//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::validation::{
    EMAIL_MAX_LEN, sanitize_input, sanitize_username, validate_email, validate_password_strength,
    validate_username,
};
use crate::config::{SecurityConfig, TokenConfig};
use crate::db::{AuthToken, NewUser, Store, User};
use crate::services::auth_service::{
    AuthError, AuthService, IssuedCredentials, RevokeSummary, SignupInput, TokenInfo,
};

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenConfig,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, tokens: TokenConfig, security: SecurityConfig) -> Self {
        Self {
            store,
            tokens,
            security,
        }
    }

    async fn issue(&self, user: User, device_name: &str) -> Result<IssuedCredentials, AuthError> {
        let password_hash = self.store.user_password_hash(user.id).await?;
        let token = self
            .store
            .create_token(user.id, device_name, self.tokens.lifetime(), password_hash)
            .await?;
        let backup_token = self.store.legacy_token_for_user(user.id).await?;

        info!(
            user_id = user.id,
            token = %token.masked_key(),
            expires_at = %token.expires_at,
            "Token issued"
        );

        Ok(IssuedCredentials {
            user,
            token,
            backup_token,
        })
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        username: &str,
        password: &str,
        device_name: &str,
    ) -> Result<IssuedCredentials, AuthError> {
        let username = sanitize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required.".to_string(),
            ));
        }

        let user = self
            .store
            .verify_user_password(&username, password, Some(&self.security))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }

        if self.tokens.single_session {
            let revoked = self.store.delete_tokens_for_user(user.id).await?;
            if revoked > 0 {
                debug!(user_id = user.id, revoked, "Revoked earlier tokens");
            }
        }

        if let Err(e) = self.store.touch_last_login(user.id).await {
            warn!(user_id = user.id, error = %e, "Failed to update last login");
        }

        self.issue(user, device_name).await
    }

    async fn signup(&self, input: SignupInput) -> Result<IssuedCredentials, AuthError> {
        let username = sanitize_username(&input.username);
        let email = sanitize_input(&input.email, EMAIL_MAX_LEN);

        if username.is_empty()
            || email.is_empty()
            || input.password1.is_empty()
            || input.password2.is_empty()
        {
            return Err(AuthError::Validation("All fields are required.".to_string()));
        }

        validate_username(&username).map_err(AuthError::Validation)?;
        validate_email(&email).map_err(AuthError::Validation)?;

        if input.password1 != input.password2 {
            return Err(AuthError::Validation("Passwords do not match.".to_string()));
        }

        let weaknesses = validate_password_strength(&input.password1);
        if !weaknesses.is_empty() {
            return Err(AuthError::Validation(format!(
                "Password is not strong enough: {}",
                weaknesses.join(", ")
            )));
        }

        if self.store.username_exists(&username).await? {
            return Err(AuthError::Conflict(
                "This username is already taken.".to_string(),
            ));
        }
        if self.store.email_exists(&email).await? {
            return Err(AuthError::Conflict(
                "This email address is already in use.".to_string(),
            ));
        }

        let user = self
            .store
            .create_user(
                NewUser::customer(&username, &email, &input.password1),
                Some(&self.security),
            )
            .await?;

        info!(user_id = user.id, username = %user.username, "Account created");

        self.issue(user, &input.device_name).await
    }

    async fn logout(&self, user_id: i32, presented_key: Option<&str>) -> Result<(), AuthError> {
        let tokens = match presented_key {
            Some(key) => self.store.delete_token_by_key(key).await?,
            None => 0,
        };
        let legacy = self.store.delete_legacy_token(user_id).await?;

        info!(user_id, tokens, legacy, "Logged out");
        Ok(())
    }

    async fn revoke_all(&self, user_id: i32) -> Result<RevokeSummary, AuthError> {
        let summary = RevokeSummary {
            tokens: self.store.delete_tokens_for_user(user_id).await?,
            legacy_tokens: self.store.delete_legacy_token(user_id).await?,
        };

        info!(
            user_id,
            tokens = summary.tokens,
            legacy_tokens = summary.legacy_tokens,
            "Revoked all tokens"
        );
        Ok(summary)
    }

    async fn token_info(
        &self,
        user_id: i32,
        current: Option<&AuthToken>,
    ) -> Result<Option<TokenInfo>, AuthError> {
        let now = Utc::now();
        if let Some(token) = current {
            return Ok(Some(TokenInfo::describe(token, now)));
        }

        let latest = self.store.latest_token_for_user(user_id).await?;
        Ok(latest.map(|token| TokenInfo::describe(&token, now)))
    }
}
