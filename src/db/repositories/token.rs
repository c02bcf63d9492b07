use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, Unchanged,
};
use serde::Serialize;

use crate::entities::auth_tokens;

/// Number of random bytes behind each bearer key.
const TOKEN_KEY_BYTES: usize = 64;

/// Bearer token as seen by the rest of the crate (no password echo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthToken {
    pub id: i32,
    #[serde(skip_serializing)]
    pub key: String,
    pub user_id: i32,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<auth_tokens::Model> for AuthToken {
    fn from(model: auth_tokens::Model) -> Self {
        Self {
            id: model.id,
            key: model.key,
            user_id: model.user_id,
            device_name: model.device_name,
            created_at: model.created_at,
            expires_at: model.expires_at,
            last_used: model.last_used,
            is_active: model.is_active,
        }
    }
}

impl AuthToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whole days left before expiry, zero once expired.
    #[must_use]
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        if self.expires_at > now {
            (self.expires_at - now).num_days()
        } else {
            0
        }
    }

    #[must_use]
    pub fn masked_key(&self) -> String {
        mask_key(&self.key)
    }
}

/// Last eight characters of a key followed by an ellipsis, for logs and
/// diagnostics.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let start = key
        .char_indices()
        .rev()
        .nth(7)
        .map_or(0, |(idx, _)| idx);
    format!("{}...", &key[start..])
}

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Issue a new token for `user_id` valid for `lifetime`.
    pub async fn create(
        &self,
        user_id: i32,
        device_name: &str,
        lifetime: Duration,
        password_hash: Option<String>,
    ) -> Result<AuthToken> {
        let now = Utc::now();
        let active = auth_tokens::ActiveModel {
            key: Set(generate_token_key()),
            user_id: Set(user_id),
            device_name: Set(device_name.to_string()),
            created_at: Set(now),
            expires_at: Set(now + lifetime),
            last_used: Set(None),
            is_active: Set(true),
            password_hash: Set(password_hash.unwrap_or_default()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert auth token")?;

        Ok(AuthToken::from(model))
    }

    pub async fn find_by_key(&self, key: &str) -> Result<Option<AuthToken>> {
        let token = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::Key.eq(key))
            .one(&self.conn)
            .await
            .context("Failed to query auth token by key")?;

        Ok(token.map(AuthToken::from))
    }

    /// Replace the key and push the expiry out. Only those two columns are
    /// written; concurrent refreshes of the same row are last-write-wins.
    pub async fn refresh(&self, token: &AuthToken, lifetime: Duration) -> Result<AuthToken> {
        let active = auth_tokens::ActiveModel {
            id: Unchanged(token.id),
            key: Set(generate_token_key()),
            expires_at: Set(Utc::now() + lifetime),
            ..Default::default()
        };

        let model = active
            .update(&self.conn)
            .await
            .with_context(|| format!("Failed to refresh auth token {}", token.id))?;

        Ok(AuthToken::from(model))
    }

    /// Stamp `last_used`.
    pub async fn mark_used(&self, token_id: i32) -> Result<()> {
        let active = auth_tokens::ActiveModel {
            id: Unchanged(token_id),
            last_used: Set(Some(Utc::now())),
            ..Default::default()
        };
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn delete_by_key(&self, key: &str) -> Result<u64> {
        let result = auth_tokens::Entity::delete_many()
            .filter(auth_tokens::Column::Key.eq(key))
            .exec(&self.conn)
            .await
            .context("Failed to delete auth token by key")?;

        Ok(result.rows_affected)
    }

    /// Revoke every token of a user.
    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = auth_tokens::Entity::delete_many()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete tokens for user")?;

        Ok(result.rows_affected)
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = auth_tokens::Entity::delete_many()
            .filter(auth_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired tokens")?;

        Ok(result.rows_affected)
    }

    /// Remove tokens not used since `cutoff`. Tokens that were never used
    /// are judged by their creation time.
    pub async fn delete_idle(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let idle = Condition::any()
            .add(auth_tokens::Column::LastUsed.lt(cutoff))
            .add(
                Condition::all()
                    .add(auth_tokens::Column::LastUsed.is_null())
                    .add(auth_tokens::Column::CreatedAt.lt(cutoff)),
            );

        let result = auth_tokens::Entity::delete_many()
            .filter(idle)
            .exec(&self.conn)
            .await
            .context("Failed to delete idle tokens")?;

        Ok(result.rows_affected)
    }

    /// Tokens newest first, optionally for one user.
    pub async fn list(&self, user_id: Option<i32>) -> Result<Vec<AuthToken>> {
        let mut query = auth_tokens::Entity::find().order_by_desc(auth_tokens::Column::CreatedAt);
        if let Some(user_id) = user_id {
            query = query.filter(auth_tokens::Column::UserId.eq(user_id));
        }

        let tokens = query
            .all(&self.conn)
            .await
            .context("Failed to list auth tokens")?;

        Ok(tokens.into_iter().map(AuthToken::from).collect())
    }

    pub async fn latest_for_user(&self, user_id: i32) -> Result<Option<AuthToken>> {
        let token = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .order_by_desc(auth_tokens::Column::CreatedAt)
            .one(&self.conn)
            .await
            .context("Failed to query latest token for user")?;

        Ok(token.map(AuthToken::from))
    }
}

/// Generate a random bearer key (128 character hex string).
#[must_use]
pub fn generate_token_key() -> String {
    random_hex(TOKEN_KEY_BYTES)
}

pub(crate) fn random_hex(len: usize) -> String {
    use rand::RngCore;

    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);

    bytes.iter().fold(String::with_capacity(len * 2), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_at(expires_at: DateTime<Utc>) -> AuthToken {
        AuthToken {
            id: 1,
            key: generate_token_key(),
            user_id: 1,
            device_name: "test".to_string(),
            created_at: expires_at - Duration::days(7),
            expires_at,
            last_used: None,
            is_active: true,
        }
    }

    #[test]
    fn keys_are_url_safe_and_unique() {
        let a = generate_token_key();
        let b = generate_token_key();
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let token = token_expiring_at(now);
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn days_until_expiry_floors_at_zero() {
        let now = Utc::now();
        assert_eq!(token_expiring_at(now - Duration::days(2)).days_until_expiry(now), 0);
        assert_eq!(
            token_expiring_at(now + Duration::days(3) + Duration::hours(1)).days_until_expiry(now),
            3
        );
    }

    #[test]
    fn mask_key_keeps_last_eight() {
        assert_eq!(mask_key("abcdefghijkl"), "efghijkl...");
        assert_eq!(mask_key("abc"), "abc...");
    }
}
