use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::token::random_hex;
use crate::entities::legacy_tokens;

/// Older clients send 40-char hex keys.
const LEGACY_KEY_BYTES: usize = 20;

pub struct LegacyTokenRepository {
    conn: DatabaseConnection,
}

impl LegacyTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Return the user's static key, creating it on first use.
    pub async fn get_or_create(&self, user_id: i32) -> Result<String> {
        let existing = legacy_tokens::Entity::find()
            .filter(legacy_tokens::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query legacy token")?;

        if let Some(token) = existing {
            return Ok(token.key);
        }

        let active = legacy_tokens::ActiveModel {
            key: Set(random_hex(LEGACY_KEY_BYTES)),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };
        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert legacy token")?;

        Ok(model.key)
    }

    pub async fn find_user_id(&self, key: &str) -> Result<Option<i32>> {
        let token = legacy_tokens::Entity::find_by_id(key.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query legacy token by key")?;

        Ok(token.map(|t| t.user_id))
    }

    pub async fn has_token(&self, user_id: i32) -> Result<bool> {
        let token = legacy_tokens::Entity::find()
            .filter(legacy_tokens::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query legacy token")?;

        Ok(token.is_some())
    }

    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = legacy_tokens::Entity::delete_many()
            .filter(legacy_tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete legacy token")?;

        Ok(result.rows_affected)
    }
}
