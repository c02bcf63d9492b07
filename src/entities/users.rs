use sea_orm::ActiveValue;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mutually exclusive classification of an account.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "support")]
    Support,
    #[sea_orm(string_value = "customer")]
    Customer,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Support => "support",
            Self::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "support" => Ok(Self::Support),
            "customer" => Ok(Self::Customer),
            other => Err(format!("Unknown role '{other}' (expected admin, support or customer)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub role: Role,

    pub is_staff: bool,

    pub is_superuser: bool,

    pub is_active: bool,

    pub date_joined: DateTimeUtc,

    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::auth_tokens::Entity")]
    AuthTokens,
    #[sea_orm(has_one = "super::legacy_tokens::Entity")]
    LegacyToken,
}

impl Related<super::auth_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthTokens.def()
    }
}

impl Related<super::legacy_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LegacyToken.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Superusers are always admins. Partial updates that leave
    /// `is_superuser` untouched consult the stored row.
    async fn before_save<C>(mut self, db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let is_superuser = match &self.is_superuser {
            ActiveValue::Set(value) | ActiveValue::Unchanged(value) => *value,
            ActiveValue::NotSet => {
                if insert {
                    false
                } else if let ActiveValue::Set(id) | ActiveValue::Unchanged(id) = &self.id {
                    Entity::find_by_id(*id)
                        .one(db)
                        .await?
                        .is_some_and(|stored| stored.is_superuser)
                } else {
                    false
                }
            }
        };

        if is_superuser {
            self.role = ActiveValue::Set(Role::Admin);
        }

        Ok(self)
    }
}
