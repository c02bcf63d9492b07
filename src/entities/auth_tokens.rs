use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// 128-char hex bearer key
    #[sea_orm(unique)]
    pub key: String,

    pub user_id: i32,

    pub device_name: String,

    pub created_at: DateTimeUtc,

    pub expires_at: DateTimeUtc,

    pub last_used: Option<DateTimeUtc>,

    pub is_active: bool,

    /// Display-only echo of the login password hash. Never used to authenticate.
    pub password_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
