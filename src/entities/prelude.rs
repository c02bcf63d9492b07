pub use super::auth_tokens::Entity as AuthTokens;
pub use super::legacy_tokens::Entity as LegacyTokens;
pub use super::users::Entity as Users;
