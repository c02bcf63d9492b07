pub mod prelude;

pub mod auth_tokens;
pub mod legacy_tokens;
pub mod users;
