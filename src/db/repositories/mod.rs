pub mod legacy_token;
pub mod token;
pub mod user;
