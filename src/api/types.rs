use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::TokenSource;
use crate::auth::resolver::KeyReport;
use crate::db::User;
use crate::entities::users::Role;
use crate::services::TokenInfo;
use crate::services::account_service::RoleCounts;

/// User as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name_or_username(),
            role: user.role,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_active: user.is_active,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
}

/// Only these fields are read; anything else in the body (role, flags) is
/// ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub token: String,
    pub backup_token: String,
    pub user: UserDto,
    pub redirect_url: &'static str,
    pub token_expires: DateTime<Utc>,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SafeLogoutResponse {
    pub message: &'static str,
    pub redirect_url: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserDto,
    pub auth_source: TokenSource,
    pub token_info: Option<TokenInfo>,
}

#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub source: TokenSource,
    #[serde(flatten)]
    pub report: KeyReport,
}

#[derive(Debug, Serialize)]
pub struct TokenInspection {
    pub resolved_user: Option<String>,
    pub resolved_via: Option<TokenSource>,
    pub session_user_id: Option<i32>,
    pub candidates: Vec<SourceReport>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserDto>,
    pub counts: RoleCounts,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessRequest {
    pub role: Option<Role>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SweepBody {
    pub expired: bool,
    pub idle_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenListQuery {
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LandingResponse {
    pub message: &'static str,
    pub login_url: &'static str,
    pub signup_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PanelResponse {
    pub panel: crate::auth::Panel,
    pub title: &'static str,
    pub user: UserDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<RoleCounts>,
}
