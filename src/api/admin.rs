//! Admin-only account and token management.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use super::pipeline::CurrentUser;
use super::types::{
    AccessRequest, MessageResponse, SweepBody, TokenListQuery, UserDto, UserListResponse,
};
use super::validation::{validate_idle_days, validate_user_id};
use super::{ApiError, ApiJson, AppState};
use crate::db::AccessUpdate;
use crate::services::auth_service::RevokeSummary;
use crate::services::{SweepReport, SweepRequest, TokenSummary};

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.account_service().list_users().await?;
    let counts = state.account_service().role_counts().await?;

    Ok(Json(UserListResponse {
        users: users.iter().map(UserDto::from).collect(),
        counts,
    }))
}

/// PUT /admin/users/{id}/access
pub async fn update_access(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<AccessRequest>,
) -> Result<Json<UserDto>, ApiError> {
    let id = validate_user_id(id)?;
    let actor = &current.require()?.user;

    let update = AccessUpdate {
        role: payload.role,
        is_staff: payload.is_staff,
        is_active: payload.is_active,
        is_superuser: payload.is_superuser,
    };
    let user = state
        .account_service()
        .update_access(actor, id, update)
        .await?;

    Ok(Json(UserDto::from(&user)))
}

/// DELETE /admin/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = validate_user_id(id)?;
    let actor = &current.require()?.user;

    state.account_service().delete_user(actor, id).await?;

    Ok(Json(MessageResponse {
        message: format!("User {id} deleted."),
    }))
}

/// DELETE /admin/users/{id}/tokens
pub async fn revoke_user_tokens(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<RevokeSummary>, ApiError> {
    let id = validate_user_id(id)?;
    if state.store().get_user(id).await?.is_none() {
        return Err(ApiError::not_found("User", id));
    }

    let summary = state.account_service().revoke_user_tokens(id).await?;
    Ok(Json(summary))
}

/// GET /admin/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenListQuery>,
) -> Result<Json<Vec<TokenSummary>>, ApiError> {
    let tokens = state
        .account_service()
        .list_tokens(query.username.as_deref())
        .await?;
    Ok(Json(tokens))
}

/// POST /admin/tokens/sweep
pub async fn sweep_tokens(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SweepBody>,
) -> Result<Json<SweepReport>, ApiError> {
    if !body.expired && body.idle_days.is_none() {
        return Err(ApiError::validation(
            "Nothing to sweep: set `expired` and/or `idle_days`",
        ));
    }
    let idle_days = body.idle_days.map(validate_idle_days).transpose()?;

    let report = state
        .account_service()
        .sweep_tokens(SweepRequest {
            expired: body.expired,
            idle_days,
        })
        .await?;
    Ok(Json(report))
}
