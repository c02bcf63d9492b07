//! Browser entry points. Pages never answer 401/403; they redirect.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};

use super::pipeline::CurrentUser;
use super::types::{HomeQuery, LandingResponse, PanelResponse, UserDto};
use super::validation::validate_redirect_hint;
use super::{ApiError, AppState};
use crate::auth::{Panel, redirect_target};

/// GET /
///
/// Signed-in users go to their panel (or the requested one, when allowed).
/// Anonymous users with a redirect hint are sent to log in first.
pub async fn home(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<HomeQuery>,
) -> Response {
    let hint = query
        .redirect
        .as_deref()
        .and_then(|hint| validate_redirect_hint(hint).ok());

    if let Some(user) = current.user() {
        return Redirect::to(redirect_target(user, hint).path()).into_response();
    }

    if let Some(hint) = hint {
        let next: String = url::form_urlencoded::byte_serialize(hint.as_bytes()).collect();
        return Redirect::to(&format!("/accounts/login/?next={next}")).into_response();
    }

    Json(LandingResponse {
        message: "Welcome to the helpdesk. Sign in to continue.",
        login_url: "/accounts/login/",
        signup_url: "/accounts/signup/",
    })
    .into_response()
}

async fn panel(
    state: &AppState,
    current: &CurrentUser,
    panel: Panel,
) -> Result<Json<PanelResponse>, ApiError> {
    let user = &current.require()?.user;

    let counts = if panel == Panel::Admin {
        Some(state.account_service().role_counts().await?)
    } else {
        None
    };

    Ok(Json(PanelResponse {
        panel,
        title: panel.title(),
        user: UserDto::from(user),
        counts,
    }))
}

/// GET /accounts/admin-panel/
pub async fn admin_panel(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<PanelResponse>, ApiError> {
    panel(&state, &current, Panel::Admin).await
}

/// GET /accounts/support-panel/
pub async fn support_panel(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<PanelResponse>, ApiError> {
    panel(&state, &current, Panel::Support).await
}

/// GET /accounts/customer-panel/
pub async fn customer_panel(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<PanelResponse>, ApiError> {
    panel(&state, &current, Panel::Customer).await
}
