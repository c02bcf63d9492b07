use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use super::pipeline::CurrentUser;
use super::types::{
    CredentialsResponse, LoginRequest, MessageResponse, ProfileResponse, SafeLogoutResponse,
    SignupRequest, SourceReport, TokenInspection, UserDto,
};
use super::{ApiError, ApiJson, AppState};
use crate::auth::cookies::{
    AUTH_TOKEN_COOKIE, CSRF_COOKIE, append_set_cookies, logout_removals, read_cookie, removal,
};
use crate::auth::resolver::token_param;
use crate::auth::{Credentials, SessionBridge, landing_panel};
use crate::services::{IssuedCredentials, SignupInput};

const LOGIN_URL: &str = "/accounts/login/";

/// Device label stored on the token: explicit name, else the user agent.
fn device_label(explicit: Option<String>, headers: &HeaderMap) -> String {
    explicit
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .map(|name| name.chars().take(100).collect())
        .unwrap_or_default()
}

/// Users other than `keep` that this request still carries credentials for:
/// the resolved identity and the owner of any `auth_token` cookie.
async fn previous_users(
    state: &AppState,
    current: &CurrentUser,
    headers: &HeaderMap,
    keep: Option<i32>,
) -> BTreeSet<i32> {
    let mut users = BTreeSet::new();
    if let Some(user) = current.user() {
        users.insert(user.id);
    }

    if let Some(key) = read_cookie(headers, AUTH_TOKEN_COOKIE) {
        match state.store().find_token(&key).await {
            Ok(Some(token)) => {
                users.insert(token.user_id);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to look up cookie token owner"),
        }
    }

    if let Some(keep) = keep {
        users.remove(&keep);
    }
    users
}

/// Revoke every token of accounts the browser was previously signed in as,
/// so nothing of theirs survives a switch to `new_user_id`.
async fn retire_previous_accounts(
    state: &AppState,
    current: &CurrentUser,
    headers: &HeaderMap,
    new_user_id: i32,
) {
    for user_id in previous_users(state, current, headers, Some(new_user_id)).await {
        info!(previous_user_id = user_id, new_user_id, "Retiring previous account credentials");
        if let Err(e) = state.auth_service().revoke_all(user_id).await {
            warn!(user_id, error = %e, "Failed to revoke previous account tokens");
        }
    }
}

fn credentials_response(
    state: &AppState,
    status: StatusCode,
    issued: &IssuedCredentials,
    message: &'static str,
    clear_csrf: bool,
) -> Response {
    let body = CredentialsResponse {
        token: issued.token.key.clone(),
        backup_token: issued.backup_token.clone(),
        user: UserDto::from(&issued.user),
        redirect_url: landing_panel(&issued.user).path(),
        token_expires: issued.token.expires_at,
        message,
    };

    let mut response = (status, Json(body)).into_response();
    let mut cookies = state
        .shared
        .cookie_policy()
        .login_cookies(&issued.token.key, &issued.user);
    if clear_csrf {
        cookies.push(removal(CSRF_COOKIE));
    }
    append_set_cookies(response.headers_mut(), cookies);
    response
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    session: Session,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let device = device_label(payload.device_name, &headers);

    let issued = match state
        .auth_service()
        .login(&payload.username, &payload.password, &device)
        .await
    {
        Ok(issued) => issued,
        Err(e) => {
            metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
            warn!(username = %payload.username, reason = %e, "Login failed");
            return Err(e.into());
        }
    };
    metrics::counter!("auth_login_total", "outcome" => "success").increment(1);

    retire_previous_accounts(&state, &current, &headers, issued.user.id).await;

    SessionBridge::establish(&session, &issued.user, false)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    info!(user_id = issued.user.id, username = %issued.user.username, "Login successful");
    Ok(credentials_response(
        &state,
        StatusCode::OK,
        &issued,
        "Login successful.",
        false,
    ))
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    session: Session,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<Response, ApiError> {
    let input = SignupInput {
        username: payload.username,
        email: payload.email,
        password1: payload.password1,
        password2: payload.password2,
        device_name: device_label(payload.device_name, &headers),
    };

    let issued = state.auth_service().signup(input).await?;

    retire_previous_accounts(&state, &current, &headers, issued.user.id).await;

    SessionBridge::establish(&session, &issued.user, false)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(credentials_response(
        &state,
        StatusCode::CREATED,
        &issued,
        "Account created and signed in.",
        true,
    ))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    session: Session,
) -> Response {
    if let Some(identity) = &current.0 {
        let presented = identity.token.as_ref().map(|token| token.key.as_str());
        if let Err(e) = state
            .auth_service()
            .logout(identity.user.id, presented)
            .await
        {
            warn!(user_id = identity.user.id, error = %e, "Failed to revoke tokens on logout");
        }
    }

    if let Err(e) = SessionBridge::terminate(&session).await {
        warn!(error = %e, "Failed to end session on logout");
    }

    let mut response = Json(MessageResponse {
        message: "Logged out successfully.".to_string(),
    })
    .into_response();
    append_set_cookies(response.headers_mut(), logout_removals(false));
    response
}

/// POST /auth/safe-logout
///
/// Revokes everything the browser could still authenticate with. Always
/// answers 200 so the client can finish navigating away.
pub async fn safe_logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    session: Session,
    headers: HeaderMap,
) -> Response {
    for user_id in previous_users(&state, &current, &headers, None).await {
        if let Err(e) = state.auth_service().revoke_all(user_id).await {
            warn!(user_id, error = %e, "Failed to revoke tokens on safe logout");
        }
    }

    if let Err(e) = SessionBridge::terminate(&session).await {
        warn!(error = %e, "Failed to end session on safe logout");
    }

    let mut response = Json(SafeLogoutResponse {
        message: "All sessions and tokens have been cleared.",
        redirect_url: LOGIN_URL,
        action: "safe_logout_complete",
    })
    .into_response();
    append_set_cookies(response.headers_mut(), logout_removals(true));
    response
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let identity = current.require()?;

    let token_info = state
        .auth_service()
        .token_info(identity.user.id, identity.token.as_ref())
        .await?;

    Ok(Json(ProfileResponse {
        user: UserDto::from(&identity.user),
        auth_source: identity.source,
        token_info,
    }))
}

/// GET /auth/tokens/inspect
///
/// Reports what each credential on this request points at, without
/// refreshing or stamping anything.
pub async fn inspect_tokens(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    session: Session,
    headers: HeaderMap,
    uri: axum::http::Uri,
) -> Json<TokenInspection> {
    let mut credentials = Credentials::from_headers(&headers);
    credentials.param = uri.query().and_then(|q| token_param(q.as_bytes()));

    let mut candidates = Vec::new();
    for (source, key) in credentials.candidates() {
        candidates.push(SourceReport {
            source,
            report: state.resolver().inspect(key).await,
        });
    }

    let session_user_id = SessionBridge::current_user_id(&session)
        .await
        .ok()
        .flatten();

    Json(TokenInspection {
        resolved_user: current.user().map(|u| u.username.clone()),
        resolved_via: current.0.as_ref().map(|identity| identity.source),
        session_user_id,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn device_label_prefers_explicit_name() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));

        assert_eq!(device_label(Some("laptop".to_string()), &headers), "laptop");
        assert_eq!(device_label(Some("  ".to_string()), &headers), "curl/8.0");
        assert_eq!(device_label(None, &HeaderMap::new()), "");
    }

    #[test]
    fn device_label_is_clamped() {
        let long = "x".repeat(500);
        assert_eq!(device_label(Some(long), &HeaderMap::new()).len(), 100);
    }
}
