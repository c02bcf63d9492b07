//! Request pipeline stages, applied in order: rate limit, identity, gate.
//!
//! Each stage is an ordinary axum middleware so a router can stack exactly the
//! stages a route group needs and tests can drive each one alone.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, warn};

use super::{ApiError, AppState};
use crate::auth::cookies::{AUTH_TOKEN_COOKIE, SESSION_COOKIE, append_set_cookies, read_cookie};
use crate::auth::resolver::token_param;
use crate::auth::{
    AttemptOutcome, Capability, Credentials, Decision, Identity, Panel, RateLimitDecision,
    RateLimitPolicy, RateLimiter, SessionBridge, decide, landing_panel,
};
use crate::db::User;

/// Largest form body buffered while looking for a `token` field.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Outcome of identity resolution, present on every request that passed the
/// identity stage.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<Identity>);

impl CurrentUser {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|identity| &identity.user)
    }

    pub fn require(&self) -> Result<&Identity, ApiError> {
        self.0.as_ref().ok_or_else(ApiError::authentication_required)
    }
}

// ============================================================================
// Rate limit
// ============================================================================

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub policy: RateLimitPolicy,
}

pub async fn rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client_ip = state.limiter.client_ip(request.headers(), peer);

    if state.limiter.check(&client_ip, &state.policy) == RateLimitDecision::Limited {
        metrics::counter!("auth_rate_limited_total", "scope" => state.policy.scope).increment(1);
        return ApiError::TooManyRequests.into_response();
    }

    let response = next.run(request).await;
    state.limiter.record(
        &client_ip,
        &state.policy,
        AttemptOutcome::from_status(response.status()),
    );
    response
}

// ============================================================================
// Identity
// ============================================================================

pub async fn resolve_identity(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let mut credentials = Credentials::from_headers(request.headers());
    let has_session_cookie = read_cookie(request.headers(), SESSION_COOKIE).is_some();

    let mut request = request;
    if state.config().server.allow_token_in_query {
        credentials.param = request
            .uri()
            .query()
            .and_then(|query| token_param(query.as_bytes()));

        if credentials.param.is_none() && is_form(request.headers()) {
            let (parts, body) = request.into_parts();
            let Ok(bytes) = axum::body::to_bytes(body, FORM_BODY_LIMIT).await else {
                return ApiError::validation("Request body too large").into_response();
            };
            credentials.param = token_param(&bytes);
            request = Request::from_parts(parts, Body::from(bytes));
        }
    }

    credentials.session_user_id = match SessionBridge::current_user_id(&session).await {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!(error = %e, "Failed to read session");
            None
        }
    };

    let identity = state.resolver().resolve(&credentials).await;

    if let Some(identity) = &identity {
        let span = tracing::Span::current();
        span.record("user_id", identity.user.id);
        debug!(source = %identity.source, username = %identity.user.username, "Identity resolved");

        if identity.wants_session(has_session_cookie)
            && let Err(e) = SessionBridge::establish(&session, &identity.user, true).await
        {
            warn!(user_id = identity.user.id, error = %e, "Failed to bridge token to session");
        }
    }

    let refreshed_key = identity
        .as_ref()
        .and_then(|identity| identity.refreshed_key.clone());

    request.extensions_mut().insert(CurrentUser(identity));
    let mut response = next.run(request).await;

    // Hand the renewed key back unless the handler already set or cleared it.
    if let Some(key) = refreshed_key
        && !sets_cookie(response.headers(), AUTH_TOKEN_COOKIE)
    {
        let cookie = state.shared.cookie_policy().token_cookie(&key);
        append_set_cookies(response.headers_mut(), [cookie]);
    }

    response
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value
                .split_once('=')
                .is_some_and(|(cookie_name, _)| cookie_name.trim() == name)
        })
}

// ============================================================================
// Authorization gate
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub enum Surface {
    /// JSON endpoints: 401 / 403.
    Api,
    /// Browser pages: redirects only.
    Page(Panel),
}

#[derive(Clone, Copy, Debug)]
pub struct Gate {
    pub capability: Capability,
    pub surface: Surface,
}

impl Gate {
    #[must_use]
    pub const fn api(capability: Capability) -> Self {
        Self {
            capability,
            surface: Surface::Api,
        }
    }

    #[must_use]
    pub const fn page(panel: Panel) -> Self {
        Self {
            capability: panel.required_capability(),
            surface: Surface::Page(panel),
        }
    }

    /// What to send instead of the protected handler, if anything.
    #[must_use]
    pub fn deny(&self, user: Option<&User>) -> Option<Response> {
        let decision = decide(user, self.capability);
        match (decision, self.surface) {
            (Decision::Allow, _) => None,
            (Decision::Unauthenticated, Surface::Api) => {
                Some(ApiError::authentication_required().into_response())
            }
            (Decision::Forbidden, Surface::Api) => {
                let err = if self.capability == Capability::Admin {
                    ApiError::admin_required()
                } else {
                    ApiError::Forbidden("Insufficient role".to_string())
                };
                Some(err.into_response())
            }
            (Decision::Unauthenticated, Surface::Page(panel)) => Some(
                Redirect::to(&format!("/?redirect={}", panel.name())).into_response(),
            ),
            (Decision::Forbidden, Surface::Page(_)) => {
                let landing = user.map_or(Panel::Customer, landing_panel);
                Some(Redirect::to(landing.path()).into_response())
            }
        }
    }
}

pub async fn authorize(
    State(gate): State<Gate>,
    request: Request,
    next: Next,
) -> Response {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .unwrap_or_default();

    if let Some(denied) = gate.deny(current.user()) {
        if let Some(user) = current.user() {
            warn!(
                username = %user.username,
                role = %user.role,
                capability = ?gate.capability,
                "Access denied"
            );
        }
        return denied;
    }

    next.run(request).await
}
