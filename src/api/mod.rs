use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::auth::cookies::SESSION_COOKIE;
use crate::auth::rate_limit::RateLimitPolicy;
use crate::auth::{Capability, Panel, RateLimiter, TokenResolver};
use crate::config::Config;
use crate::state::SharedState;

mod admin;
pub mod auth;
mod error;
mod extract;
mod observability;
mod pages;
pub mod pipeline;
mod types;
mod validation;

pub use error::ApiError;
pub use extract::ApiJson;
pub use pipeline::{CurrentUser, Gate};
pub use types::*;

use crate::services::{AccountService, AuthService};
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::RateLimitState;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn resolver(&self) -> &TokenResolver {
        &self.shared.resolver
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.shared.rate_limiter
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn account_service(&self) -> &Arc<dyn AccountService> {
        &self.shared.account_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = state.config().server.clone();

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_inactivity_minutes,
        )));

    let api_router = Router::new()
        .merge(create_credential_router(
            &state,
            "/auth/login",
            auth::login,
            state.shared.login_policy(),
        ))
        .merge(create_credential_router(
            &state,
            "/auth/signup",
            auth::signup,
            state.shared.signup_policy(),
        ))
        .merge(create_session_router(&state))
        .merge(create_admin_router(&state))
        .with_state(state.clone());

    let cors_layer = if server.cors_allowed_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_allowed_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .merge(create_page_router(&state).with_state(state.clone()))
        .layer(session_layer)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::suspicious_params_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

/// Login and signup: throttled first, then identity.
fn create_credential_router<H, T>(
    state: &Arc<AppState>,
    path: &str,
    handler: H,
    policy: RateLimitPolicy,
) -> Router<Arc<AppState>>
where
    H: axum::handler::Handler<T, Arc<AppState>>,
    T: 'static,
{
    let throttle = RateLimitState {
        limiter: state.rate_limiter().clone(),
        policy,
    };

    Router::new()
        .route(path, post(handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            pipeline::resolve_identity,
        ))
        .route_layer(middleware::from_fn_with_state(throttle, pipeline::rate_limit))
}

fn create_session_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let open = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/safe-logout", post(auth::safe_logout));

    let authenticated = Router::new()
        .route("/auth/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            Gate::api(Capability::Authenticated),
            pipeline::authorize,
        ));

    open.merge(authenticated)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            pipeline::resolve_identity,
        ))
}

fn create_admin_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/tokens/inspect", get(auth::inspect_tokens))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/users/{id}/access", put(admin::update_access))
        .route("/admin/users/{id}/tokens", delete(admin::revoke_user_tokens))
        .route("/admin/tokens", get(admin::list_tokens))
        .route("/admin/tokens/sweep", post(admin::sweep_tokens))
        .route("/admin/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(
            Gate::api(Capability::Admin),
            pipeline::authorize,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            pipeline::resolve_identity,
        ))
}

fn create_page_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(pages::home))
        .merge(gated_page(Panel::Admin, pages::admin_panel))
        .merge(gated_page(Panel::Support, pages::support_panel))
        .merge(gated_page(Panel::Customer, pages::customer_panel))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            pipeline::resolve_identity,
        ))
}

fn gated_page<H, T>(panel: Panel, handler: H) -> Router<Arc<AppState>>
where
    H: axum::handler::Handler<T, Arc<AppState>>,
    T: 'static,
{
    Router::new()
        .route(panel.path(), get(handler))
        .route_layer(middleware::from_fn_with_state(
            Gate::page(panel),
            pipeline::authorize,
        ))
}
