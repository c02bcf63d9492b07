//! Shared harness: a full router over an in-memory database.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use helpdesk::api::AppState;
use helpdesk::config::Config;
use helpdesk::db::{NewUser, User};
use helpdesk::entities::users::Role;
use helpdesk::state::SharedState;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "Str0ng!Pass";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

/// Defaults with cheap password hashing.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let shared = Arc::new(
        SharedState::new(config)
            .await
            .expect("Failed to create shared state"),
    );
    let state = helpdesk::api::create_app_state(shared, None);
    let router = helpdesk::api::router(state.clone());
    TestApp { router, state }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn create_user(&self, username: &str, role: Role) -> User {
        let new_user = NewUser {
            role,
            ..NewUser::customer(username, &format!("{username}@example.com"), PASSWORD)
        };
        self.state
            .store()
            .create_user(new_user, Some(&self.state.config().security))
            .await
            .expect("Failed to create user")
    }

    pub async fn login_response(&self, username: &str, password: &str) -> Response<Body> {
        self.send(json_request(
            "POST",
            "/api/auth/login",
            &serde_json::json!({ "username": username, "password": password }),
        ))
        .await
    }

    /// Log in and return the issued key plus every cookie the response set.
    pub async fn login(&self, username: &str) -> (String, Vec<(String, String)>) {
        let response = self.login_response(username, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK, "login as {username}");
        let cookies = set_cookies(&response);
        let body = body_json(response).await;
        let key = body["token"].as_str().expect("token in body").to_string();
        (key, cookies)
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn token_header(key: &str) -> String {
    format!("Token {key}")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}

/// `(name, value)` of every `Set-Cookie` header, in order.
pub fn set_cookies<B>(response: &Response<B>) -> Vec<(String, String)> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| {
            let pair = value.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn set_cookie_header<B>(response: &Response<B>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

pub fn cookie<'a>(cookies: &'a [(String, String)], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .rev()
        .find(|(cookie_name, _)| cookie_name == name)
        .map(|(_, value)| value.as_str())
}

pub fn location<B>(response: &Response<B>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
