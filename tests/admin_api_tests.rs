mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use common::*;
use helpdesk::entities::{auth_tokens, users::Role};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

struct Admin {
    app: TestApp,
    key: String,
    id: i32,
}

async fn admin_app() -> Admin {
    let app = spawn_app().await;
    let admin = app.create_user("ada", Role::Admin).await;
    let (key, _) = app.login("ada").await;
    Admin {
        app,
        key,
        id: admin.id,
    }
}

impl Admin {
    async fn call(&self, method: &str, uri: &str, body: Option<serde_json::Value>) -> axum::http::Response<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, token_header(&self.key));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.app.send(request).await
    }
}

#[tokio::test]
async fn admin_routes_distinguish_anonymous_from_wrong_role() {
    let app = spawn_app().await;
    app.create_user("carol", Role::Customer).await;
    app.create_user("sam", Role::Support).await;
    let (customer_key, _) = app.login("carol").await;
    let (support_key, _) = app.login("sam").await;

    let anonymous = app.send(get("/api/admin/users").body(Body::empty()).unwrap()).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    for key in [customer_key, support_key] {
        let response = app
            .send(
                get("/api/admin/users")
                    .header(header::AUTHORIZATION, token_header(&key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Admin access required" })
        );
    }
}

#[tokio::test]
async fn lists_users_with_role_counts() {
    let admin = admin_app().await;
    admin.app.create_user("carol", Role::Customer).await;

    let response = admin.call("GET", "/api/admin/users", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert_eq!(body["counts"]["admin"], 1);
    assert_eq!(body["counts"]["customer"], 1);
}

#[tokio::test]
async fn deactivating_a_user_revokes_their_tokens() {
    let admin = admin_app().await;
    let carol = admin.app.create_user("carol", Role::Customer).await;
    let (carol_key, _) = admin.app.login("carol").await;

    let response = admin
        .call(
            "PUT",
            &format!("/api/admin/users/{}/access", carol.id),
            Some(json!({ "role": "support", "is_active": false })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "support");
    assert_eq!(body["is_active"], false);

    assert!(admin.app.state.store().find_token(&carol_key).await.unwrap().is_none());
    let response = admin
        .app
        .send(
            get("/api/auth/me")
                .header(header::AUTHORIZATION, token_header(&carol_key))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn granting_superuser_pins_role_to_admin() {
    let admin = admin_app().await;
    let carol = admin.app.create_user("carol", Role::Customer).await;

    let response = admin
        .call(
            "PUT",
            &format!("/api/admin/users/{}/access", carol.id),
            Some(json!({ "is_superuser": true })),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["role"], "admin");

    let response = admin
        .call(
            "PUT",
            &format!("/api/admin/users/{}/access", carol.id),
            Some(json!({ "role": "customer" })),
        )
        .await;
    assert_eq!(body_json(response).await["role"], "admin");
}

#[tokio::test]
async fn delete_protects_self_and_superusers() {
    let admin = admin_app().await;
    let carol = admin.app.create_user("carol", Role::Customer).await;

    let response = admin
        .call("DELETE", &format!("/api/admin/users/{}", admin.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = admin
        .call("DELETE", &format!("/api/admin/users/{}", carol.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(admin.app.state.store().get_user(carol.id).await.unwrap().is_none());

    let response = admin.call("DELETE", "/api/admin/users/0", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoking_tokens_of_missing_user_is_404() {
    let admin = admin_app().await;

    let response = admin.call("DELETE", "/api/admin/users/999/tokens", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoke_user_tokens_reports_both_tables() {
    let admin = admin_app().await;
    let carol = admin.app.create_user("carol", Role::Customer).await;
    admin.app.login("carol").await;

    let response = admin
        .call("DELETE", &format!("/api/admin/users/{}/tokens", carol.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "tokens": 1, "legacy_tokens": 1 })
    );
}

#[tokio::test]
async fn token_listing_never_shows_full_keys() {
    let admin = admin_app().await;
    admin.app.create_user("carol", Role::Customer).await;
    let (carol_key, _) = admin.app.login("carol").await;

    let response = admin.call("GET", "/api/admin/tokens?username=carol", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let raw = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(!raw.contains(&carol_key));

    let tokens: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let tokens = tokens.as_array().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0]["username"], "carol");
    assert_eq!(
        tokens[0]["masked_key"],
        format!("{}...", &carol_key[carol_key.len() - 8..])
    );
}

#[tokio::test]
async fn sweep_removes_expired_tokens() {
    let admin = admin_app().await;
    admin.app.create_user("carol", Role::Customer).await;
    let (carol_key, _) = admin.app.login("carol").await;

    let response = admin.call("POST", "/api/admin/tokens/sweep", Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let token = admin.app.state.store().find_token(&carol_key).await.unwrap().unwrap();
    let conn = &admin.app.state.store().conn;
    let mut active: auth_tokens::ActiveModel = auth_tokens::Entity::find_by_id(token.id)
        .one(conn)
        .await
        .unwrap()
        .unwrap()
        .into();
    active.expires_at = Set(Utc::now() - Duration::days(1));
    active.update(conn).await.unwrap();

    let response = admin
        .call("POST", "/api/admin/tokens/sweep", Some(json!({ "expired": true })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "expired_removed": 1, "idle_removed": 0 })
    );
    assert!(admin.app.state.store().find_token(&carol_key).await.unwrap().is_none());
    assert!(admin.app.state.store().find_token(&admin.key).await.unwrap().is_some());
}

#[tokio::test]
async fn inspection_reports_each_candidate_without_side_effects() {
    let admin = admin_app().await;
    admin.app.create_user("carol", Role::Customer).await;
    let (carol_key, _) = admin.app.login("carol").await;

    let response = admin
        .app
        .send(
            get(&format!("/api/auth/tokens/inspect?token={carol_key}"))
                .header(header::AUTHORIZATION, token_header(&admin.key))
                .header(header::COOKIE, "auth_token=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["resolved_user"], "ada");
    assert_eq!(body["resolved_via"], "header");

    let candidates = body["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 3);
    assert_eq!(candidates[0]["source"], "header");
    assert_eq!(candidates[0]["found_in"], "auth_tokens");
    assert_eq!(candidates[1]["source"], "cookie");
    assert!(candidates[1]["found_in"].is_null());
    assert_eq!(candidates[2]["source"], "param");
    assert_eq!(candidates[2]["username"], "carol");

    let carol_token = admin.app.state.store().find_token(&carol_key).await.unwrap().unwrap();
    assert!(carol_token.last_used.is_none());
}

#[tokio::test]
async fn metrics_endpoint_is_admin_only() {
    let admin = admin_app().await;

    let response = admin.call("GET", "/api/admin/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("Metrics not enabled"));

    let anonymous = admin
        .app
        .send(get("/api/admin/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
