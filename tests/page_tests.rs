mod common;

use axum::{body::Body, http::StatusCode};
use common::*;
use helpdesk::entities::users::Role;

async fn visit(app: &TestApp, uri: &str, auth: Option<(&str, String)>) -> axum::http::Response<Body> {
    let mut request = get(uri);
    if let Some((name, value)) = auth {
        request = request.header(name, value);
    }
    app.send(request.body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn anonymous_home_is_the_landing_page() {
    let app = spawn_app().await;

    let response = visit(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-frame-options").unwrap(),
        "DENY"
    );
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body = body_json(response).await;
    assert_eq!(body["login_url"], "/accounts/login/");
}

#[tokio::test]
async fn anonymous_panel_visit_round_trips_through_login() {
    let app = spawn_app().await;

    let response = visit(&app, "/accounts/admin-panel/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?redirect=admin-panel");

    let response = visit(&app, "/?redirect=admin-panel", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/accounts/login/?next=admin-panel");
}

#[tokio::test]
async fn customer_is_redirected_away_from_admin_panel() {
    let app = spawn_app().await;
    app.create_user("carol", Role::Customer).await;
    let (key, cookies) = app.login("carol").await;
    let session = cookie(&cookies, "sessionid").unwrap().to_string();

    let by_token = visit(
        &app,
        "/accounts/admin-panel/",
        Some(("authorization", token_header(&key))),
    )
    .await;
    assert_eq!(by_token.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&by_token), "/accounts/customer-panel/");
    assert!(body_bytes(by_token).await.is_empty());

    let by_session = visit(
        &app,
        "/accounts/admin-panel/",
        Some(("cookie", format!("sessionid={session}"))),
    )
    .await;
    assert_eq!(by_session.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&by_session), "/accounts/customer-panel/");

    let by_param = visit(&app, &format!("/accounts/support-panel/?token={key}"), None).await;
    assert_eq!(by_param.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&by_param), "/accounts/customer-panel/");
}

#[tokio::test]
async fn support_sees_support_panel_but_not_admin_panel() {
    let app = spawn_app().await;
    app.create_user("sam", Role::Support).await;
    let (key, _) = app.login("sam").await;
    let auth = || Some(("authorization", token_header(&key)));

    let response = visit(&app, "/accounts/admin-panel/", auth()).await;
    assert_eq!(location(&response), "/accounts/support-panel/");

    let response = visit(&app, "/accounts/support-panel/", auth()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["panel"], "support");
    assert_eq!(body["user"]["username"], "sam");
    assert!(body.get("counts").is_none());

    let response = visit(&app, "/accounts/customer-panel/", auth()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_panel_reports_role_counts() {
    let app = spawn_app().await;
    app.create_user("ada", Role::Admin).await;
    app.create_user("sam", Role::Support).await;
    app.create_user("carol", Role::Customer).await;
    app.create_user("cody", Role::Customer).await;
    let (key, _) = app.login("ada").await;

    let response = visit(
        &app,
        "/accounts/admin-panel/",
        Some(("authorization", token_header(&key))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["panel"], "admin");
    assert_eq!(body["counts"]["admin"], 1);
    assert_eq!(body["counts"]["support"], 1);
    assert_eq!(body["counts"]["customer"], 2);
}

#[tokio::test]
async fn home_routes_signed_in_users_by_role_and_preference() {
    let app = spawn_app().await;
    app.create_user("ada", Role::Admin).await;
    app.create_user("carol", Role::Customer).await;
    let (admin_key, _) = app.login("ada").await;
    let (customer_key, _) = app.login("carol").await;

    let admin = || Some(("authorization", token_header(&admin_key)));
    let customer = || Some(("authorization", token_header(&customer_key)));

    let response = visit(&app, "/", admin()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/accounts/admin-panel/");

    let response = visit(&app, "/?redirect=support-panel", admin()).await;
    assert_eq!(location(&response), "/accounts/support-panel/");

    let response = visit(&app, "/?redirect=admin-panel", customer()).await;
    assert_eq!(location(&response), "/accounts/customer-panel/");

    let response = visit(&app, "/?redirect=https://evil.example", customer()).await;
    assert_eq!(location(&response), "/accounts/customer-panel/");
}

#[tokio::test]
async fn superuser_is_always_an_admin() {
    let app = spawn_app().await;
    let root = app.create_user("root", Role::Customer).await;
    app.state
        .store()
        .update_user_access(
            root.id,
            helpdesk::db::AccessUpdate {
                is_superuser: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (key, _) = app.login("root").await;

    let response = visit(
        &app,
        "/accounts/admin-panel/",
        Some(("authorization", token_header(&key))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["role"], "admin");
}
