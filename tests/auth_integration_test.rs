mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn health_endpoint_is_public() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn protected_routes_reject_missing_and_garbage_tokens() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/pos/products", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/pos/products", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_login_round_trip() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/users/register",
            Some(json!({
                "email": "lucia@optica.test",
                "username": "lucia",
                "full_name": "Lucia Fernandez",
                "password": "a-solid-password",
                "role": "optometrist",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered = read_json(response).await;
    assert_eq!(registered["username"], "lucia");
    assert_eq!(registered["role"], "optometrist");
    assert_eq!(registered["is_admin"], false);
    assert!(registered.get("hashed_password").is_none());

    let response = app
        .request(
            Method::POST,
            "/api/users/token",
            Some(json!({ "username": "lucia", "password": "a-solid-password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let login = read_json(response).await;
    assert_eq!(login["token_type"], "bearer");
    assert_eq!(login["user"]["username"], "lucia");

    let token = login["access_token"].as_str().unwrap();
    let response = app
        .request(Method::GET, "/api/users/me", None, Some(token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = read_json(response).await;
    assert_eq!(me["username"], "lucia");
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let app = TestApp::new().await;
    app.register_and_login("carlos").await;

    let response = app
        .request(
            Method::POST,
            "/api/users/token",
            Some(json!({ "username": "carlos", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = TestApp::new().await;
    app.register_and_login("maria").await;

    let response = app
        .request(
            Method::POST,
            "/api/users/register",
            Some(json!({
                "email": "other@optica.test",
                "username": "maria",
                "full_name": "Other Maria",
                "password": "another-password",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_update_and_deactivation() {
    let app = TestApp::new().await;
    let (_, token) = app.register_and_login("nadia").await;

    let response = app
        .request(
            Method::PUT,
            "/api/users/me",
            Some(json!({ "full_name": "Nadia Updated" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["full_name"], "Nadia Updated");

    let response = app
        .request(Method::DELETE, "/api/users/me", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // A deactivated account can no longer log in.
    let response = app
        .request(
            Method::POST,
            "/api/users/token",
            Some(json!({ "username": "nadia", "password": "cashier-password-123" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_the_admin_flag() {
    let app = TestApp::new().await;
    let (user_id, token) = app.register_and_login("pedro").await;

    // Cashier cannot list users.
    let response = app
        .request(Method::GET, "/api/users", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin can, and sees both accounts.
    let response = app
        .request_authenticated(Method::GET, "/api/users", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = read_json(response).await;
    assert_eq!(listing["total"], 2);

    // Admin promotes the cashier.
    let response = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/users/admin/{}/toggle", user_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let promoted = read_json(response).await;
    assert_eq!(promoted["is_admin"], true);
}

#[tokio::test]
async fn admins_cannot_toggle_their_own_flag() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/users/admin/{}/toggle", app.admin_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
