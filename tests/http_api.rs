mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use common::{harness, settle};
use doorman::store::CredentialStore;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn get(app: &Router, uri: &str) -> Response<Body> {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn get_bearer(app: &Router, uri: &str, token: &str) -> Response<Body> {
    let req = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn body_bytes(res: Response<Body>) -> Vec<u8> {
    to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(res: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

async fn register(app: &Router, username: &str, email: &str, password: &str) -> Response<Body> {
    post_json(
        app,
        "/api/v1/auth/register",
        json!({ "username": username, "email": email, "password": password }),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> Response<Body> {
    post_json(
        app,
        "/api/v1/auth/login",
        json!({ "username": username, "password": password }),
    )
    .await
}

#[tokio::test]
async fn register_returns_the_public_record() {
    let h = harness();
    let app = h.app();

    let res = register(&app, "alice", "  Alice@Example.COM  ", "password-1").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = body_json(res).await;

    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["is_active"], true);
    assert_eq!(body["is_verified_email"], false);
    assert!(body["id"].is_i64());
    assert!(body.get("hashed_password").is_none());
    assert!(body.get("email_verification_token").is_none());
    assert!(body.get("password_reset_token").is_none());

    settle().await;
    let sent = h.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert!(sent[0].subject.contains("Verify Your Email Address"));
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = harness();
    let app = h.app();

    assert_eq!(
        register(&app, "alice", "alice@example.com", "password-1")
            .await
            .status(),
        StatusCode::CREATED
    );

    let res = register(&app, "alice", "other@example.com", "password-1").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(res).await["detail"],
        "Username already registered"
    );

    let res = register(&app, "bob", "alice@example.com", "password-1").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["detail"], "Email already registered");
}

#[tokio::test]
async fn register_rejects_malformed_input() {
    let h = harness();
    let app = h.app();

    let res = register(&app, "ab", "alice@example.com", "password-1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["detail"],
        "Username must be 3 to 32 characters"
    );

    let res = register(&app, "alice", "not-an-email", "password-1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "Invalid email");

    let res = register(&app, "alice", "alice@example.com", "short").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "Password too short");
}

#[tokio::test]
async fn login_and_me_roundtrip() {
    let h = harness();
    let app = h.app();
    register(&app, "alice", "alice@example.com", "password-1").await;

    let res = login(&app, "alice", "password-1").await;
    assert_eq!(res.status(), StatusCode::OK);
    let pair = body_json(res).await;
    assert_eq!(pair["token_type"], "bearer");
    let access = pair["access_token"].as_str().unwrap().to_string();
    let refresh = pair["refresh_token"].as_str().unwrap().to_string();

    let res = get_bearer(&app, "/api/v1/auth/me", &access).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["username"], "alice");

    // A refresh token cannot stand in for an access token.
    let res = get_bearer(&app, "/api/v1/auth/me", &refresh).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_without_credentials_is_unauthorized() {
    let h = harness();
    let app = h.app();

    let res = get(&app, "/api/v1/auth/me").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
    assert_eq!(
        body_json(res).await["detail"],
        "Could not validate credentials"
    );
}

#[tokio::test]
async fn login_failures_do_not_identify_the_account() {
    let h = harness();
    let app = h.app();
    register(&app, "alice", "alice@example.com", "password-1").await;

    let unknown = login(&app, "nobody", "password-1").await;
    let wrong = login(&app, "alice", "wrong-password").await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        wrong
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
    assert_eq!(body_bytes(unknown).await, body_bytes(wrong).await);
}

#[tokio::test]
async fn login_for_deactivated_account_is_rejected() {
    let h = harness();
    let app = h.app();
    register(&app, "carol", "carol@example.com", "password-1").await;

    let mut user = h
        .store
        .find_by_username("carol")
        .await
        .unwrap()
        .unwrap();
    user.is_active = false;
    h.store.update(&user).await.unwrap();

    let res = login(&app, "carol", "password-1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "Inactive user");
}

#[tokio::test]
async fn refresh_rotates_tokens_over_http() {
    let h = harness();
    let app = h.app();
    register(&app, "alice", "alice@example.com", "password-1").await;

    let pair = body_json(login(&app, "alice", "password-1").await).await;
    let access = pair["access_token"].as_str().unwrap().to_string();
    let refresh = pair["refresh_token"].as_str().unwrap().to_string();

    let res = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": refresh }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let rotated = body_json(res).await;
    let res = get_bearer(
        &app,
        "/api/v1/auth/me",
        rotated["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    // An access token cannot drive the refresh flow.
    let res = post_json(
        &app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": access }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_endpoints_do_not_reveal_registration() {
    let h = harness();
    let app = h.app();
    register(&app, "alice", "alice@example.com", "password-1").await;

    for uri in [
        "/api/v1/auth/request-password-reset",
        "/api/v1/auth/request-email-verification",
    ] {
        let known = post_json(&app, uri, json!({ "email": "alice@example.com" })).await;
        let unknown = post_json(&app, uri, json!({ "email": "nobody@example.com" })).await;
        assert_eq!(known.status(), StatusCode::OK);
        assert_eq!(unknown.status(), StatusCode::OK);
        assert_eq!(body_bytes(known).await, body_bytes(unknown).await);
    }
}

#[tokio::test]
async fn verify_email_over_http_is_single_use() {
    let h = harness();
    let app = h.app();
    register(&app, "alice", "alice@example.com", "password-1").await;

    let token = h
        .store
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap()
        .email_verification_token
        .unwrap();

    let res = get(&app, &format!("/api/v1/auth/verify-email/{token}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await["message"],
        "Email verified successfully."
    );

    let res = get(&app, &format!("/api/v1/auth/verify-email/{token}")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["detail"],
        "Email verification token is invalid or has expired."
    );
}

#[tokio::test]
async fn reset_password_over_http() {
    let h = harness();
    let app = h.app();
    register(&app, "alice", "alice@example.com", "password-1").await;
    post_json(
        &app,
        "/api/v1/auth/request-password-reset",
        json!({ "email": "alice@example.com" }),
    )
    .await;

    let token = h
        .store
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap()
        .password_reset_token
        .unwrap();

    // Rejected before the token is consumed.
    let res = post_json(
        &app,
        "/api/v1/auth/reset-password",
        json!({ "token": token, "new_password": "short" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "Password too short");

    let res = post_json(
        &app,
        "/api/v1/auth/reset-password",
        json!({ "token": token, "new_password": "password-2" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await["message"],
        "Password has been reset successfully."
    );

    assert_eq!(
        login(&app, "alice", "password-1").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&app, "alice", "password-2").await.status(),
        StatusCode::OK
    );

    let res = post_json(
        &app,
        "/api/v1/auth/reset-password",
        json!({ "token": token, "new_password": "password-3" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["detail"],
        "Password reset token is invalid or has expired."
    );
}

#[tokio::test]
async fn health_endpoint_answers() {
    let h = harness();
    let app = h.app();

    let res = get(&app, "/api/v1/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, b"ok");
}
