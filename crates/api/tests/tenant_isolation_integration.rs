//! Integration tests for club isolation, suspension and maintenance windows.

mod common;

use axum::http::{header, Method, StatusCode};
use chrono::{Duration, Utc};
use common::{get, id_of, post, post_ok, send, setup, TestClub, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_members_are_invisible_across_clubs() {
    let ctx = setup().await;
    let club_a = TestClub::create(&ctx).await;
    let club_b = TestClub::create(&ctx).await;
    let member_a = club_a.member(&ctx).await;

    let (status, _) = get(
        &ctx.app,
        &format!("/api/members/{}", member_a),
        &club_a.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(
        &ctx.app,
        &format!("/api/members/{}", member_a),
        &club_b.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = get(&ctx.app, "/api/members", &club_b.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 0);
}

#[tokio::test]
async fn test_cannot_book_another_clubs_session() {
    let ctx = setup().await;
    let club_a = TestClub::create(&ctx).await;
    let club_b = TestClub::create(&ctx).await;
    let class_a = club_a.class(&ctx, 10, false).await;
    let session_a = club_a.session(&ctx, class_a, 2, 10).await;
    let member_b = club_b.member(&ctx).await;

    let (status, _) = post(
        &ctx.app,
        "/api/bookings",
        &club_b.admin_token,
        json!({ "sessionId": session_a, "memberId": member_b }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let ctx = setup().await;

    let (status, json) = send(&ctx.app, Method::GET, "/api/members", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_platform_admin_cannot_use_club_routes() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;

    let (status, _) = get(&ctx.app, "/api/members", &club.platform_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // And club admins cannot reach platform routes
    let (status, _) = get(&ctx.app, "/api/platform/tenants", &club.admin_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_suspended_club_is_locked_out() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (status, _) = get(&ctx.app, "/api/members", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);

    let suspended = post_ok(
        &ctx.app,
        &format!("/api/platform/tenants/{}/suspend", club.tenant_id),
        &club.platform_token,
        json!({}),
    )
    .await;
    assert_eq!(suspended["status"], "SUSPENDED");

    // Tokens issued before the suspension stop working
    let (status, _) = get(&ctx.app, "/api/members", &club.admin_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // New logins are refused as well
    let (status, _) = send(
        &ctx.app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({
            "tenantSlug": club.slug,
            "email": "nobody@example.com",
            "password": TEST_PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    post_ok(
        &ctx.app,
        &format!("/api/platform/tenants/{}/reactivate", club.tenant_id),
        &club.platform_token,
        json!({}),
    )
    .await;
    let (status, _) = get(&ctx.app, "/api/members", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_maintenance_window_blocks_only_its_club() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let other = TestClub::create(&ctx).await;
    let now = Utc::now();

    let window = post_ok(
        &ctx.app,
        "/api/platform/maintenance",
        &club.platform_token,
        json!({
            "tenantId": club.tenant_id,
            "title": "Database upgrade",
            "message": "Back in ten minutes",
            "startsAt": now - Duration::minutes(1),
            "endsAt": now + Duration::minutes(10),
        }),
    )
    .await;

    let (status, json) = get(&ctx.app, "/api/members", &club.admin_token).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["message"], "Back in ten minutes");

    let (status, current) = get(&ctx.app, "/api/maintenance/current", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["id"], window["id"]);

    let (status, _) = get(&ctx.app, "/api/members", &other.admin_token).await;
    assert_eq!(status, StatusCode::OK);

    post_ok(
        &ctx.app,
        &format!("/api/platform/maintenance/{}/cancel", id_of(&window)),
        &club.platform_token,
        json!({}),
    )
    .await;
    let (status, _) = get(&ctx.app, "/api/members", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let ctx = setup().await;

    let request = axum::http::Request::builder()
        .uri("/api/health/live")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get(header::CONTENT_TYPE).is_some());
}
