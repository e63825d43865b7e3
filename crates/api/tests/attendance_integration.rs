//! Integration tests for front-desk check-in and check-out.

mod common;

use axum::http::StatusCode;
use common::{get, post, post_ok, setup, TestClub};
use serde_json::json;

#[tokio::test]
async fn test_check_in_and_out() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (_, staff_token) = club.user(&ctx, "STAFF").await;
    let location_id = club.location(&ctx).await;
    let member_id = club.member(&ctx).await;
    let plan_id = club.plan(&ctx, None).await;
    club.subscribe(&ctx, member_id, plan_id).await;

    let visit = post_ok(
        &ctx.app,
        "/api/attendance/check-in",
        &staff_token,
        json!({ "memberId": member_id, "locationId": location_id }),
    )
    .await;
    assert_eq!(visit["checkInMethod"], "MANUAL");
    assert!(visit.get("checkOutTime").is_none());

    let (status, current) = get(
        &ctx.app,
        &format!("/api/members/{}/attendance/current", member_id),
        &staff_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["id"], visit["id"]);

    // Already inside
    let (status, _) = post(
        &ctx.app,
        "/api/attendance/check-in",
        &staff_token,
        json!({ "memberId": member_id, "locationId": location_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, closed) = post(
        &ctx.app,
        "/api/attendance/check-out",
        &staff_token,
        json!({ "memberId": member_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(closed.get("checkOutTime").is_some());

    let (status, _) = post(
        &ctx.app,
        "/api/attendance/check-out",
        &staff_token,
        json!({ "memberId": member_id }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_check_in_requires_active_subscription() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let location_id = club.location(&ctx).await;
    let member_id = club.member(&ctx).await;

    let (status, json) = post(
        &ctx.app,
        "/api/attendance/check-in",
        &club.admin_token,
        json!({ "memberId": member_id, "locationId": location_id }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["message"]
        .as_str()
        .unwrap_or_default()
        .contains("no active subscription"));
}

#[tokio::test]
async fn test_check_in_uses_a_class_on_limited_plans() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let location_id = club.location(&ctx).await;
    let member_id = club.member(&ctx).await;
    let plan_id = club.plan(&ctx, Some(1)).await;
    let subscription = club.subscribe(&ctx, member_id, plan_id).await;
    let body = json!({ "memberId": member_id, "locationId": location_id });

    post_ok(&ctx.app, "/api/attendance/check-in", &club.admin_token, body.clone()).await;
    post_ok(
        &ctx.app,
        "/api/attendance/check-out",
        &club.admin_token,
        json!({ "memberId": member_id }),
    )
    .await;

    let (_, subscription) = get(
        &ctx.app,
        &format!("/api/subscriptions/{}", subscription["id"].as_str().unwrap()),
        &club.admin_token,
    )
    .await;
    assert_eq!(subscription["classesRemaining"], 0);

    let (status, _) = post(&ctx.app, "/api/attendance/check-in", &club.admin_token, body).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_trainer_cannot_use_front_desk() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (_, trainer_token) = club.user(&ctx, "TRAINER").await;
    let location_id = club.location(&ctx).await;
    let member_id = club.member(&ctx).await;

    let (status, _) = post(
        &ctx.app,
        "/api/attendance/check-in",
        &trainer_token,
        json!({ "memberId": member_id, "locationId": location_id }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
