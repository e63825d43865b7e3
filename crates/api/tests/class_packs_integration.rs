//! Integration tests for class packs and member credit balances.

mod common;

use axum::http::{Method, StatusCode};
use common::{get, id_of, post, post_ok, send, setup, TestClub, TestContext};
use serde_json::{json, Value};

async fn pack(ctx: &TestContext, club: &TestClub, class_count: i32) -> Value {
    post_ok(
        &ctx.app,
        "/api/class-packs",
        &club.admin_token,
        json!({
            "name": format!("{} class pack", class_count),
            "classCount": class_count,
            "price": 45000,
            "validityDays": 90,
        }),
    )
    .await
}

#[tokio::test]
async fn test_inactive_pack_cannot_be_granted() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let member_id = club.member(&ctx).await;
    let created = pack(&ctx, &club, 5).await;
    let pack_id = id_of(&created);
    assert_eq!(created["isActive"], true);

    let deactivated = post_ok(
        &ctx.app,
        &format!("/api/class-packs/{}/deactivate", pack_id),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(deactivated["isActive"], false);

    // Deactivating twice is a state conflict
    let (status, _) = post(
        &ctx.app,
        &format!("/api/class-packs/{}/deactivate", pack_id),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let grant = json!({ "memberId": member_id, "classPackId": pack_id });
    let (status, _) = post(
        &ctx.app,
        "/api/class-packs/balances",
        &club.admin_token,
        grant.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, active_only) = get(
        &ctx.app,
        "/api/class-packs?activeOnly=true",
        &club.admin_token,
    )
    .await;
    assert_eq!(active_only.as_array().map(Vec::len), Some(0));

    post_ok(
        &ctx.app,
        &format!("/api/class-packs/{}/activate", pack_id),
        &club.admin_token,
        json!({}),
    )
    .await;
    let (status, balance) = post(&ctx.app, "/api/class-packs/balances", &club.admin_token, grant).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(balance["classesRemaining"], 5);
    assert_eq!(balance["status"], "ACTIVE");
    assert!(balance.get("expiresAt").is_some());
}

#[tokio::test]
async fn test_credits_deplete_and_refund() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let member_id = club.member(&ctx).await;
    let pack_id = id_of(&pack(&ctx, &club, 2).await);

    let balance = post_ok(
        &ctx.app,
        "/api/class-packs/balances",
        &club.admin_token,
        json!({ "memberId": member_id, "classPackId": pack_id }),
    )
    .await;
    let use_uri = format!("/api/class-packs/balances/{}/use", id_of(&balance));

    let once = post_ok(&ctx.app, &use_uri, &club.admin_token, json!({})).await;
    assert_eq!(once["classesRemaining"], 1);
    assert_eq!(once["status"], "ACTIVE");

    let twice = post_ok(&ctx.app, &use_uri, &club.admin_token, json!({})).await;
    assert_eq!(twice["classesRemaining"], 0);
    assert_eq!(twice["status"], "DEPLETED");

    let (status, _) = post(&ctx.app, &use_uri, &club.admin_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, credits) = get(
        &ctx.app,
        &format!("/api/members/{}/class-packs/credits", member_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(credits["remainingCredits"], 0);

    let refunded = post_ok(
        &ctx.app,
        &format!("/api/class-packs/balances/{}/refund", id_of(&balance)),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(refunded["classesRemaining"], 1);
    assert_eq!(refunded["status"], "ACTIVE");

    let (_, credits) = get(
        &ctx.app,
        &format!("/api/members/{}/class-packs/credits", member_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(credits["remainingCredits"], 1);
}

#[tokio::test]
async fn test_pack_with_credits_cannot_be_deleted() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let member_id = club.member(&ctx).await;
    let pack_id = id_of(&pack(&ctx, &club, 3).await);
    let uri = format!("/api/class-packs/{}", pack_id);

    // Active packs must be deactivated first
    let (status, _) = send(&ctx.app, Method::DELETE, &uri, Some(&club.admin_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let balance = post_ok(
        &ctx.app,
        "/api/class-packs/balances",
        &club.admin_token,
        json!({ "memberId": member_id, "classPackId": pack_id }),
    )
    .await;
    post_ok(
        &ctx.app,
        &format!("/api/class-packs/{}/deactivate", pack_id),
        &club.admin_token,
        json!({}),
    )
    .await;

    let (status, _) = send(&ctx.app, Method::DELETE, &uri, Some(&club.admin_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let cancelled = post_ok(
        &ctx.app,
        &format!("/api/class-packs/balances/{}/cancel", id_of(&balance)),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, _) = send(&ctx.app, Method::DELETE, &uri, Some(&club.admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&ctx.app, &uri, &club.admin_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
