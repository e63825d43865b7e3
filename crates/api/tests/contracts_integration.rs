//! Integration tests for membership contract transitions.

mod common;

use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use common::{get, id_of, post, post_ok, setup, TestClub, TestContext};
use serde_json::{json, Value};

async fn contract(ctx: &TestContext, club: &TestClub, extra: Value) -> Value {
    let member_id = club.member(ctx).await;
    let plan_id = club.plan(ctx, None).await;
    let mut body = json!({
        "memberId": member_id,
        "planId": plan_id,
        "startDate": Utc::now().date_naive(),
        "commitmentMonths": 12,
        "monthlyFee": 29900,
        "terminationFeeType": "REMAINING_MONTHS",
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    post_ok(&ctx.app, "/api/contracts", &club.admin_token, body).await
}

fn action(contract: &Value, name: &str) -> String {
    format!("/api/contracts/{}/{}", id_of(contract), name)
}

#[tokio::test]
async fn test_sign_notice_and_withdraw() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let created = contract(&ctx, &club, json!({ "noticePeriodDays": 30 })).await;

    assert_eq!(created["status"], "PENDING_SIGNATURE");
    assert_eq!(
        created["contractNumber"],
        format!("CON-{}-00001", Utc::now().year())
    );
    assert!(created.get("commitmentEndDate").is_some());

    // Notice cannot be given before signing
    let (status, _) = post(
        &ctx.app,
        &action(&created, "request-cancellation"),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let signed = post_ok(&ctx.app, &action(&created, "sign"), &club.admin_token, json!({})).await;
    assert_eq!(signed["status"], "ACTIVE");
    assert!(signed.get("signedAt").is_some());

    let (status, _) = post(&ctx.app, &action(&created, "sign"), &club.admin_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let notice = post_ok(
        &ctx.app,
        &action(&created, "request-cancellation"),
        &club.admin_token,
        json!({ "reason": "Moving away" }),
    )
    .await;
    assert_eq!(notice["status"], "IN_NOTICE_PERIOD");
    assert_eq!(notice["cancellationReason"], "Moving away");
    let expected_end = Utc::now().date_naive() + chrono::Duration::days(30);
    assert_eq!(
        notice["cancellationEffectiveDate"],
        json!(expected_end)
    );

    let withdrawn = post_ok(
        &ctx.app,
        &action(&created, "withdraw-cancellation"),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(withdrawn["status"], "ACTIVE");
    assert!(withdrawn.get("cancellationEffectiveDate").is_none());
}

#[tokio::test]
async fn test_notice_then_complete_cancellation() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let created = contract(&ctx, &club, json!({})).await;
    post_ok(&ctx.app, &action(&created, "sign"), &club.admin_token, json!({})).await;

    // Only contracts under notice can be completed
    let (status, _) = post(
        &ctx.app,
        &action(&created, "complete-cancellation"),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    post_ok(
        &ctx.app,
        &action(&created, "request-cancellation"),
        &club.admin_token,
        json!({}),
    )
    .await;
    let cancelled = post_ok(
        &ctx.app,
        &action(&created, "complete-cancellation"),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(cancelled["status"], "CANCELLED");
    assert!(cancelled.get("effectiveEndDate").is_some());

    let (status, _) = post(&ctx.app, &action(&created, "suspend"), &club.admin_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_suspend_and_reactivate() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let created = contract(&ctx, &club, json!({})).await;

    // Unsigned contracts cannot be suspended
    let (status, _) = post(&ctx.app, &action(&created, "suspend"), &club.admin_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    post_ok(&ctx.app, &action(&created, "sign"), &club.admin_token, json!({})).await;
    let suspended = post_ok(&ctx.app, &action(&created, "suspend"), &club.admin_token, json!({})).await;
    assert_eq!(suspended["status"], "SUSPENDED");

    let reactivated = post_ok(
        &ctx.app,
        &action(&created, "reactivate"),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(reactivated["status"], "ACTIVE");

    let (status, _) = post(
        &ctx.app,
        &action(&created, "reactivate"),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cooling_off_void_is_free() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let created = contract(&ctx, &club, json!({ "coolingOffDays": 14 })).await;
    post_ok(&ctx.app, &action(&created, "sign"), &club.admin_token, json!({})).await;

    let (status, quote) = get(&ctx.app, &action(&created, "termination-quote"), &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["withinCoolingOff"], true);
    assert_eq!(quote["withinCommitment"], true);
    assert!(quote["monthsRemaining"].as_i64().unwrap_or_default() >= 11);
    assert_eq!(quote["fee"], 0);

    let voided = post_ok(
        &ctx.app,
        &action(&created, "void"),
        &club.admin_token,
        json!({ "reason": "Changed my mind" }),
    )
    .await;
    assert_eq!(voided["status"], "VOIDED");

    let (_, fetched) = get(
        &ctx.app,
        &format!("/api/contracts/{}", id_of(&created)),
        &club.admin_token,
    )
    .await;
    assert_eq!(fetched["status"], "VOIDED");
}

#[tokio::test]
async fn test_contract_for_unknown_member_is_not_found() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let plan_id = club.plan(&ctx, None).await;

    let (status, _) = post(
        &ctx.app,
        "/api/contracts",
        &club.admin_token,
        json!({
            "memberId": uuid::Uuid::new_v4(),
            "planId": plan_id,
            "startDate": Utc::now().date_naive(),
            "commitmentMonths": 6,
            "monthlyFee": 10000,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
