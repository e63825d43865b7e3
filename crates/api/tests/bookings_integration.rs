//! Integration tests for class bookings, the waitlist and booking check-in.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{get, id_of, post, post_ok, setup, TestClub, TestContext};
use serde_json::Value;
use uuid::Uuid;
use serde_json::json;

#[tokio::test]
async fn test_full_session_waitlists_then_promotes_on_cancel() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let class_id = club.class(&ctx, 1, true).await;
    let session_id = club.session(&ctx, class_id, 2, 9).await;
    let first = club.member(&ctx).await;
    let second = club.member(&ctx).await;

    let confirmed = post_ok(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": first }),
    )
    .await;
    assert_eq!(confirmed["status"], "CONFIRMED");

    let waitlisted = post_ok(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": second }),
    )
    .await;
    assert_eq!(waitlisted["status"], "WAITLISTED");
    assert_eq!(waitlisted["waitlistPosition"], 1);

    let (status, session) = get(
        &ctx.app,
        &format!("/api/sessions/{}", session_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["bookedCount"], 1);
    assert_eq!(session["waitlistCount"], 1);

    let cancelled = post_ok(
        &ctx.app,
        &format!("/api/bookings/{}/cancel", id_of(&confirmed)),
        &club.admin_token,
        json!({ "reason": "Injured" }),
    )
    .await;
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, promoted) = get(
        &ctx.app,
        &format!("/api/bookings/{}", id_of(&waitlisted)),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["status"], "CONFIRMED");
    assert!(promoted.get("waitlistPosition").is_none());
}

#[tokio::test]
async fn test_duplicate_booking_is_rejected() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let class_id = club.class(&ctx, 10, false).await;
    let session_id = club.session(&ctx, class_id, 3, 18).await;
    let member_id = club.member(&ctx).await;
    let body = json!({ "sessionId": session_id, "memberId": member_id });

    post_ok(&ctx.app, "/api/bookings", &club.admin_token, body.clone()).await;
    let (status, json) = post(&ctx.app, "/api/bookings", &club.admin_token, body).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn test_full_session_without_waitlist_is_rejected() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let class_id = club.class(&ctx, 1, false).await;
    let session_id = club.session(&ctx, class_id, 4, 7).await;
    let first = club.member(&ctx).await;
    let second = club.member(&ctx).await;

    post_ok(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": first }),
    )
    .await;
    let (status, _) = post(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": second }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pending_member_cannot_book() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let class_id = club.class(&ctx, 10, false).await;
    let session_id = club.session(&ctx, class_id, 2, 12).await;
    let member_id = club.member_with(&ctx, false).await;

    let (status, _) = post(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": member_id }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_check_in_deducts_class_from_limited_plan() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (_, trainer_token) = club.user(&ctx, "TRAINER").await;
    let member_id = club.member(&ctx).await;
    let plan_id = club.plan(&ctx, Some(8)).await;
    let subscription = club.subscribe(&ctx, member_id, plan_id).await;
    assert_eq!(subscription["classesRemaining"], 8);

    let class_id = club.class(&ctx, 10, false).await;
    let session_id = club.session(&ctx, class_id, 1, 6).await;
    let booking = post_ok(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": member_id }),
    )
    .await;

    let checked_in = post_ok(
        &ctx.app,
        &format!("/api/bookings/{}/check-in", id_of(&booking)),
        &trainer_token,
        json!({}),
    )
    .await;
    assert_eq!(checked_in["status"], "CHECKED_IN");
    assert_eq!(checked_in["classDeducted"], true);

    let (_, subscription) = get(
        &ctx.app,
        &format!("/api/subscriptions/{}", id_of(&subscription)),
        &club.admin_token,
    )
    .await;
    assert_eq!(subscription["classesRemaining"], 7);

    // A second check-in of the same booking is a state conflict
    let (status, _) = post(
        &ctx.app,
        &format!("/api/bookings/{}/check-in", id_of(&booking)),
        &trainer_token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_trainer_cannot_create_classes() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (_, trainer_token) = club.user(&ctx, "TRAINER").await;

    let (status, _) = post(
        &ctx.app,
        "/api/classes",
        &trainer_token,
        json!({ "name": "Yoga" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

async fn book(ctx: &TestContext, club: &TestClub, session_id: Uuid, member_id: Uuid) -> Value {
    post_ok(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": session_id, "memberId": member_id }),
    )
    .await
}

#[tokio::test]
async fn test_cancelling_waitlisted_booking_renumbers_the_queue() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let class_id = club.class(&ctx, 1, true).await;
    let session_id = club.session(&ctx, class_id, 3, 18).await;

    let seated = book(&ctx, &club, session_id, club.member(&ctx).await).await;
    let mut queue = Vec::new();
    for _ in 0..3 {
        let booking = book(&ctx, &club, session_id, club.member(&ctx).await).await;
        assert_eq!(booking["status"], "WAITLISTED");
        queue.push(id_of(&booking));
    }

    let cancelled = post_ok(
        &ctx.app,
        &format!("/api/bookings/{}/cancel", queue[0]),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, session) = get(
        &ctx.app,
        &format!("/api/sessions/{}", session_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["bookedCount"], 1);
    assert_eq!(session["waitlistCount"], 2);

    for (booking_id, expected) in queue[1..].iter().zip(1i64..) {
        let (status, booking) = get(
            &ctx.app,
            &format!("/api/bookings/{}", booking_id),
            &club.admin_token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booking["status"], "WAITLISTED");
        assert_eq!(booking["waitlistPosition"], expected);
    }

    let (_, seated) = get(
        &ctx.app,
        &format!("/api/bookings/{}", id_of(&seated)),
        &club.admin_token,
    )
    .await;
    assert_eq!(seated["status"], "CONFIRMED");
}

#[tokio::test]
async fn test_trainer_cannot_be_double_booked() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (trainer_id, _) = club.user(&ctx, "TRAINER").await;
    let class_id = club.class(&ctx, 10, false).await;
    let date = (Utc::now() + Duration::days(4)).date_naive();

    let session = |start: &str| {
        json!({
            "classId": class_id,
            "sessionDate": date,
            "startTime": start,
            "trainerId": trainer_id,
        })
    };

    post_ok(&ctx.app, "/api/sessions", &club.admin_token, session("10:00:00")).await;

    let (status, _) = post(&ctx.app, "/api/sessions", &club.admin_token, session("10:30:00")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let later = post_ok(&ctx.app, "/api/sessions", &club.admin_token, session("10:45:00")).await;
    assert_eq!(later["trainerId"], trainer_id.to_string());
}

#[tokio::test]
async fn test_member_cannot_hold_overlapping_bookings() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let member_id = club.member(&ctx).await;
    let spin = club.class(&ctx, 10, false).await;
    let yoga = club.class(&ctx, 10, false).await;

    let morning_spin = club.session(&ctx, spin, 5, 9).await;
    let morning_yoga = club.session(&ctx, yoga, 5, 9).await;
    let evening_yoga = club.session(&ctx, yoga, 5, 19).await;

    book(&ctx, &club, morning_spin, member_id).await;

    let (status, _) = post(
        &ctx.app,
        "/api/bookings",
        &club.admin_token,
        json!({ "sessionId": morning_yoga, "memberId": member_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let evening = book(&ctx, &club, evening_yoga, member_id).await;
    assert_eq!(evening["status"], "CONFIRMED");
}
