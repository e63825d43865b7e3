//! Integration tests for forecast models, generation and recorded actuals.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{get, id_of, post, post_ok, setup, TestClub, TestContext};
use serde_json::{json, Value};
use uuid::Uuid;

async fn model(ctx: &TestContext, club: &TestClub, model_type: &str, hyperparameters: Value) -> Uuid {
    let model = post_ok(
        &ctx.app,
        "/api/forecasting/models",
        &club.admin_token,
        json!({
            "modelType": model_type,
            "algorithm": "MOVING_AVERAGE",
            "hyperparameters": hyperparameters,
        }),
    )
    .await;
    assert_eq!(model["isActive"], false);
    id_of(&model)
}

async fn activate(ctx: &TestContext, club: &TestClub, model_id: Uuid) -> Value {
    post_ok(
        &ctx.app,
        &format!("/api/forecasting/models/{}/activate", model_id),
        &club.admin_token,
        json!({}),
    )
    .await
}

#[tokio::test]
async fn test_one_active_model_per_type() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let first = model(&ctx, &club, "REVENUE", json!({})).await;
    let second = model(&ctx, &club, "REVENUE", json!({ "window": 6 })).await;
    let attendance = model(&ctx, &club, "ATTENDANCE", json!({})).await;

    activate(&ctx, &club, first).await;
    activate(&ctx, &club, attendance).await;
    let activated = activate(&ctx, &club, second).await;
    assert_eq!(activated["isActive"], true);

    let (status, first) = get(
        &ctx.app,
        &format!("/api/forecasting/models/{}", first),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["isActive"], false);

    let (status, active) = get(&ctx.app, "/api/forecasting/models/active", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = active
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&second.to_string().as_str()));
    assert!(ids.contains(&attendance.to_string().as_str()));

    let (status, page) = get(&ctx.app, "/api/forecasting/models?size=2", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 3);
    assert_eq!(page["content"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_hyperparameters_are_rejected() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;

    let (status, _) = post(
        &ctx.app,
        "/api/forecasting/models",
        &club.admin_token,
        json!({
            "modelType": "REVENUE",
            "algorithm": "LINEAR_TREND",
            "hyperparameters": { "window": 0 },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_requires_active_model() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    model(&ctx, &club, "REVENUE", json!({})).await;
    let tomorrow = (Utc::now() + Duration::days(1)).date_naive();

    let (status, _) = post(
        &ctx.app,
        "/api/forecasting/generate",
        &club.admin_token,
        json!({
            "forecastType": "REVENUE",
            "startDate": tomorrow,
            "endDate": tomorrow + Duration::days(6),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_revenue_forecasts_for_the_coming_days() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let model_id = model(&ctx, &club, "REVENUE", json!({})).await;
    activate(&ctx, &club, model_id).await;
    let tomorrow = (Utc::now() + Duration::days(1)).date_naive();

    let forecasts = post_ok(
        &ctx.app,
        "/api/forecasting/generate",
        &club.admin_token,
        json!({
            "forecastType": "REVENUE",
            "startDate": tomorrow,
            "endDate": tomorrow + Duration::days(6),
            "granularity": "DAILY",
        }),
    )
    .await;
    let forecasts = forecasts.as_array().unwrap();
    assert_eq!(forecasts.len(), 7);
    // New club, no paid invoices yet
    assert!(forecasts.iter().all(|f| f["predictedValue"] == 0.0));
    assert!(forecasts.iter().all(|f| f["modelId"] == model_id.to_string()));

    let (status, upcoming) = get(&ctx.app, "/api/forecasting/revenue?days=10", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(upcoming.as_array().unwrap().len(), 7);

    let (status, membership) = get(&ctx.app, "/api/forecasting/membership", &club.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(membership.as_array().unwrap().is_empty());

    let (status, _) = get(&ctx.app, "/api/forecasting/revenue?days=0", &club.admin_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_attendance_history_feeds_the_projection_and_actuals_track_variance() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let location_id = club.location(&ctx).await;
    let plan_id = club.plan(&ctx, None).await;
    for _ in 0..3 {
        let member_id = club.member(&ctx).await;
        club.subscribe(&ctx, member_id, plan_id).await;
        post_ok(
            &ctx.app,
            "/api/attendance/check-in",
            &club.admin_token,
            json!({ "memberId": member_id, "locationId": location_id }),
        )
        .await;
    }

    let model_id = model(&ctx, &club, "ATTENDANCE", json!({ "window": 3 })).await;
    activate(&ctx, &club, model_id).await;
    let today = Utc::now().date_naive();
    let tomorrow = today + Duration::days(1);

    // Three check-ins today, none the two days before
    let ahead = post_ok(
        &ctx.app,
        "/api/forecasting/generate",
        &club.admin_token,
        json!({ "forecastType": "ATTENDANCE", "startDate": tomorrow, "endDate": tomorrow }),
    )
    .await;
    let ahead = &ahead[0];
    assert_eq!(ahead["predictedValue"], 1.0);
    assert_eq!(ahead["lowerBound"], 0.0);

    let (status, _) = post(
        &ctx.app,
        &format!("/api/forecasting/forecasts/{}/actual", id_of(ahead)),
        &club.admin_token,
        json!({ "actualValue": 4 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let current = post_ok(
        &ctx.app,
        "/api/forecasting/generate",
        &club.admin_token,
        json!({ "forecastType": "ATTENDANCE", "startDate": today, "endDate": today }),
    )
    .await;
    let current_id = id_of(&current[0]);
    let predicted = current[0]["predictedValue"].as_f64().unwrap();
    assert_eq!(predicted, 0.0);

    let recorded = post_ok(
        &ctx.app,
        &format!("/api/forecasting/forecasts/{}/actual", current_id),
        &club.admin_token,
        json!({ "actualValue": 3 }),
    )
    .await;
    assert_eq!(recorded["actualValue"], 3.0);
    assert_eq!(recorded["variance"], 3.0);
    assert!(recorded["variancePercentage"].is_null());

    let (_, model) = get(
        &ctx.app,
        &format!("/api/forecasting/models/{}", model_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(model["accuracyRmse"], 3.0);

    // Regenerating keeps the recorded actual
    let again = post_ok(
        &ctx.app,
        "/api/forecasting/generate",
        &club.admin_token,
        json!({ "forecastType": "ATTENDANCE", "startDate": today, "endDate": today }),
    )
    .await;
    assert_eq!(id_of(&again[0]), current_id);
    assert_eq!(again[0]["actualValue"], 3.0);

    let (status, listed) = get(
        &ctx.app,
        &format!(
            "/api/forecasting/forecasts?forecastType=ATTENDANCE&from={}&to={}",
            today, tomorrow
        ),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_staff_can_read_but_not_manage_forecasts() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (_, staff_token) = club.user(&ctx, "STAFF").await;

    let (status, _) = get(&ctx.app, "/api/forecasting/models", &staff_token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &ctx.app,
        "/api/forecasting/models",
        &staff_token,
        json!({ "modelType": "REVENUE", "algorithm": "MOVING_AVERAGE" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
