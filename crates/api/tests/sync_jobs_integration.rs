//! Integration tests for equipment sync jobs.

mod common;

use axum::http::{Method, StatusCode};
use common::{get, id_of, post, post_ok, send, setup, TestClub, TestContext};
use serde_json::json;
use uuid::Uuid;

async fn provider_config(ctx: &TestContext, club: &TestClub) -> Uuid {
    let (status, providers) = send(
        &ctx.app,
        Method::GET,
        "/api/equipment/providers",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let provider_id = providers[0]["id"].as_str().expect("Missing provider id");

    let config = post_ok(
        &ctx.app,
        "/api/equipment/configs",
        &club.admin_token,
        json!({ "providerId": provider_id, "apiKey": "key-123" }),
    )
    .await;
    id_of(&config)
}

async fn running_job(ctx: &TestContext, club: &TestClub, config_id: Uuid) -> Uuid {
    let job = post_ok(
        &ctx.app,
        &format!("/api/equipment/configs/{}/sync-jobs", config_id),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(job["status"], "RUNNING");
    id_of(&job)
}

#[tokio::test]
async fn test_completing_a_job_records_the_sync_on_its_config() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let config_id = provider_config(&ctx, &club).await;
    let job_id = running_job(&ctx, &club, config_id).await;

    let job = post_ok(
        &ctx.app,
        &format!("/api/equipment/sync-jobs/{}/complete", job_id),
        &club.admin_token,
        json!({ "recordsProcessed": 12 }),
    )
    .await;
    assert_eq!(job["status"], "COMPLETED");
    assert_eq!(job["recordsProcessed"], 12);

    let (status, config) = get(
        &ctx.app,
        &format!("/api/equipment/configs/{}", config_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!config["lastSyncAt"].is_null());

    let (status, _) = post(
        &ctx.app,
        &format!("/api/equipment/sync-jobs/{}/fail", job_id),
        &club.admin_token,
        json!({ "errorMessage": "late failure" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_concurrent_finishes_settle_a_job_once() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let config_id = provider_config(&ctx, &club).await;
    let job_id = running_job(&ctx, &club, config_id).await;

    let complete_uri = format!("/api/equipment/sync-jobs/{}/complete", job_id);
    let fail_uri = format!("/api/equipment/sync-jobs/{}/fail", job_id);
    let (completed, failed) = tokio::join!(
        post(
            &ctx.app,
            &complete_uri,
            &club.admin_token,
            json!({ "recordsProcessed": 3 }),
        ),
        post(
            &ctx.app,
            &fail_uri,
            &club.admin_token,
            json!({ "errorMessage": "provider timeout" }),
        ),
    );

    let statuses = [completed.0, failed.0];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "statuses: {:?}",
        statuses
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CONFLICT)
            .count(),
        1,
        "statuses: {:?}",
        statuses
    );

    let (status, job) = get(
        &ctx.app,
        &format!("/api/equipment/sync-jobs/{}", job_id),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let settled = if completed.0 == StatusCode::OK {
        "COMPLETED"
    } else {
        "FAILED"
    };
    assert_eq!(job["status"], settled);
}
