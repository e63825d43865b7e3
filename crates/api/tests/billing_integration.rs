//! Integration tests for invoices, payments and dunning recovery.

mod common;

use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use common::{get, id_of, post, post_ok, setup, TestClub, TestContext};
use serde_json::{json, Value};

async fn draft_invoice(ctx: &TestContext, club: &TestClub) -> Value {
    let member_id = club.member(ctx).await;
    post_ok(
        &ctx.app,
        "/api/invoices",
        &club.admin_token,
        json!({
            "memberId": member_id,
            "lineItems": [
                { "description": "Monthly membership", "quantity": 1, "unitPrice": 10000 },
                { "description": "Towel service", "quantity": 2, "unitPrice": 1250 },
            ],
        }),
    )
    .await
}

#[tokio::test]
async fn test_invoice_totals_and_numbering() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;

    let first = draft_invoice(&ctx, &club).await;
    let second = draft_invoice(&ctx, &club).await;

    assert_eq!(first["status"], "DRAFT");
    assert_eq!(first["subtotal"], 12500);
    assert_eq!(first["vatRateBps"], 1500);
    // 15% of 12500 = 1875
    assert_eq!(first["taxAmount"], 1875);
    assert_eq!(first["total"], 14375);
    assert_eq!(first["currency"], "SAR");

    let year = Utc::now().year();
    assert_eq!(first["invoiceNumber"], format!("INV-{}-00001", year));
    assert_eq!(second["invoiceNumber"], format!("INV-{}-00002", year));
}

#[tokio::test]
async fn test_partial_then_full_payment() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let invoice = draft_invoice(&ctx, &club).await;
    let id = id_of(&invoice);

    // Drafts cannot take payments
    let (status, _) = post(
        &ctx.app,
        &format!("/api/invoices/{}/payments", id),
        &club.admin_token,
        json!({ "amount": 100 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let issued = post_ok(
        &ctx.app,
        &format!("/api/invoices/{}/issue", id),
        &club.admin_token,
        json!({}),
    )
    .await;
    assert_eq!(issued["status"], "ISSUED");

    let partial = post_ok(
        &ctx.app,
        &format!("/api/invoices/{}/payments", id),
        &club.admin_token,
        json!({ "amount": 4375, "paymentMethod": "CARD" }),
    )
    .await;
    assert_eq!(partial["status"], "PARTIALLY_PAID");
    assert_eq!(partial["paidAmount"], 4375);

    // Overpayment is refused
    let (status, _) = post(
        &ctx.app,
        &format!("/api/invoices/{}/payments", id),
        &club.admin_token,
        json!({ "amount": 20000 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let paid = post_ok(
        &ctx.app,
        &format!("/api/invoices/{}/payments", id),
        &club.admin_token,
        json!({ "amount": 10000, "paymentMethod": "CARD" }),
    )
    .await;
    assert_eq!(paid["status"], "PAID");
    assert_eq!(paid["paidAmount"], 14375);
}

#[tokio::test]
async fn test_dunning_recovers_when_invoice_is_paid() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let invoice = draft_invoice(&ctx, &club).await;
    let invoice_id = id_of(&invoice);

    // Only unpaid, issued invoices can be chased
    let (status, _) = post(
        &ctx.app,
        "/api/dunning",
        &club.admin_token,
        json!({ "invoiceId": invoice_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    post_ok(
        &ctx.app,
        &format!("/api/invoices/{}/issue", invoice_id),
        &club.admin_token,
        json!({}),
    )
    .await;

    let sequence = post_ok(
        &ctx.app,
        "/api/dunning",
        &club.admin_token,
        json!({ "invoiceId": invoice_id, "failureReason": "Card declined" }),
    )
    .await;
    assert_eq!(sequence["status"], "ACTIVE");
    assert_eq!(sequence["amount"], 14375);

    let (status, _) = post(
        &ctx.app,
        "/api/dunning",
        &club.admin_token,
        json!({ "invoiceId": invoice_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    post_ok(
        &ctx.app,
        &format!("/api/invoices/{}/payments", invoice_id),
        &club.admin_token,
        json!({ "amount": 14375 }),
    )
    .await;

    let (status, sequence) = get(
        &ctx.app,
        &format!("/api/dunning/{}", id_of(&sequence)),
        &club.admin_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sequence["status"], "RECOVERED");
}

#[tokio::test]
async fn test_trainer_cannot_see_invoices() {
    let ctx = setup().await;
    let club = TestClub::create(&ctx).await;
    let (_, trainer_token) = club.user(&ctx, "TRAINER").await;

    let (status, _) = get(&ctx.app, "/api/invoices", &trainer_token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
