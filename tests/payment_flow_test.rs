mod common;

use common::{create_booking, create_listing, create_user, test_app, ScriptedGateway};
use sojourn::domain::{BookingStatus, PaymentStatus};
use sojourn::error::AppError;
use sojourn::payments::{ProviderStatus, WebhookPayload};
use sojourn::service::{InitiateOutcome, WebhookOutcome};

fn payload(tx_ref: &str, event: &str) -> WebhookPayload {
    serde_json::from_value(serde_json::json!({ "tx_ref": tx_ref, "reference": event })).unwrap()
}

#[tokio::test]
async fn initiate_creates_one_processing_payment() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));

    let outcome = app
        .payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    match outcome {
        InitiateOutcome::Initiated { checkout_url } => {
            assert_eq!(checkout_url, "https://pay/x")
        }
        other => panic!("expected Initiated, got {:?}", other),
    }

    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .expect("payment exists");
    assert_eq!(payment.status, PaymentStatus::Processing);
    assert_eq!(payment.amount_minor, 30_000);
    assert!(payment.merchant_reference.starts_with("bk-"));
    assert!(payment.request_payload.is_some());
    assert!(payment.response_payload.is_some());

    // The provider saw major units as a decimal string.
    let requests = app.gateway.initiate_requests.lock().unwrap();
    assert_eq!(requests[0].amount, "300.00");
    assert_eq!(
        requests[0].callback_url,
        "http://localhost:8080/api/payments/webhook"
    );
}

#[tokio::test]
async fn repeat_initiate_reuses_checkout_url_without_calling_provider() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));

    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    let second = app
        .payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();

    assert!(
        matches!(second, InitiateOutcome::Initiated { checkout_url } if checkout_url == "https://pay/x")
    );
    assert_eq!(app.gateway.initiate_call_count(), 1);
}

#[tokio::test]
async fn concurrent_initiates_create_exactly_one_payment() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    // Both racers may reach the provider before either inserts; script two
    // accepts. The UNIQUE(booking_id) backstop lets only one row in and the
    // loser converges on it.
    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/y")));

    let (a, b) = tokio::join!(
        app.payments.initiate_payment(booking.id, guest.id),
        app.payments.initiate_payment(booking.id, guest.id),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE booking_id = ?")
        .bind(booking.id.to_string())
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn provider_decline_persists_no_payment() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_declined()));

    let result = app.payments.initiate_payment(booking.id, guest.id).await;
    assert!(matches!(result, Err(AppError::GatewayRejected)));

    assert!(app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn initiate_on_confirmed_booking_is_rejected() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.ctx
        .booking_service
        .confirm_booking(booking.id)
        .await
        .unwrap();

    let result = app.payments.initiate_payment(booking.id, guest.id).await;
    assert!(matches!(result, Err(AppError::BookingNotPending)));
    assert_eq!(app.gateway.initiate_call_count(), 0);
}

#[tokio::test]
async fn stranger_may_not_initiate_someone_elses_booking() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let stranger = create_user(&app.ctx, "stranger").await;
    let admin = common::create_admin(&app.ctx, "admin").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    let result = app.payments.initiate_payment(booking.id, stranger.id).await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    // Admins may act for anyone.
    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    assert!(app
        .payments
        .initiate_payment(booking.id, admin.id)
        .await
        .is_ok());
}

#[tokio::test]
async fn full_flow_from_initiation_to_confirmed_booking() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "250.50").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 4).await;

    // 250.50 x 4 nights = 1002.00 -> 100200 minor units.
    assert_eq!(booking.total_price_minor, 100_200);

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();

    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);

    app.gateway
        .push_verify(Ok(ScriptedGateway::verify_with(ProviderStatus::Success)));
    let outcome = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Confirmed);

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.provider_event_id.as_deref(), Some("evt-1"));
    assert!(payment.provider_tx_id.is_some());

    let booking = app
        .ctx
        .booking_service
        .find_booking(booking.id)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    assert_eq!(app.notifier.count(), 1);
    let confirmations = app.notifier.confirmations.lock().unwrap();
    assert_eq!(confirmations[0].recipient, "guest@example.com");
    assert_eq!(confirmations[0].listing_name, listing.name);
}

#[tokio::test]
async fn duplicate_webhook_confirms_once_and_notifies_once() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .unwrap();

    app.gateway
        .push_verify(Ok(ScriptedGateway::verify_with(ProviderStatus::Success)));

    let first = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Confirmed);

    // Replay with an identical body: short-circuits before verify.
    let second = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await
        .unwrap();
    assert_eq!(second, WebhookOutcome::AlreadyProcessed);

    assert_eq!(app.gateway.verify_call_count(), 1);
    assert_eq!(app.notifier.count(), 1);
}

#[tokio::test]
async fn webhook_for_unknown_reference_is_acknowledged_and_ignored() {
    let app = test_app().await;

    let outcome = app
        .payments
        .process_webhook(payload("bk-never-issued", "evt-9"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert_eq!(app.gateway.verify_call_count(), 0);
}

#[tokio::test]
async fn failed_verification_kills_the_payment() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .unwrap();

    app.gateway
        .push_verify(Ok(ScriptedGateway::verify_with(ProviderStatus::Failed)));
    let outcome = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::MarkedDead);

    // A dead payment is terminal for initiation; the provider is not
    // re-called under the same reference.
    let result = app.payments.initiate_payment(booking.id, guest.id).await;
    assert!(matches!(result, Err(AppError::PaymentDead)));
    assert_eq!(app.gateway.initiate_call_count(), 1);

    let booking = app
        .ctx
        .booking_service
        .find_booking(booking.id)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn pending_verification_leaves_payment_open() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .unwrap();

    app.gateway
        .push_verify(Ok(ScriptedGateway::verify_with(ProviderStatus::Pending)));
    let outcome = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::StillPending);

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);
}

#[tokio::test]
async fn verification_transport_error_is_surfaced_for_retry() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .unwrap();

    app.gateway
        .push_verify(Err(AppError::Transport("provider down".to_string())));
    let result = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await;
    assert!(matches!(result, Err(AppError::Transport(_))));

    // Untouched; the provider's webhook retry is safe.
    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);
}

#[tokio::test]
async fn missing_checkout_url_is_retried_under_same_reference() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    // Accepted but no URL: the payment is persisted, the call fails.
    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_accepted_without_url()));
    let first = app.payments.initiate_payment(booking.id, guest.id).await;
    assert!(matches!(first, Err(AppError::Transport(_))));

    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .expect("payment persisted despite missing URL");
    assert!(payment.checkout_url.is_none());

    // The retry re-invokes the provider with the same merchant reference.
    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/retry")));
    let second = app
        .payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    assert!(
        matches!(second, InitiateOutcome::Initiated { checkout_url } if checkout_url == "https://pay/retry")
    );

    let requests = app.gateway.initiate_requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tx_ref, requests[1].tx_ref);
    assert_eq!(requests[1].tx_ref, payment.merchant_reference);

    let updated = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.checkout_url.as_deref(), Some("https://pay/retry"));
}

#[tokio::test]
async fn initiate_after_settled_payment_confirms_idempotently() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let guest = create_user(&app.ctx, "guest").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;
    let booking = create_booking(&app.ctx, &guest, &listing, 3, 3).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/x")));
    app.payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(booking.id)
        .await
        .unwrap()
        .unwrap();

    // The webhook settled the payment but confirmation never ran (e.g. the
    // process died in between). The client's re-poll completes the flow.
    app.ctx
        .payment_repo
        .mark_succeeded(payment.id, "evt-1", None)
        .await
        .unwrap()
        .expect("payment settles");

    let outcome = app
        .payments
        .initiate_payment(booking.id, guest.id)
        .await
        .unwrap();
    assert!(matches!(outcome, InitiateOutcome::BookingConfirmed));

    let booking = app
        .ctx
        .booking_service
        .find_booking(booking.id)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(app.notifier.count(), 1);
}

#[tokio::test]
async fn settled_payment_with_lost_slot_is_flagged_for_refund() {
    let app = test_app().await;
    let host = create_user(&app.ctx, "host").await;
    let alice = create_user(&app.ctx, "alice").await;
    let bob = create_user(&app.ctx, "bob").await;
    let listing = create_listing(&app.ctx, &host, "100.00").await;

    let alices = create_booking(&app.ctx, &alice, &listing, 3, 4).await;
    let bobs = create_booking(&app.ctx, &bob, &listing, 4, 4).await;

    app.gateway
        .push_initiate(Ok(ScriptedGateway::initiate_success("https://pay/a")));
    app.payments
        .initiate_payment(alices.id, alice.id)
        .await
        .unwrap();
    let payment = app
        .ctx
        .payment_repo
        .find_by_booking(alices.id)
        .await
        .unwrap()
        .unwrap();

    // Bob's overlapping booking confirms while Alice is off paying.
    app.ctx
        .booking_service
        .confirm_booking(bobs.id)
        .await
        .unwrap();

    app.gateway
        .push_verify(Ok(ScriptedGateway::verify_with(ProviderStatus::Success)));
    let outcome = app
        .payments
        .process_webhook(payload(&payment.merchant_reference, "evt-1"))
        .await
        .unwrap();

    // Money was taken but the slot is gone: payment stands, booking does
    // not confirm, nobody is congratulated.
    assert_eq!(outcome, WebhookOutcome::ConfirmedWithoutBooking);

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);

    let alices = app
        .ctx
        .booking_service
        .find_booking(alices.id)
        .await
        .unwrap();
    assert_eq!(alices.status, BookingStatus::Pending);
    assert_eq!(app.notifier.count(), 0);
}
