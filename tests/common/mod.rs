#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use sojourn::{
    config::PaymentConfig,
    domain::{
        Booking, CreateBookingRequest, CreateListingRequest, CreateUserRequest, Listing, User,
        UserRole,
    },
    error::{AppError, Result},
    notify::{BookingConfirmation, Notifier},
    payments::{
        InitiateRequest, InitiateResponse, PaymentGateway, ProviderStatus, VerifyResponse,
    },
    service::{PaymentService, ServiceContext},
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// A gateway that replays pre-scripted responses and records every call.
#[derive(Default)]
pub struct ScriptedGateway {
    initiate_responses: Mutex<VecDeque<Result<InitiateResponse>>>,
    verify_responses: Mutex<VecDeque<Result<VerifyResponse>>>,
    pub initiate_requests: Mutex<Vec<InitiateRequest>>,
    pub initiate_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_initiate(&self, response: Result<InitiateResponse>) {
        self.initiate_responses.lock().unwrap().push_back(response);
    }

    pub fn push_verify(&self, response: Result<VerifyResponse>) {
        self.verify_responses.lock().unwrap().push_back(response);
    }

    pub fn initiate_success(checkout_url: &str) -> InitiateResponse {
        InitiateResponse {
            status: ProviderStatus::Success,
            checkout_url: Some(checkout_url.to_string()),
            raw_body: format!(
                r#"{{"status":"success","data":{{"checkout_url":"{}"}}}}"#,
                checkout_url
            ),
        }
    }

    pub fn initiate_accepted_without_url() -> InitiateResponse {
        InitiateResponse {
            status: ProviderStatus::Success,
            checkout_url: None,
            raw_body: r#"{"status":"success","data":{}}"#.to_string(),
        }
    }

    pub fn initiate_declined() -> InitiateResponse {
        InitiateResponse {
            status: ProviderStatus::Failed,
            checkout_url: None,
            raw_body: r#"{"status":"failed"}"#.to_string(),
        }
    }

    pub fn verify_with(status: ProviderStatus) -> VerifyResponse {
        let label = match status {
            ProviderStatus::Success => "success",
            ProviderStatus::Pending => "pending",
            ProviderStatus::Failed => "failed",
            ProviderStatus::Cancelled => "cancelled",
            ProviderStatus::Unknown => "???",
        };
        VerifyResponse {
            status,
            provider_tx_id: Some(format!("prov-{}", label)),
            raw_body: format!(r#"{{"status":"{}"}}"#, label),
        }
    }

    pub fn initiate_call_count(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_call_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        self.initiate_requests.lock().unwrap().push(request.clone());
        self.initiate_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Transport("no scripted initiate response".to_string())))
    }

    async fn verify(&self, _merchant_reference: &str) -> Result<VerifyResponse> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Transport("no scripted verify response".to_string())))
    }
}

/// Captures every confirmation so tests can assert exactly-once delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub confirmations: Mutex<Vec<BookingConfirmation>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.confirmations.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn booking_confirmed(&self, confirmation: BookingConfirmation) {
        self.confirmations.lock().unwrap().push(confirmation);
    }
}

pub fn payment_config() -> PaymentConfig {
    PaymentConfig {
        enabled: true,
        api_key: "sk_test".to_string(),
        base_url: "http://provider.test/initialize".to_string(),
        verify_url: "http://provider.test/verify".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        ..Default::default()
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub payments: Arc<PaymentService>,
}

pub async fn test_app() -> TestApp {
    // A single connection: every pooled connection to :memory: would
    // otherwise get its own private database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let ctx = Arc::new(ServiceContext::new(pool.clone()));
    let gateway = Arc::new(ScriptedGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let payments = Arc::new(PaymentService::new(
        ctx.booking_service.clone(),
        ctx.payment_repo.clone(),
        ctx.user_repo.clone(),
        ctx.listing_repo.clone(),
        gateway.clone(),
        notifier.clone(),
        payment_config(),
        "http://localhost:8080",
    ));

    TestApp {
        pool,
        ctx,
        gateway,
        notifier,
        payments,
    }
}

pub fn date_in(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

pub async fn create_user(ctx: &ServiceContext, username: &str) -> User {
    ctx.user_repo
        .create(CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            role: UserRole::Regular,
        })
        .await
        .expect("create user")
}

pub async fn create_admin(ctx: &ServiceContext, username: &str) -> User {
    ctx.user_repo
        .create(CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            role: UserRole::Admin,
        })
        .await
        .expect("create admin")
}

pub async fn create_listing(ctx: &ServiceContext, host: &User, price: &str) -> Listing {
    ctx.listing_repo
        .create(CreateListingRequest {
            host_id: host.id,
            name: format!("{}'s place", host.username),
            description: "A lovely place to stay.".to_string(),
            price_per_night: price.parse::<Decimal>().expect("price"),
        })
        .await
        .expect("create listing")
}

pub async fn create_booking(
    ctx: &ServiceContext,
    customer: &User,
    listing: &Listing,
    start_in_days: i64,
    nights: i64,
) -> Booking {
    ctx.booking_service
        .create_booking(CreateBookingRequest {
            customer_id: customer.id,
            listing_id: listing.id,
            start_date: date_in(start_in_days),
            end_date: date_in(start_in_days + nights),
        })
        .await
        .expect("create booking")
}
