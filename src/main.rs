use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sojourn::{
    api,
    config::Settings,
    notify::{LogNotifier, Notifier, SmtpNotifier},
    payments::HttpPaymentGateway,
    service::{PaymentService, ServiceContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sojourn=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Sojourn server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Repositories and the booking ledger
    let service_context = Arc::new(ServiceContext::new(db_pool.clone()));

    // Notifier: SMTP when configured, otherwise log-only
    let notifier: Arc<dyn Notifier> = if settings.email.enabled {
        match SmtpNotifier::new(&settings.email) {
            Ok(smtp) => {
                tracing::info!("Email notifications enabled via {}", settings.email.smtp_host);
                Arc::new(smtp)
            }
            Err(e) => {
                tracing::warn!("Email enabled but SMTP setup failed: {}. Logging only.", e);
                Arc::new(LogNotifier)
            }
        }
    } else {
        Arc::new(LogNotifier)
    };

    // Payment coordinator, only when the provider is configured
    let payment_service = if settings.payment.enabled {
        let gateway = Arc::new(HttpPaymentGateway::new(settings.payment.clone())?);
        tracing::info!("Payment processing enabled");
        Some(Arc::new(PaymentService::new(
            service_context.booking_service.clone(),
            service_context.payment_repo.clone(),
            service_context.user_repo.clone(),
            service_context.listing_repo.clone(),
            gateway,
            notifier,
            settings.payment.clone(),
            &settings.server.base_url,
        )))
    } else {
        tracing::info!("Payment processing disabled");
        None
    };

    let app = api::create_app(service_context, payment_service, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
