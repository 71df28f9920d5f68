use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::error::{AppError, Result};

/// Everything a confirmation message needs. Built at the moment a booking
/// actually transitions to Confirmed, never for a replayed event.
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub recipient: String,
    pub booking_id: Uuid,
    pub listing_name: String,
    pub start_date: NaiveDate,
}

/// Fire-and-forget confirmation delivery. Implementations must never let a
/// delivery failure propagate into booking or payment state; log and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn booking_confirmed(&self, confirmation: BookingConfirmation);
}

/// Sends the confirmation over SMTP. The actual send runs on a spawned task
/// so the caller returns immediately.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from = config
            .from_address
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Internal(format!("Failed to build SMTP transport: {}", e)))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn booking_confirmed(&self, confirmation: BookingConfirmation) {
        let to: Mailbox = match confirmation.recipient.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!(
                    booking_id = %confirmation.booking_id,
                    "Skipping confirmation email, unparseable recipient: {}",
                    e
                );
                return;
            }
        };

        let body = format!(
            "Your booking {} for {} starting {} has been confirmed.",
            confirmation.booking_id, confirmation.listing_name, confirmation.start_date
        );

        let message = match Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Booking Confirmation")
            .body(body)
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    booking_id = %confirmation.booking_id,
                    "Failed to build confirmation email: {}",
                    e
                );
                return;
            }
        };

        let transport = self.transport.clone();
        let booking_id = confirmation.booking_id;
        tokio::spawn(async move {
            if let Err(e) = transport.send(message).await {
                tracing::warn!(%booking_id, "Failed to send confirmation email: {}", e);
            } else {
                tracing::info!(%booking_id, "Confirmation email sent");
            }
        });
    }
}

/// Used when SMTP is not configured: the confirmation is only logged.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn booking_confirmed(&self, confirmation: BookingConfirmation) {
        tracing::info!(
            booking_id = %confirmation.booking_id,
            recipient = %confirmation.recipient,
            listing = %confirmation.listing_name,
            start_date = %confirmation.start_date,
            "Booking confirmed"
        );
    }
}
