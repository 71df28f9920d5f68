use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    config::PaymentConfig,
    domain::{
        permitted, Action, Booking, BookingStatus, ConfirmOutcome, Payment, PaymentStatus,
        ResourceRef,
    },
    error::{AppError, Result},
    notify::{BookingConfirmation, Notifier},
    payments::{InitiateRequest, PaymentGateway, ProviderStatus, WebhookPayload},
    repository::{ListingRepository, PaymentRepository, UserRepository},
    service::booking_service::BookingService,
};

/// What `initiate_payment` tells the caller on success.
#[derive(Debug, Clone)]
pub enum InitiateOutcome {
    /// The payer must be redirected to the provider-hosted checkout page.
    Initiated { checkout_url: String },
    /// The payment had already settled; the booking is (now) confirmed.
    BookingConfirmed,
}

/// What a verified webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// We never issued this merchant reference; acknowledged so the provider
    /// stops retrying.
    Ignored,
    /// The payment had already settled; nothing to do.
    AlreadyProcessed,
    /// Verified success, booking confirmed (or it already was).
    Confirmed,
    /// Verified success but the booking slot was taken by an overlapping
    /// confirmed booking. The payment stands; manual refund required.
    ConfirmedWithoutBooking,
    /// The provider reported a terminal failure; the payment is dead.
    MarkedDead,
    /// The provider still reports the charge as pending; no transition.
    StillPending,
}

/// The payment coordinator: ties a booking to at most one payment, decides
/// whether to create, reuse, or report a charge attempt, and drives the
/// webhook verification path. All state transitions go through conditional
/// writes so concurrent requests converge instead of double-charging.
pub struct PaymentService {
    booking_service: Arc<BookingService>,
    payment_repo: Arc<dyn PaymentRepository>,
    user_repo: Arc<dyn UserRepository>,
    listing_repo: Arc<dyn ListingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: PaymentConfig,
    /// Absolute URL the provider posts webhook events to.
    callback_url: String,
}

impl PaymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        booking_service: Arc<BookingService>,
        payment_repo: Arc<dyn PaymentRepository>,
        user_repo: Arc<dyn UserRepository>,
        listing_repo: Arc<dyn ListingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: PaymentConfig,
        server_base_url: &str,
    ) -> Self {
        let callback_url = format!(
            "{}/api/payments/webhook",
            server_base_url.trim_end_matches('/')
        );

        Self {
            booking_service,
            payment_repo,
            user_repo,
            listing_repo,
            gateway,
            notifier,
            config,
            callback_url,
        }
    }

    /// The coordinator state machine. Requires a pending booking owned by the
    /// requester (admins may act for anyone). Exactly one payment ever exists
    /// per booking; a lost insert race converges on the winner's record.
    pub async fn initiate_payment(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
    ) -> Result<InitiateOutcome> {
        let booking = self.booking_service.find_booking(booking_id).await?;

        let requester = self
            .user_repo
            .find_by_id(requester_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Requester not found".to_string()))?;
        if !permitted(&requester, ResourceRef::Booking(&booking), Action::Update) {
            return Err(AppError::Forbidden);
        }

        if booking.status != BookingStatus::Pending {
            return Err(AppError::BookingNotPending);
        }

        match self.payment_repo.find_by_booking(booking.id).await? {
            None => self.initiate_fresh(&booking).await,
            Some(payment) => self.resume_existing(&booking, payment).await,
        }
    }

    /// No payment exists yet: call the provider first, persist only if it
    /// accepted. An in-band decline leaves no orphaned record behind.
    async fn initiate_fresh(&self, booking: &Booking) -> Result<InitiateOutcome> {
        let customer = self
            .user_repo
            .find_by_id(booking.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

        let merchant_reference = generate_merchant_reference();
        let request = self.build_initiate_request(booking, &customer.email, &merchant_reference);

        tracing::info!(
            booking_id = %booking.id,
            tx_ref = %merchant_reference,
            amount_minor = booking.total_price_minor,
            "Initiating payment"
        );

        let response = self.gateway.initiate(&request).await?;

        if response.status != ProviderStatus::Success && response.status != ProviderStatus::Pending
        {
            tracing::warn!(
                booking_id = %booking.id,
                tx_ref = %merchant_reference,
                status = ?response.status,
                "Provider rejected payment initiation"
            );
            return Err(AppError::GatewayRejected);
        }

        let now = chrono::Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            status: PaymentStatus::Processing,
            amount_minor: booking.total_price_minor,
            currency: self.config.currency.clone(),
            merchant_reference,
            provider_tx_id: None,
            checkout_url: response.checkout_url.clone(),
            provider_event_id: None,
            request_payload: serde_json::to_string(&request).ok(),
            response_payload: Some(response.raw_body.clone()),
            created_at: now,
            updated_at: now,
        };

        let payment = match self.payment_repo.create(payment).await {
            Ok(payment) => payment,
            // Lost the insert race: a concurrent initiation already created
            // the payment for this booking. Converge on the winner's record.
            Err(AppError::Conflict(_)) => {
                let winner = self
                    .payment_repo
                    .find_by_booking(booking.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database("Payment vanished after conflict".to_string())
                    })?;
                return self.resume_existing(booking, winner).await;
            }
            Err(e) => return Err(e),
        };

        match payment.checkout_url {
            Some(checkout_url) => Ok(InitiateOutcome::Initiated { checkout_url }),
            // Accepted but no URL in the body: the charge attempt exists at
            // the provider under this reference, so the record stays. A retry
            // re-invokes the provider with the same reference.
            None => Err(AppError::Transport(
                "Provider accepted the charge but returned no checkout URL".to_string(),
            )),
        }
    }

    /// A payment already exists for this booking; where we go depends on
    /// its status.
    async fn resume_existing(
        &self,
        booking: &Booking,
        payment: Payment,
    ) -> Result<InitiateOutcome> {
        match payment.status {
            // A webhook settled this while the client wasn't looking.
            // Confirm idempotently and tell the caller it's done.
            PaymentStatus::Success => {
                self.confirm_and_notify(booking.id).await?;
                Ok(InitiateOutcome::BookingConfirmed)
            }
            PaymentStatus::Pending | PaymentStatus::Processing => match payment.checkout_url {
                // Never re-call the provider for a reference that already has
                // a live checkout page: that risks a duplicate charge.
                Some(checkout_url) => Ok(InitiateOutcome::Initiated { checkout_url }),
                None => self.reinitiate(booking, &payment).await,
            },
            PaymentStatus::Cancelled | PaymentStatus::Failed | PaymentStatus::Refunded => {
                Err(AppError::PaymentDead)
            }
        }
    }

    /// A previous initiation got a provider accept but no checkout URL.
    /// Re-invoke under the same merchant reference and update in place.
    async fn reinitiate(&self, booking: &Booking, payment: &Payment) -> Result<InitiateOutcome> {
        let customer = self
            .user_repo
            .find_by_id(booking.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

        let request =
            self.build_initiate_request(booking, &customer.email, &payment.merchant_reference);

        tracing::info!(
            booking_id = %booking.id,
            tx_ref = %payment.merchant_reference,
            "Re-initiating payment without checkout URL"
        );

        let response = self.gateway.initiate(&request).await?;

        if response.status != ProviderStatus::Success && response.status != ProviderStatus::Pending
        {
            // The reference is burned at the provider; the payment is dead
            // and the caller must start over with a fresh booking.
            self.payment_repo
                .mark_dead(payment.id, PaymentStatus::Failed)
                .await?;
            return Err(AppError::PaymentDead);
        }

        let request_payload = serde_json::to_string(&request).unwrap_or_default();
        let updated = self
            .payment_repo
            .update_checkout(
                payment.id,
                response.checkout_url.as_deref(),
                &request_payload,
                &response.raw_body,
            )
            .await?;

        match updated.checkout_url {
            Some(checkout_url) => Ok(InitiateOutcome::Initiated { checkout_url }),
            None => Err(AppError::Transport(
                "Provider accepted the charge but returned no checkout URL".to_string(),
            )),
        }
    }

    /// The verification path, driven by a signature-checked, parsed webhook
    /// delivery. The body's own status claim is never trusted: settlement
    /// requires a direct verify call against the provider.
    pub async fn process_webhook(&self, payload: WebhookPayload) -> Result<WebhookOutcome> {
        let payment = match self
            .payment_repo
            .find_by_merchant_reference(&payload.tx_ref)
            .await?
        {
            Some(payment) => payment,
            None => {
                tracing::info!(tx_ref = %payload.tx_ref, "Webhook for unknown reference, ignoring");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        // Replays and duplicate deliveries stop here, before any provider
        // round-trip or notification can happen twice.
        if matches!(
            payment.status,
            PaymentStatus::Success | PaymentStatus::Refunded
        ) {
            tracing::debug!(tx_ref = %payload.tx_ref, "Webhook replay for settled payment");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let verification = self.gateway.verify(&payload.tx_ref).await?;

        match verification.status {
            ProviderStatus::Success => {
                let updated = self
                    .payment_repo
                    .mark_succeeded(
                        payment.id,
                        &payload.reference,
                        verification.provider_tx_id.as_deref(),
                    )
                    .await?;

                match updated {
                    Some(payment) => {
                        tracing::info!(
                            tx_ref = %payment.merchant_reference,
                            booking_id = %payment.booking_id,
                            "Payment verified successful"
                        );
                        self.settle_booking(payment.booking_id).await
                    }
                    // A concurrent delivery won the conditional update, or
                    // the payment was already terminal. Either way the state
                    // converged without us.
                    None => {
                        let current =
                            self.payment_repo.find_by_id(payment.id).await?.ok_or_else(|| {
                                AppError::Database("Payment vanished during webhook".to_string())
                            })?;
                        if current.status == PaymentStatus::Success {
                            Ok(WebhookOutcome::AlreadyProcessed)
                        } else {
                            Err(AppError::InvariantViolation(format!(
                                "Provider verified {} as successful but payment is {:?}",
                                payment.merchant_reference, current.status
                            )))
                        }
                    }
                }
            }
            ProviderStatus::Failed => {
                self.payment_repo
                    .mark_dead(payment.id, PaymentStatus::Failed)
                    .await?;
                tracing::info!(tx_ref = %payload.tx_ref, "Payment verified failed");
                Ok(WebhookOutcome::MarkedDead)
            }
            ProviderStatus::Cancelled => {
                self.payment_repo
                    .mark_dead(payment.id, PaymentStatus::Cancelled)
                    .await?;
                tracing::info!(tx_ref = %payload.tx_ref, "Payment verified cancelled");
                Ok(WebhookOutcome::MarkedDead)
            }
            // Not settled yet, or a status we don't recognize. Acknowledge
            // without transitioning; the provider will send another event.
            ProviderStatus::Pending | ProviderStatus::Unknown => {
                tracing::debug!(
                    tx_ref = %payload.tx_ref,
                    status = ?verification.status,
                    "Verification not conclusive, leaving payment open"
                );
                Ok(WebhookOutcome::StillPending)
            }
        }
    }

    /// Confirms the booking after a verified settlement. An overlap loss here
    /// means money was taken for a slot we can no longer honor: an ops alert,
    /// not a rollback.
    async fn settle_booking(&self, booking_id: Uuid) -> Result<WebhookOutcome> {
        match self.confirm_and_notify(booking_id).await {
            Ok(()) => Ok(WebhookOutcome::Confirmed),
            Err(AppError::Overlap) => {
                tracing::error!(
                    %booking_id,
                    "ALERT: payment succeeded but booking overlaps a confirmed booking; manual refund required"
                );
                Ok(WebhookOutcome::ConfirmedWithoutBooking)
            }
            Err(e) => Err(e),
        }
    }

    /// Confirms through the ledger and fires the notifier only when this call
    /// performed the Pending -> Confirmed transition.
    async fn confirm_and_notify(&self, booking_id: Uuid) -> Result<()> {
        let outcome = self.booking_service.confirm_booking(booking_id).await?;

        if let ConfirmOutcome::Confirmed(booking) = outcome {
            let customer = self.user_repo.find_by_id(booking.customer_id).await?;
            let listing = self.listing_repo.find_by_id(booking.listing_id).await?;

            if let (Some(customer), Some(listing)) = (customer, listing) {
                self.notifier
                    .booking_confirmed(BookingConfirmation {
                        recipient: customer.email,
                        booking_id: booking.id,
                        listing_name: listing.name,
                        start_date: booking.start_date,
                    })
                    .await;
            }
        }

        Ok(())
    }

    fn build_initiate_request(
        &self,
        booking: &Booking,
        email: &str,
        merchant_reference: &str,
    ) -> InitiateRequest {
        InitiateRequest {
            // Major units as a 2-dp decimal string, e.g. 30000 -> "300.00".
            amount: Decimal::new(booking.total_price_minor, 2).to_string(),
            currency: self.config.currency.clone(),
            email: email.to_string(),
            tx_ref: merchant_reference.to_string(),
            callback_url: self.callback_url.clone(),
        }
    }
}

/// 128 random bits, hex, `bk-` prefixed. Generated once per payment and
/// never reused.
fn generate_merchant_reference() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("bk-{}", hex::encode(bytes))
}
