use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    booking_id: String,
    status: String,
    amount_minor: i64,
    currency: String,
    merchant_reference: String,
    provider_tx_id: Option<String>,
    checkout_url: Option<String>,
    provider_event_id: Option<String>,
    request_payload: Option<String>,
    response_payload: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            booking_id: Uuid::parse_str(&row.booking_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            status: Self::parse_status(&row.status)?,
            amount_minor: row.amount_minor,
            currency: row.currency,
            merchant_reference: row.merchant_reference,
            provider_tx_id: row.provider_tx_id,
            checkout_url: row.checkout_url,
            provider_event_id: row.provider_event_id,
            request_payload: row.request_payload,
            response_payload: row.response_payload,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Processing" => Ok(PaymentStatus::Processing),
            "Success" => Ok(PaymentStatus::Success),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            "Failed" => Ok(PaymentStatus::Failed),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Success => "Success",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let id_str = payment.id.to_string();
        let booking_id_str = payment.booking_id.to_string();
        let status_str = Self::status_to_str(payment.status);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, status, amount_minor, currency,
                merchant_reference, provider_tx_id, checkout_url,
                provider_event_id, request_payload, response_payload,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&booking_id_str)
        .bind(status_str)
        .bind(payment.amount_minor)
        .bind(&payment.currency)
        .bind(&payment.merchant_reference)
        .bind(&payment.provider_tx_id)
        .bind(&payment.checkout_url)
        .bind(&payment.provider_event_id)
        .bind(&payment.request_payload)
        .bind(&payment.response_payload)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
                AppError::Conflict(format!("Payment already exists: {}", db.message()))
            }
            _ => AppError::Database(e.to_string()),
        })?;

        self.find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, status, amount_minor, currency,
                   merchant_reference, provider_tx_id, checkout_url,
                   provider_event_id, request_payload, response_payload,
                   created_at, updated_at
            FROM payments
            WHERE id = ?
            "#,
        )
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let booking_id_str = booking_id.to_string();
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, status, amount_minor, currency,
                   merchant_reference, provider_tx_id, checkout_url,
                   provider_event_id, request_payload, response_payload,
                   created_at, updated_at
            FROM payments
            WHERE booking_id = ?
            "#,
        )
        .bind(booking_id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_merchant_reference(&self, reference: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, status, amount_minor, currency,
                   merchant_reference, provider_tx_id, checkout_url,
                   provider_event_id, request_payload, response_payload,
                   created_at, updated_at
            FROM payments
            WHERE merchant_reference = ?
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn update_checkout(
        &self,
        id: Uuid,
        checkout_url: Option<&str>,
        request_payload: &str,
        response_payload: &str,
    ) -> Result<Payment> {
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET checkout_url = ?,
                request_payload = ?,
                response_payload = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(checkout_url)
        .bind(request_payload)
        .bind(response_payload)
        .bind(now)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Payment not found".to_string()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated payment".to_string()))
    }

    async fn mark_succeeded(
        &self,
        id: Uuid,
        provider_event_id: &str,
        provider_tx_id: Option<&str>,
    ) -> Result<Option<Payment>> {
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        // Conditional transition: only an open payment can settle. A replayed
        // webhook (or a lost race) affects zero rows and gets None back.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Success',
                provider_event_id = ?,
                provider_tx_id = COALESCE(?, provider_tx_id),
                updated_at = ?
            WHERE id = ?
              AND status IN ('Pending', 'Processing')
            "#,
        )
        .bind(provider_event_id)
        .bind(provider_tx_id)
        .bind(now)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })?))
    }

    async fn mark_dead(&self, id: Uuid, status: PaymentStatus) -> Result<Option<Payment>> {
        if !status.is_dead() {
            return Err(AppError::InvariantViolation(format!(
                "mark_dead called with non-terminal status {:?}",
                status
            )));
        }

        let id_str = id.to_string();
        let status_str = Self::status_to_str(status);
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                updated_at = ?
            WHERE id = ?
              AND status IN ('Pending', 'Processing')
            "#,
        )
        .bind(status_str)
        .bind(now)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })?))
    }
}
