use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, ConfirmOutcome},
    error::{AppError, Result},
    repository::BookingRepository,
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    customer_id: String,
    listing_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    total_price_minor: i64,
    created_at: NaiveDateTime,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            customer_id: Uuid::parse_str(&row.customer_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            listing_id: Uuid::parse_str(&row.listing_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            start_date: row.start_date,
            end_date: row.end_date,
            status: Self::parse_status(&row.status)?,
            total_price_minor: row.total_price_minor,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<BookingStatus> {
        match s {
            "PND" => Ok(BookingStatus::Pending),
            "CFD" => Ok(BookingStatus::Confirmed),
            "CNC" => Ok(BookingStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
        }
    }

    fn status_to_str(status: BookingStatus) -> &'static str {
        match status {
            BookingStatus::Pending => "PND",
            BookingStatus::Confirmed => "CFD",
            BookingStatus::Cancelled => "CNC",
        }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, booking: Booking) -> Result<Booking> {
        let id_str = booking.id.to_string();
        let customer_id_str = booking.customer_id.to_string();
        let listing_id_str = booking.listing_id.to_string();
        let status_str = Self::status_to_str(booking.status);
        let created_at = booking.created_at.naive_utc();

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, customer_id, listing_id, start_date, end_date,
                status, total_price_minor, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&customer_id_str)
        .bind(&listing_id_str)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(status_str)
        .bind(booking.total_price_minor)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(booking.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created booking".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, customer_id, listing_id, start_date, end_date,
                   status, total_price_minor, created_at
            FROM bookings
            WHERE id = ?
            "#,
        )
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_customer(&self, customer_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let customer_id_str = customer_id.to_string();
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, customer_id, listing_id, start_date, end_date,
                   status, total_price_minor, created_at
            FROM bookings
            WHERE customer_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(customer_id_str)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_confirmed(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, customer_id, listing_id, start_date, end_date,
                   status, total_price_minor, created_at
            FROM bookings
            WHERE status = 'CFD'
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn confirm_if_no_overlap(&self, id: Uuid) -> Result<ConfirmOutcome> {
        let id_str = id.to_string();

        // Single conditional write. The correlated NOT EXISTS re-checks the
        // overlap invariant inside the same statement, so two concurrent
        // confirmations for the same slot cannot both pass: SQLite serializes
        // writers and the loser sees the winner's CFD row.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CFD'
            WHERE id = ?
              AND status = 'PND'
              AND NOT EXISTS (
                  SELECT 1 FROM bookings other
                  WHERE other.listing_id = bookings.listing_id
                    AND other.id != bookings.id
                    AND other.status = 'CFD'
                    AND other.start_date < bookings.end_date
                    AND bookings.start_date < other.end_date
              )
            "#,
        )
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let booking = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(ConfirmOutcome::Confirmed(booking));
        }

        // The write did not apply; the current row tells us why.
        match booking.status {
            BookingStatus::Confirmed => Ok(ConfirmOutcome::AlreadyConfirmed(booking)),
            BookingStatus::Cancelled => {
                Err(AppError::Conflict("Booking is cancelled".to_string()))
            }
            BookingStatus::Pending => Err(AppError::Overlap),
        }
    }
}
