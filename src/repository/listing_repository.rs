use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateListingRequest, Listing, UpdateListingRequest},
    error::{AppError, Result},
    repository::ListingRepository,
};

#[derive(FromRow)]
struct ListingRow {
    id: String,
    host_id: String,
    name: String,
    description: String,
    // SQLite has no decimal type; nightly rates are stored as TEXT.
    price_per_night: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteListingRepository {
    pool: SqlitePool,
}

impl SqliteListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_listing(row: ListingRow) -> Result<Listing> {
        Ok(Listing {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            host_id: Uuid::parse_str(&row.host_id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            description: row.description,
            price_per_night: Decimal::from_str(&row.price_per_night)
                .map_err(|e| AppError::Database(format!("Invalid price: {}", e)))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl ListingRepository for SqliteListingRepository {
    async fn create(&self, listing: CreateListingRequest) -> Result<Listing> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let host_id_str = listing.host_id.to_string();
        let price_str = listing.price_per_night.to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO listings (id, host_id, name, description, price_per_night, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&host_id_str)
        .bind(&listing.name)
        .bind(&listing.description)
        .bind(&price_str)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created listing".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, host_id, name, description, price_per_night, created_at, updated_at
            FROM listings
            WHERE id = ?
            "#,
        )
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_listing(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT id, host_id, name, description, price_per_night, created_at, updated_at
            FROM listings
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_listing).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateListingRequest) -> Result<Listing> {
        let id_str = id.to_string();
        let price_str = update.price_per_night.map(|p| p.to_string());
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE listings
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                price_per_night = COALESCE(?, price_per_night),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(&price_str)
        .bind(now)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Listing not found".to_string()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated listing".to_string()))
    }
}
