use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateReviewRequest, Review},
    error::{AppError, Result},
    repository::ReviewRepository,
};

#[derive(FromRow)]
struct ReviewRow {
    id: String,
    customer_id: String,
    listing_id: String,
    rating: i32,
    comment: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteReviewRepository {
    pool: SqlitePool,
}

impl SqliteReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_review(row: ReviewRow) -> Result<Review> {
        Ok(Review {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            customer_id: Uuid::parse_str(&row.customer_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            listing_id: Uuid::parse_str(&row.listing_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            rating: row.rating,
            comment: row.comment,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn create(&self, review: CreateReviewRequest) -> Result<Review> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let customer_id_str = review.customer_id.to_string();
        let listing_id_str = review.listing_id.to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO reviews (id, customer_id, listing_id, rating, comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&customer_id_str)
        .bind(&listing_id_str)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, customer_id, listing_id, rating, comment, created_at
            FROM reviews
            WHERE id = ?
            "#,
        )
        .bind(&id_str)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Self::row_to_review(row)
    }

    async fn list_by_listing(&self, listing_id: Uuid) -> Result<Vec<Review>> {
        let listing_id_str = listing_id.to_string();
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, customer_id, listing_id, rating, comment, created_at
            FROM reviews
            WHERE listing_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(listing_id_str)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_review).collect()
    }
}
