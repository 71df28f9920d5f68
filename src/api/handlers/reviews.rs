use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::state::AppState,
    domain::{CreateReviewRequest, Review},
    error::{AppError, Result},
};

#[derive(Debug, Serialize)]
pub struct ReviewDto {
    id: Uuid,
    customer_id: Uuid,
    listing_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: String,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            customer_id: review.customer_id,
            listing_id: review.listing_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewDto {
    customer_id: Uuid,
    listing_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    rating: i32,
    comment: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreateReviewDto>,
) -> Result<(StatusCode, Json<ReviewDto>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .service_context
        .user_repo
        .find_by_id(dto.customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    state
        .service_context
        .listing_repo
        .find_by_id(dto.listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    let review = state
        .service_context
        .review_repo
        .create(CreateReviewRequest {
            customer_id: dto.customer_id,
            listing_id: dto.listing_id,
            rating: dto.rating,
            comment: dto.comment,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(review.into())))
}

pub async fn list_for_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewDto>>> {
    state
        .service_context
        .listing_repo
        .find_by_id(listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    let reviews = state
        .service_context
        .review_repo
        .list_by_listing(listing_id)
        .await?;

    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}
