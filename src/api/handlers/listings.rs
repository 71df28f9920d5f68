use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{
        permitted, Action, CreateListingRequest, Listing, ResourceRef, UpdateListingRequest,
    },
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    listings: Vec<ListingDto>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct ListingDto {
    id: Uuid,
    host_id: Uuid,
    name: String,
    description: String,
    price_per_night: String,
    created_at: String,
}

impl From<Listing> for ListingDto {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            host_id: listing.host_id,
            name: listing.name,
            description: listing.description,
            price_per_night: listing.price_per_night.to_string(),
            created_at: listing.created_at.to_rfc3339(),
        }
    }
}

fn require_positive_price(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation(
            "price_per_night must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let listings = state
        .service_context
        .listing_repo
        .list(params.limit, params.offset)
        .await?;

    let total = listings.len();
    let listings: Vec<ListingDto> = listings.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { listings, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDto>> {
    let listing = state
        .service_context
        .listing_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    Ok(Json(listing.into()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingDto>)> {
    require_positive_price(request.price_per_night)?;

    state
        .service_context
        .user_repo
        .find_by_id(request.host_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Host not found".to_string()))?;

    let listing = state.service_context.listing_repo.create(request).await?;

    Ok((StatusCode::CREATED, Json(listing.into())))
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingDto {
    requester_id: Uuid,
    name: Option<String>,
    description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    price_per_night: Option<Decimal>,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UpdateListingDto>,
) -> Result<Json<ListingDto>> {
    if let Some(price) = dto.price_per_night {
        require_positive_price(price)?;
    }

    let listing = state
        .service_context
        .listing_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    let requester = state
        .service_context
        .user_repo
        .find_by_id(dto.requester_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Requester not found".to_string()))?;

    if !permitted(&requester, ResourceRef::Listing(&listing), Action::Update) {
        return Err(AppError::Forbidden);
    }

    let update = UpdateListingRequest {
        name: dto.name,
        description: dto.description,
        price_per_night: dto.price_per_night,
    };

    let updated = state.service_context.listing_repo.update(id, update).await?;

    Ok(Json(updated.into()))
}
