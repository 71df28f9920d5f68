use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub host_id: Uuid,
    pub name: String,
    pub description: String,
    /// Nightly rate in major currency units, 2 decimal places. Always > 0.
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_night: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListingRequest {
    pub host_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_night: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateListingRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_per_night: Option<Decimal>,
}
