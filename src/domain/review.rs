use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub listing_id: Uuid,
    /// 1 through 5, CHECK-constrained in the store.
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub customer_id: Uuid,
    pub listing_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}
