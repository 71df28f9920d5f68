use std::sync::Arc;

use crate::{config::Settings, service::PaymentService, service::ServiceContext};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    /// None when the payment provider is not configured; payment endpoints
    /// then answer 503 instead of panicking.
    pub payment_service: Option<Arc<PaymentService>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        payment_service: Option<Arc<PaymentService>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            payment_service,
            settings,
        }
    }
}
