use std::sync::Arc;

use skyport_core::{BookingService, FlightRepository, OrderRepository};
use skyport_store::app_config::PaginationConfig;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub booking: Arc<BookingService>,
    pub flight_repo: Arc<dyn FlightRepository>,
    pub order_repo: Arc<dyn OrderRepository>,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
}

impl AppState {
    pub fn new(
        flight_repo: Arc<dyn FlightRepository>,
        order_repo: Arc<dyn OrderRepository>,
        auth: AuthConfig,
        pagination: PaginationConfig,
    ) -> Self {
        let booking = Arc::new(BookingService::new(flight_repo.clone(), order_repo.clone()));
        Self {
            booking,
            flight_repo,
            order_repo,
            auth,
            pagination,
        }
    }
}
