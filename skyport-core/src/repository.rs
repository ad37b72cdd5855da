use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{FlightInfo, NewOrder, Order, Seat};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The store rejected a ticket because the seat is already held on that flight.
    #[error("seat (row {}, seat {}) on flight {flight_id} is already taken", seat.row, seat.seat)]
    SeatConflict { flight_id: Uuid, seat: Seat },
    #[error("storage failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend(err.into())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 1-based page selection for listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, count: u64, results: Vec<T>) -> Self {
        Self {
            count,
            page: request.page,
            page_size: request.page_size,
            results,
        }
    }
}

/// Read-only flight lookups backing seat validation.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Resolve every id that exists; unknown ids are silently absent from the result.
    async fn get_flights(&self, ids: &[Uuid]) -> RepositoryResult<Vec<FlightInfo>>;

    async fn get_flight(&self, id: Uuid) -> RepositoryResult<Option<FlightInfo>> {
        Ok(self.get_flights(&[id]).await?.into_iter().next())
    }
}

/// Order and ticket persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Seats already ticketed on a flight.
    async fn taken_seats(&self, flight_id: Uuid) -> RepositoryResult<HashSet<Seat>>;

    /// Persist the order and all of its tickets atomically.
    ///
    /// Fails with [`RepositoryError::SeatConflict`] if any ticket collides with a
    /// seat already held on its flight; in that case nothing is written.
    async fn create_order(&self, order: NewOrder) -> RepositoryResult<Order>;

    /// Orders owned by `user_id`, newest first.
    async fn list_orders(&self, user_id: &str, page: PageRequest) -> RepositoryResult<Page<Order>>;

    async fn get_order(&self, user_id: &str, order_id: Uuid) -> RepositoryResult<Option<Order>>;
}
