pub mod models;
pub mod booking;
pub mod repository;
pub mod schedule;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use booking::{validate_ticket, BookingService, SeatField, TicketViolation};
pub use repository::{FlightRepository, OrderRepository, Page, PageRequest, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("order must contain at least one ticket")]
    EmptyOrder,
    #[error("flight {flight_id} does not exist")]
    FlightNotFound { index: usize, flight_id: Uuid },
    #[error(
        "{} number must be in available range: (1, {}): (1, {}) on airplane {}",
        .field, .field.limit_name(), .max, .airplane
    )]
    InvalidSeat {
        index: usize,
        flight_id: Uuid,
        airplane: String,
        field: SeatField,
        value: i32,
        max: i32,
    },
    #[error("booking for past flights is not available: flight {flight_id} departed at {departure_time}")]
    FlightDeparted {
        index: usize,
        flight_id: Uuid,
        departure_time: DateTime<Utc>,
    },
    #[error("seat (row {row}, seat {seat}) on flight {flight_id} is already taken")]
    SeatTaken {
        index: usize,
        flight_id: Uuid,
        row: i32,
        seat: i32,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BookingError {
    /// Path of the request field the error points at, e.g. `tickets[2].row`.
    pub fn field_path(&self) -> Option<String> {
        match self {
            BookingError::EmptyOrder => Some("tickets".to_string()),
            BookingError::FlightNotFound { index, .. }
            | BookingError::FlightDeparted { index, .. } => Some(format!("tickets[{}].flight", index)),
            BookingError::InvalidSeat { index, field, .. } => Some(format!("tickets[{}].{}", index, field)),
            BookingError::SeatTaken { index, .. } => Some(format!("tickets[{}]", index)),
            BookingError::Repository(_) => None,
        }
    }

    /// True for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, BookingError::Repository(_))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
