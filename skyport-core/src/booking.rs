use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{FlightInfo, NewOrder, Order, Seat, Ticket, TicketRequest};
use crate::repository::{FlightRepository, OrderRepository, RepositoryError};
use crate::{BookingError, BookingResult};

/// Which coordinate of a seat failed validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatField {
    Row,
    Seat,
}

impl SeatField {
    /// Name of the airplane dimension bounding this coordinate.
    pub fn limit_name(&self) -> &'static str {
        match self {
            SeatField::Row => "rows",
            SeatField::Seat => "seats_in_row",
        }
    }
}

impl fmt::Display for SeatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatField::Row => write!(f, "row"),
            SeatField::Seat => write!(f, "seat"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketViolation {
    #[error("{field} number must be in available range: (1, {max})")]
    OutOfRange { field: SeatField, value: i32, max: i32 },
    #[error("seat is already taken")]
    Taken,
}

/// Check one seat against the flight's geometry and the seats already held on it.
///
/// Rows are checked before seats, and geometry before availability.
pub fn validate_ticket(
    flight: &FlightInfo,
    seat: Seat,
    taken: &HashSet<Seat>,
) -> Result<(), TicketViolation> {
    for (field, value, max) in [
        (SeatField::Row, seat.row, flight.geometry.rows),
        (SeatField::Seat, seat.seat, flight.geometry.seats_in_row),
    ] {
        if !(1..=max).contains(&value) {
            return Err(TicketViolation::OutOfRange { field, value, max });
        }
    }

    if taken.contains(&seat) {
        return Err(TicketViolation::Taken);
    }

    Ok(())
}

/// Validates ticket requests and commits orders through the repositories.
///
/// Holds no state of its own beyond the repository handles, so one instance
/// can serve any number of concurrent callers.
pub struct BookingService {
    flights: Arc<dyn FlightRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl BookingService {
    pub fn new(flights: Arc<dyn FlightRepository>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { flights, orders }
    }

    pub async fn create_order(&self, user_id: &str, requests: &[TicketRequest]) -> BookingResult<Order> {
        self.create_order_at(user_id, requests, Utc::now()).await
    }

    /// Book every requested seat for `user_id` as one order stamped `created_at`.
    pub async fn create_order_at(
        &self,
        user_id: &str,
        requests: &[TicketRequest],
        created_at: DateTime<Utc>,
    ) -> BookingResult<Order> {
        if requests.is_empty() {
            return Err(BookingError::EmptyOrder);
        }

        let mut flight_ids: Vec<Uuid> = Vec::new();
        for req in requests {
            if !flight_ids.contains(&req.flight) {
                flight_ids.push(req.flight);
            }
        }

        let flights: HashMap<Uuid, FlightInfo> = self
            .flights
            .get_flights(&flight_ids)
            .await?
            .into_iter()
            .map(|flight| (flight.id, flight))
            .collect();

        let order_id = Uuid::new_v4();
        let mut taken: HashMap<Uuid, HashSet<Seat>> = HashMap::new();
        let mut tickets = Vec::with_capacity(requests.len());

        for (index, req) in requests.iter().enumerate() {
            let flight = flights.get(&req.flight).ok_or(BookingError::FlightNotFound {
                index,
                flight_id: req.flight,
            })?;

            if flight.departure_time < created_at {
                return Err(BookingError::FlightDeparted {
                    index,
                    flight_id: flight.id,
                    departure_time: flight.departure_time,
                });
            }

            if !taken.contains_key(&flight.id) {
                let seats = self.orders.taken_seats(flight.id).await?;
                taken.insert(flight.id, seats);
            }
            let held = taken.entry(flight.id).or_default();

            validate_ticket(flight, req.seat(), held).map_err(|violation| match violation {
                TicketViolation::OutOfRange { field, value, max } => BookingError::InvalidSeat {
                    index,
                    flight_id: flight.id,
                    airplane: flight.airplane_name.clone(),
                    field,
                    value,
                    max,
                },
                TicketViolation::Taken => BookingError::SeatTaken {
                    index,
                    flight_id: flight.id,
                    row: req.row,
                    seat: req.seat,
                },
            })?;

            // Later tickets in the same request must not reuse this seat.
            held.insert(req.seat());

            tickets.push(Ticket {
                id: Uuid::new_v4(),
                order_id,
                flight_id: flight.id,
                row: req.row,
                seat: req.seat,
            });
        }

        let new_order = NewOrder {
            id: order_id,
            user_id: user_id.to_string(),
            created_at,
            tickets,
        };

        match self.orders.create_order(new_order).await {
            Ok(order) => {
                info!(
                    "Order {} created for {} with {} ticket(s)",
                    order.id,
                    user_id,
                    order.tickets.len()
                );
                Ok(order)
            }
            Err(RepositoryError::SeatConflict { flight_id, seat }) => {
                warn!(
                    "Seat (row {}, seat {}) on flight {} was taken by a concurrent order",
                    seat.row, seat.seat, flight_id
                );
                let index = requests
                    .iter()
                    .position(|req| req.flight == flight_id && req.seat() == seat)
                    .unwrap_or_default();
                Err(BookingError::SeatTaken {
                    index,
                    flight_id,
                    row: seat.row,
                    seat: seat.seat,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
