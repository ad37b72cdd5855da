//! Rules applied whenever reference data (routes, airplanes, flights) is written.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Minimum rest an airplane gets between arriving and departing again.
pub const MIN_TURNAROUND_HOURS: i64 = 3;

/// Longest an airplane may sit idle between consecutive flights.
pub const MAX_IDLE_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("Source and destination airports must be different.")]
    SameEndpoints,
    #[error("Airplane must have a positive number of rows and seats in row, got {rows}x{seats_in_row}.")]
    InvalidGeometry { rows: i32, seats_in_row: i32 },
    #[error("Departure time must be earlier than arrival time.")]
    ArrivalNotAfterDeparture,
    #[error(
        "Cannot schedule this flight before the previous flight arrives. \
         The airplane's last scheduled flight arrives at {previous_arrival}. \
         The next possible departure time is {next_departure}."
    )]
    OverlapsPreviousFlight {
        previous_arrival: DateTime<Utc>,
        next_departure: DateTime<Utc>,
    },
    #[error(
        "The airplane needs a 3-hour rest after its previous flight. \
         The previous flight arrived at {previous_arrival}. \
         The next available departure time is {next_departure}."
    )]
    InsufficientTurnaround {
        previous_arrival: DateTime<Utc>,
        next_departure: DateTime<Utc>,
    },
    #[error(
        "The time difference between consecutive flights shouldn't exceed 24 hours. \
         Previous flight arrived at {previous_arrival}, \
         and this flight is scheduled to depart at {departure}."
    )]
    IdleTooLong {
        previous_arrival: DateTime<Utc>,
        departure: DateTime<Utc>,
    },
    #[error("Departure location should match the arrival location of the previous flight. {}", available_routes_hint(.available_routes))]
    WrongDepartureLocation { available_routes: Vec<String> },
    #[error("{kind} {id} does not exist")]
    UnknownReference { kind: &'static str, id: Uuid },
    #[error("{kind} named {name:?} already exists")]
    DuplicateName { kind: &'static str, name: String },
    #[error("{0}")]
    Conflict(String),
}

fn available_routes_hint(routes: &[String]) -> String {
    if routes.is_empty() {
        "There are no routes with the correct departure location. \
         You need to create a route first, then schedule the flight."
            .to_string()
    } else {
        format!(
            "Available routes with the correct departure location: {}.",
            routes.join(", ")
        )
    }
}

pub fn validate_route(source_id: Uuid, destination_id: Uuid) -> Result<(), ReferenceError> {
    if source_id == destination_id {
        return Err(ReferenceError::SameEndpoints);
    }
    Ok(())
}

pub fn validate_geometry(rows: i32, seats_in_row: i32) -> Result<(), ReferenceError> {
    if rows < 1 || seats_in_row < 1 {
        return Err(ReferenceError::InvalidGeometry { rows, seats_in_row });
    }
    Ok(())
}

/// The airplane's most recent flight, as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct PreviousLeg {
    pub arrival_time: DateTime<Utc>,
    pub destination_id: Uuid,
    /// Routes leaving `destination_id`, as "SRC - DST" labels.
    pub onward_routes: Vec<String>,
}

/// Validate a new flight for an airplane whose latest flight is `previous`.
pub fn validate_flight(
    source_id: Uuid,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    previous: Option<&PreviousLeg>,
) -> Result<(), ReferenceError> {
    if let Some(prev) = previous {
        if source_id != prev.destination_id {
            return Err(ReferenceError::WrongDepartureLocation {
                available_routes: prev.onward_routes.clone(),
            });
        }
    }

    if departure_time >= arrival_time {
        return Err(ReferenceError::ArrivalNotAfterDeparture);
    }

    if let Some(prev) = previous {
        let next_departure = prev.arrival_time + Duration::hours(MIN_TURNAROUND_HOURS);

        if departure_time < prev.arrival_time {
            return Err(ReferenceError::OverlapsPreviousFlight {
                previous_arrival: prev.arrival_time,
                next_departure,
            });
        }
        if departure_time < next_departure {
            return Err(ReferenceError::InsufficientTurnaround {
                previous_arrival: prev.arrival_time,
                next_departure,
            });
        }
        if departure_time - prev.arrival_time > Duration::hours(MAX_IDLE_HOURS) {
            return Err(ReferenceError::IdleTooLong {
                previous_arrival: prev.arrival_time,
                departure: departure_time,
            });
        }
    }

    Ok(())
}
