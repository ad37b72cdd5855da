use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Reference Data
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Airport {
    pub id: Uuid,
    pub name: String,
    pub closest_big_city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub id: Uuid,
    pub source_id: Uuid,
    pub destination_id: Uuid,
    pub distance: i32,
}

/// "KRK - PMI" style label used wherever a route is echoed back to clients.
pub fn full_route(source: &Airport, destination: &Airport) -> String {
    format!("{} - {}", source.name, destination.name)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crew {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl Crew {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirplaneType {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Airplane {
    pub id: Uuid,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub airplane_type_id: Uuid,
}

impl Airplane {
    pub fn geometry(&self) -> SeatGeometry {
        SeatGeometry {
            rows: self.rows,
            seats_in_row: self.seats_in_row,
        }
    }

    pub fn capacity(&self) -> i64 {
        self.geometry().capacity()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flight {
    pub id: Uuid,
    pub route_id: Uuid,
    pub airplane_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub crew_ids: Vec<Uuid>,
}

// ============================================================================
// Seat Geometry
// ============================================================================

/// Row/seat capacity of the airplane operating a flight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatGeometry {
    pub rows: i32,
    pub seats_in_row: i32,
}

impl SeatGeometry {
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}

/// 1-indexed seat coordinates on a flight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seat {
    pub row: i32,
    pub seat: i32,
}

impl Seat {
    pub fn new(row: i32, seat: i32) -> Self {
        Self { row, seat }
    }
}

/// Everything the booking core needs to know about a flight, resolved in one lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightInfo {
    pub id: Uuid,
    pub full_route: String,
    pub airplane_name: String,
    pub geometry: SeatGeometry,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub crew: Vec<String>,
}

// ============================================================================
// Orders & Tickets
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<Ticket>,
}

impl Order {
    /// Distinct flights referenced by the order's tickets, in ticket order.
    pub fn flight_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(self.tickets.len());
        for ticket in &self.tickets {
            if !ids.contains(&ticket.flight_id) {
                ids.push(ticket.flight_id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub flight_id: Uuid,
    pub row: i32,
    pub seat: i32,
}

impl Ticket {
    pub fn seat(&self) -> Seat {
        Seat::new(self.row, self.seat)
    }
}

/// A single seat a caller asks to book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketRequest {
    pub flight: Uuid,
    pub row: i32,
    pub seat: i32,
}

impl TicketRequest {
    pub fn seat(&self) -> Seat {
        Seat::new(self.row, self.seat)
    }
}

/// A fully validated order handed to the store for an all-or-nothing write.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<Ticket>,
}

impl NewOrder {
    pub fn into_order(self) -> Order {
        let mut tickets = self.tickets;
        tickets.sort_by_key(Ticket::seat);
        Order {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at,
            tickets,
        }
    }
}
