use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use skyport_core::models::Seat;
use uuid::Uuid;

use crate::error::AppError;
use crate::parse_id;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SeatMapResponse {
    pub flight: Uuid,
    pub route: String,
    pub airplane: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
    pub tickets_available: i64,
    pub taken_places: Vec<Seat>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/flights/{id}/seats", get(seat_map))
}

/// GET /api/flights/{id}/seats
async fn seat_map(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SeatMapResponse>, AppError> {
    let flight_id = parse_id(&id, "Flight")?;

    let flight = state
        .flight_repo
        .get_flight(flight_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Flight not found".to_string()))?;

    let mut taken_places: Vec<Seat> = state.order_repo.taken_seats(flight_id).await?.into_iter().collect();
    taken_places.sort();

    let capacity = flight.geometry.capacity();
    Ok(Json(SeatMapResponse {
        flight: flight.id,
        route: flight.full_route,
        airplane: flight.airplane_name,
        rows: flight.geometry.rows,
        seats_in_row: flight.geometry.seats_in_row,
        capacity,
        tickets_available: capacity - taken_places.len() as i64,
        taken_places,
    }))
}
