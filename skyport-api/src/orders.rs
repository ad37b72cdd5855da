use std::collections::HashMap;

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyport_core::models::{FlightInfo, Order, TicketRequest};
use skyport_core::{Page, PageRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::parse_id;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub tickets: Vec<TicketRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub row: i32,
    pub seat: i32,
    pub flight: Uuid,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            created_at: order.created_at,
            tickets: order
                .tickets
                .into_iter()
                .map(|t| TicketResponse {
                    id: t.id,
                    row: t.row,
                    seat: t.seat,
                    flight: t.flight_id,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketListItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketListItem {
    pub id: Uuid,
    pub row: i32,
    pub seat: i32,
    pub route: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketDetail {
    pub id: Uuid,
    pub row: i32,
    pub seat: i32,
    pub flight: FlightSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSummary {
    pub id: Uuid,
    pub route: String,
    pub airplane: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub crew: Vec<String>,
}

impl From<&FlightInfo> for FlightSummary {
    fn from(flight: &FlightInfo) -> Self {
        Self {
            id: flight.id,
            route: flight.full_route.clone(),
            airplane: flight.airplane_name.clone(),
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            crew: flight.crew.clone(),
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Orders are immutable once created, so only GET and POST are routed.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/{id}", get(get_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/orders
async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let Json(req) = payload?;

    let order = state.booking.create_order(&claims.sub, &req.tickets).await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders?page=&page_size=
async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Page<OrderListItem>>, AppError> {
    let Query(query) = query?;
    let page = page_request(&state, &query)?;

    let orders = state.order_repo.list_orders(&claims.sub, page).await?;
    let flights = resolve_flights(&state, orders.results.iter()).await?;

    let results = orders
        .results
        .iter()
        .map(|order| list_item(order, &flights))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(Page {
        count: orders.count,
        page: orders.page,
        page_size: orders.page_size,
        results,
    }))
}

/// GET /api/orders/{id}
async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    let order_id = parse_id(&id, "Order")?;

    // Another user's order is indistinguishable from a missing one.
    let order = state
        .order_repo
        .get_order(&claims.sub, order_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Order not found".to_string()))?;

    let flights = resolve_flights(&state, std::iter::once(&order)).await?;

    let mut tickets = Vec::with_capacity(order.tickets.len());
    for ticket in &order.tickets {
        let flight = flight_for(&flights, ticket.flight_id)?;
        tickets.push(TicketDetail {
            id: ticket.id,
            row: ticket.row,
            seat: ticket.seat,
            flight: FlightSummary::from(flight),
        });
    }

    Ok(Json(OrderDetail {
        id: order.id,
        created_at: order.created_at,
        tickets,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn list_item(order: &Order, flights: &HashMap<Uuid, FlightInfo>) -> Result<OrderListItem, AppError> {
    let tickets = order
        .tickets
        .iter()
        .map(|ticket| {
            let flight = flight_for(flights, ticket.flight_id)?;
            Ok(TicketListItem {
                id: ticket.id,
                row: ticket.row,
                seat: ticket.seat,
                route: flight.full_route.clone(),
                departure_time: flight.departure_time,
                arrival_time: flight.arrival_time,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(OrderListItem {
        id: order.id,
        created_at: order.created_at,
        tickets,
    })
}

fn page_request(state: &AppState, query: &ListOrdersQuery) -> Result<PageRequest, AppError> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::validation("Invalid page.", "page"));
    }

    let page_size = match query.page_size {
        Some(0) => return Err(AppError::validation("Page size must be positive.", "page_size")),
        Some(size) => size.min(state.pagination.max_page_size),
        None => state.pagination.default_page_size,
    };

    Ok(PageRequest::new(page, page_size))
}

async fn resolve_flights<'a>(
    state: &AppState,
    orders: impl Iterator<Item = &'a Order>,
) -> Result<HashMap<Uuid, FlightInfo>, AppError> {
    let mut ids: Vec<Uuid> = orders.flat_map(Order::flight_ids).collect();
    ids.sort();
    ids.dedup();

    Ok(state
        .flight_repo
        .get_flights(&ids)
        .await?
        .into_iter()
        .map(|flight| (flight.id, flight))
        .collect())
}

fn flight_for(flights: &HashMap<Uuid, FlightInfo>, flight_id: Uuid) -> Result<&FlightInfo, AppError> {
    flights
        .get(&flight_id)
        .ok_or_else(|| AppError::InternalServerError(format!("ticket references missing flight {}", flight_id)))
}
