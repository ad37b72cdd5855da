use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyport_core::models::{
    full_route, Airplane, AirplaneType, Airport, Crew, Flight, FlightInfo, NewOrder, Order, Route, Seat,
};
use skyport_core::repository::{
    FlightRepository, OrderRepository, Page, PageRequest, RepositoryError, RepositoryResult,
};
use skyport_core::schedule::{self, PreviousLeg, ReferenceError};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct State {
    airports: HashMap<Uuid, Airport>,
    routes: HashMap<Uuid, Route>,
    airplane_types: HashMap<Uuid, AirplaneType>,
    airplanes: HashMap<Uuid, Airplane>,
    crew: HashMap<Uuid, Crew>,
    flights: HashMap<Uuid, Flight>,
    orders: HashMap<Uuid, Order>,
    taken: HashMap<Uuid, HashSet<Seat>>,
}

impl State {
    fn route_label(&self, route: &Route) -> Option<String> {
        let source = self.airports.get(&route.source_id)?;
        let destination = self.airports.get(&route.destination_id)?;
        Some(full_route(source, destination))
    }

    fn flight_info(&self, flight: &Flight) -> Option<FlightInfo> {
        let route = self.routes.get(&flight.route_id)?;
        let airplane = self.airplanes.get(&flight.airplane_id)?;

        let mut crew: Vec<&Crew> = flight.crew_ids.iter().filter_map(|id| self.crew.get(id)).collect();
        crew.sort_by(|a, b| a.last_name.cmp(&b.last_name));

        Some(FlightInfo {
            id: flight.id,
            full_route: self.route_label(route)?,
            airplane_name: airplane.name.clone(),
            geometry: airplane.geometry(),
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            crew: crew.into_iter().map(Crew::full_name).collect(),
        })
    }

    /// The airplane's flight with the latest arrival, shaped for the scheduler.
    fn previous_leg(&self, airplane_id: Uuid) -> Option<PreviousLeg> {
        let latest = self
            .flights
            .values()
            .filter(|f| f.airplane_id == airplane_id)
            .max_by_key(|f| f.arrival_time)?;
        let destination_id = self.routes.get(&latest.route_id)?.destination_id;

        let mut onward_routes: Vec<String> = self
            .routes
            .values()
            .filter(|r| r.source_id == destination_id)
            .filter_map(|r| self.route_label(r))
            .collect();
        onward_routes.sort();

        Some(PreviousLeg {
            arrival_time: latest.arrival_time,
            destination_id,
            onward_routes,
        })
    }
}

/// Process-local store implementing both repository traits.
///
/// Ticket uniqueness is enforced under the write lock exactly like the
/// `unique_ticket` constraint in PostgreSQL: an order either lands with all of
/// its tickets or not at all.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Reference data
    // ------------------------------------------------------------------------

    pub async fn add_airport(&self, name: &str, closest_big_city: &str) -> Result<Airport, ReferenceError> {
        let mut state = self.state.write().await;
        if state.airports.values().any(|a| a.name == name) {
            return Err(ReferenceError::DuplicateName { kind: "airport", name: name.to_string() });
        }

        let airport = Airport {
            id: Uuid::new_v4(),
            name: name.to_string(),
            closest_big_city: closest_big_city.to_string(),
        };
        state.airports.insert(airport.id, airport.clone());
        Ok(airport)
    }

    pub async fn add_route(&self, source_id: Uuid, destination_id: Uuid, distance: i32) -> Result<Route, ReferenceError> {
        schedule::validate_route(source_id, destination_id)?;

        let mut state = self.state.write().await;
        for id in [source_id, destination_id] {
            if !state.airports.contains_key(&id) {
                return Err(ReferenceError::UnknownReference { kind: "airport", id });
            }
        }
        if state
            .routes
            .values()
            .any(|r| r.source_id == source_id && r.destination_id == destination_id)
        {
            return Err(ReferenceError::Conflict("Route with this source and destination already exists.".to_string()));
        }

        let route = Route {
            id: Uuid::new_v4(),
            source_id,
            destination_id,
            distance,
        };
        state.routes.insert(route.id, route.clone());
        Ok(route)
    }

    pub async fn add_airplane_type(&self, name: &str) -> Result<AirplaneType, ReferenceError> {
        let mut state = self.state.write().await;
        if state.airplane_types.values().any(|t| t.name == name) {
            return Err(ReferenceError::DuplicateName { kind: "airplane type", name: name.to_string() });
        }

        let airplane_type = AirplaneType {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.airplane_types.insert(airplane_type.id, airplane_type.clone());
        Ok(airplane_type)
    }

    pub async fn add_airplane(
        &self,
        name: &str,
        rows: i32,
        seats_in_row: i32,
        airplane_type_id: Uuid,
    ) -> Result<Airplane, ReferenceError> {
        schedule::validate_geometry(rows, seats_in_row)?;

        let mut state = self.state.write().await;
        if !state.airplane_types.contains_key(&airplane_type_id) {
            return Err(ReferenceError::UnknownReference { kind: "airplane type", id: airplane_type_id });
        }
        if state.airplanes.values().any(|a| a.name == name) {
            return Err(ReferenceError::DuplicateName { kind: "airplane", name: name.to_string() });
        }

        let airplane = Airplane {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rows,
            seats_in_row,
            airplane_type_id,
        };
        state.airplanes.insert(airplane.id, airplane.clone());
        Ok(airplane)
    }

    pub async fn add_crew(&self, first_name: &str, last_name: &str) -> Crew {
        let crew = Crew {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        self.state.write().await.crew.insert(crew.id, crew.clone());
        crew
    }

    pub async fn add_flight(
        &self,
        route_id: Uuid,
        airplane_id: Uuid,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        crew_ids: Vec<Uuid>,
    ) -> Result<Flight, ReferenceError> {
        let mut state = self.state.write().await;

        let source_id = state
            .routes
            .get(&route_id)
            .map(|r| r.source_id)
            .ok_or(ReferenceError::UnknownReference { kind: "route", id: route_id })?;
        if !state.airplanes.contains_key(&airplane_id) {
            return Err(ReferenceError::UnknownReference { kind: "airplane", id: airplane_id });
        }
        if let Some(id) = crew_ids.iter().find(|id| !state.crew.contains_key(id)) {
            return Err(ReferenceError::UnknownReference { kind: "crew member", id: *id });
        }

        let previous = state.previous_leg(airplane_id);
        schedule::validate_flight(source_id, departure_time, arrival_time, previous.as_ref())?;

        if state
            .flights
            .values()
            .any(|f| f.airplane_id == airplane_id && f.departure_time == departure_time)
        {
            return Err(ReferenceError::Conflict("Flight with this airplane and departure time already exists.".to_string()));
        }

        let flight = Flight {
            id: Uuid::new_v4(),
            route_id,
            airplane_id,
            departure_time,
            arrival_time,
            crew_ids,
        };
        state.flights.insert(flight.id, flight.clone());
        Ok(flight)
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.read().await.taken.values().map(HashSet::len).sum()
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn get_flights(&self, ids: &[Uuid]) -> RepositoryResult<Vec<FlightInfo>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.flights.get(id))
            .filter_map(|flight| state.flight_info(flight))
            .collect())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn taken_seats(&self, flight_id: Uuid) -> RepositoryResult<HashSet<Seat>> {
        let state = self.state.read().await;
        Ok(state.taken.get(&flight_id).cloned().unwrap_or_default())
    }

    async fn create_order(&self, order: NewOrder) -> RepositoryResult<Order> {
        let mut state = self.state.write().await;

        // Check everything before touching anything.
        let mut claimed: HashSet<(Uuid, Seat)> = HashSet::with_capacity(order.tickets.len());
        for ticket in &order.tickets {
            if !state.flights.contains_key(&ticket.flight_id) {
                return Err(RepositoryError::backend(format!(
                    "ticket references unknown flight {}",
                    ticket.flight_id
                )));
            }
            let held = state
                .taken
                .get(&ticket.flight_id)
                .is_some_and(|seats| seats.contains(&ticket.seat()));
            if held || !claimed.insert((ticket.flight_id, ticket.seat())) {
                debug!("in-memory unique_ticket rejected {:?} on flight {}", ticket.seat(), ticket.flight_id);
                return Err(RepositoryError::SeatConflict {
                    flight_id: ticket.flight_id,
                    seat: ticket.seat(),
                });
            }
        }

        for (flight_id, seat) in claimed {
            state.taken.entry(flight_id).or_default().insert(seat);
        }

        let order = order.into_order();
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_orders(&self, user_id: &str, page: PageRequest) -> RepositoryResult<Page<Order>> {
        let state = self.state.read().await;

        let mut owned: Vec<&Order> = state.orders.values().filter(|o| o.user_id == user_id).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let results = owned
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|o| (*o).clone())
            .collect();

        Ok(Page::new(page, owned.len() as u64, results))
    }

    async fn get_order(&self, user_id: &str, order_id: Uuid) -> RepositoryResult<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use skyport_core::models::Ticket;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_reference_data_rules_are_applied() {
        let store = InMemoryStore::new();
        let krk = store.add_airport("KRK", "Krakow").await.unwrap();
        let pmi = store.add_airport("PMI", "Palma").await.unwrap();

        assert!(matches!(
            store.add_airport("KRK", "Krakow").await,
            Err(ReferenceError::DuplicateName { .. })
        ));
        assert_eq!(
            store.add_route(krk.id, krk.id, 0).await.unwrap_err(),
            ReferenceError::SameEndpoints
        );

        let outbound = store.add_route(krk.id, pmi.id, 1900).await.unwrap();
        let boeing = store.add_airplane_type("Boeing").await.unwrap();
        assert!(store.add_airplane("BAD", 0, 6, boeing.id).await.is_err());
        let airplane = store.add_airplane("BO1234", 40, 6, boeing.id).await.unwrap();
        assert_eq!(airplane.capacity(), 240);

        store
            .add_flight(outbound.id, airplane.id, at(1, 8), at(1, 11), vec![])
            .await
            .unwrap();

        // Airplane is now in PMI and there is no PMI route yet.
        let err = store
            .add_flight(outbound.id, airplane.id, at(1, 15), at(1, 18), vec![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("There are no routes with the correct departure location."));

        let inbound = store.add_route(pmi.id, krk.id, 1900).await.unwrap();
        assert!(matches!(
            store.add_flight(inbound.id, airplane.id, at(1, 12), at(1, 15), vec![]).await,
            Err(ReferenceError::InsufficientTurnaround { .. })
        ));
        store
            .add_flight(inbound.id, airplane.id, at(1, 14), at(1, 17), vec![])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_flight_info_resolves_route_and_crew() {
        let store = InMemoryStore::new();
        let krk = store.add_airport("KRK", "Krakow").await.unwrap();
        let pmi = store.add_airport("PMI", "Palma").await.unwrap();
        let route = store.add_route(krk.id, pmi.id, 1900).await.unwrap();
        let boeing = store.add_airplane_type("Boeing").await.unwrap();
        let airplane = store.add_airplane("BO1234", 10, 6, boeing.id).await.unwrap();
        let pilot = store.add_crew("Jan", "Zielinski").await;
        let purser = store.add_crew("Anna", "Nowak").await;

        let departure = Utc::now() + Duration::days(2);
        let flight = store
            .add_flight(route.id, airplane.id, departure, departure + Duration::hours(3), vec![pilot.id, purser.id])
            .await
            .unwrap();

        let info = store.get_flight(flight.id).await.unwrap().expect("flight exists");
        assert_eq!(info.full_route, "KRK - PMI");
        assert_eq!(info.airplane_name, "BO1234");
        assert_eq!(info.geometry.capacity(), 60);
        assert_eq!(info.crew, vec!["Anna Nowak".to_string(), "Jan Zielinski".to_string()]);

        assert!(store.get_flight(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_order_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let krk = store.add_airport("KRK", "Krakow").await.unwrap();
        let pmi = store.add_airport("PMI", "Palma").await.unwrap();
        let route = store.add_route(krk.id, pmi.id, 1900).await.unwrap();
        let boeing = store.add_airplane_type("Boeing").await.unwrap();
        let airplane = store.add_airplane("BO1234", 10, 6, boeing.id).await.unwrap();
        let departure = Utc::now() + Duration::days(2);
        let flight = store
            .add_flight(route.id, airplane.id, departure, departure + Duration::hours(3), vec![])
            .await
            .unwrap();

        let new_order = |seats: &[(i32, i32)]| {
            let order_id = Uuid::new_v4();
            NewOrder {
                id: order_id,
                user_id: "user-1".to_string(),
                created_at: Utc::now(),
                tickets: seats
                    .iter()
                    .map(|&(row, seat)| Ticket { id: Uuid::new_v4(), order_id, flight_id: flight.id, row, seat })
                    .collect(),
            }
        };

        store.create_order(new_order(&[(1, 1)])).await.unwrap();

        let err = store.create_order(new_order(&[(2, 2), (1, 1)])).await.unwrap_err();
        assert!(matches!(err, RepositoryError::SeatConflict { seat, .. } if seat == Seat::new(1, 1)));

        // Duplicate seats inside one order collide with each other.
        let err = store.create_order(new_order(&[(3, 3), (3, 3)])).await.unwrap_err();
        assert!(matches!(err, RepositoryError::SeatConflict { .. }));

        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.ticket_count().await, 1);
        assert_eq!(
            store.taken_seats(flight.id).await.unwrap(),
            [Seat::new(1, 1)].into_iter().collect()
        );
    }
}
