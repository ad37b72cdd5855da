use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyport_core::models::{FlightInfo, SeatGeometry};
use skyport_core::repository::{FlightRepository, RepositoryError, RepositoryResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    airplane_name: String,
    seat_rows: i32,
    seats_in_row: i32,
    source_name: String,
    destination_name: String,
    crew: Vec<String>,
}

impl From<FlightRow> for FlightInfo {
    fn from(row: FlightRow) -> Self {
        FlightInfo {
            id: row.id,
            full_route: format!("{} - {}", row.source_name, row.destination_name),
            airplane_name: row.airplane_name,
            geometry: SeatGeometry {
                rows: row.seat_rows,
                seats_in_row: row.seats_in_row,
            },
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            crew: row.crew,
        }
    }
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn get_flights(&self, ids: &[Uuid]) -> RepositoryResult<Vec<FlightInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT
                f.id, f.departure_time, f.arrival_time,
                a.name AS airplane_name, a.seat_rows, a.seats_in_row,
                src.name AS source_name, dst.name AS destination_name,
                COALESCE(
                    ARRAY_AGG(c.first_name || ' ' || c.last_name ORDER BY c.last_name)
                        FILTER (WHERE c.id IS NOT NULL),
                    '{}'
                ) AS crew
            FROM flights f
            JOIN airplanes a ON a.id = f.airplane_id
            JOIN routes r ON r.id = f.route_id
            JOIN airports src ON src.id = r.source_id
            JOIN airports dst ON dst.id = r.destination_id
            LEFT JOIN flight_crew fc ON fc.flight_id = f.id
            LEFT JOIN crew c ON c.id = fc.crew_id
            WHERE f.id = ANY($1)
            GROUP BY f.id, a.id, src.id, dst.id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        Ok(rows.into_iter().map(FlightInfo::from).collect())
    }
}
