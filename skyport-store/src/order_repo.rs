use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyport_core::models::{NewOrder, Order, Seat, Ticket};
use skyport_core::repository::{OrderRepository, Page, PageRequest, RepositoryError, RepositoryResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// Name of the `(flight_id, seat_row, seat_number)` uniqueness constraint.
const UNIQUE_TICKET: &str = "unique_ticket";

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_tickets(&self, order_ids: &[Uuid]) -> RepositoryResult<HashMap<Uuid, Vec<Ticket>>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, order_id, flight_id, seat_row, seat_number
            FROM tickets
            WHERE order_id = ANY($1)
            ORDER BY seat_row, seat_number
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        let mut grouped: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn attach_tickets(&self, rows: Vec<OrderRow>) -> RepositoryResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut tickets = self.load_tickets(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| Order {
                tickets: tickets.remove(&row.id).unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    order_id: Uuid,
    flight_id: Uuid,
    seat_row: i32,
    seat_number: i32,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            order_id: row.order_id,
            flight_id: row.flight_id,
            row: row.seat_row,
            seat: row.seat_number,
        }
    }
}

/// Tickets in the order their `unique_ticket` entries are claimed.
///
/// Every writer uses the same (flight, row, seat) order, so two orders that
/// overlap queue on the first shared seat instead of deadlocking.
fn lock_order(tickets: &[Ticket]) -> Vec<&Ticket> {
    let mut ordered: Vec<&Ticket> = tickets.iter().collect();
    ordered.sort_by_key(|t| (t.flight_id, t.row, t.seat));
    ordered
}

fn is_seat_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint().map_or(true, |name| name == UNIQUE_TICKET)
        }
        _ => false,
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn taken_seats(&self, flight_id: Uuid) -> RepositoryResult<HashSet<Seat>> {
        let rows = sqlx::query_as::<_, (i32, i32)>(
            "SELECT seat_row, seat_number FROM tickets WHERE flight_id = $1",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        Ok(rows.into_iter().map(|(row, seat)| Seat::new(row, seat)).collect())
    }

    async fn create_order(&self, order: NewOrder) -> RepositoryResult<Order> {
        let flight_ids: Vec<Uuid> = order.tickets.iter().map(|t| t.flight_id).collect();
        let rows: Vec<i32> = order.tickets.iter().map(|t| t.row).collect();
        let seats: Vec<i32> = order.tickets.iter().map(|t| t.seat).collect();

        // Dropping `tx` on any early return rolls the whole order back.
        let mut tx = self.pool.begin().await.map_err(RepositoryError::backend)?;

        let already_taken = sqlx::query_as::<_, (Uuid, i32, i32)>(
            r#"
            SELECT t.flight_id, t.seat_row, t.seat_number
            FROM tickets t
            JOIN UNNEST($1::uuid[], $2::int4[], $3::int4[]) AS req(flight_id, seat_row, seat_number)
              ON req.flight_id = t.flight_id
             AND req.seat_row = t.seat_row
             AND req.seat_number = t.seat_number
            LIMIT 1
            "#,
        )
        .bind(&flight_ids)
        .bind(&rows)
        .bind(&seats)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::backend)?;

        if let Some((flight_id, row, seat)) = already_taken {
            return Err(RepositoryError::SeatConflict {
                flight_id,
                seat: Seat::new(row, seat),
            });
        }

        sqlx::query("INSERT INTO orders (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(order.id)
            .bind(&order.user_id)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::backend)?;

        for ticket in lock_order(&order.tickets) {
            let inserted = sqlx::query(
                r#"
                INSERT INTO tickets (id, order_id, flight_id, seat_row, seat_number)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.order_id)
            .bind(ticket.flight_id)
            .bind(ticket.row)
            .bind(ticket.seat)
            .execute(&mut *tx)
            .await;

            // A concurrent order committed this seat after our check above.
            if let Err(err) = inserted {
                if is_seat_conflict(&err) {
                    debug!("unique_ticket rejected seat {:?} on flight {}", ticket.seat(), ticket.flight_id);
                    return Err(RepositoryError::SeatConflict {
                        flight_id: ticket.flight_id,
                        seat: ticket.seat(),
                    });
                }
                return Err(RepositoryError::backend(err));
            }
        }

        tx.commit().await.map_err(RepositoryError::backend)?;

        Ok(order.into_order())
    }

    async fn list_orders(&self, user_id: &str, page: PageRequest) -> RepositoryResult<Page<Order>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::backend)?;

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        let orders = self.attach_tickets(rows).await?;
        Ok(Page::new(page, count.max(0) as u64, orders))
    }

    async fn get_order(&self, user_id: &str, order_id: Uuid) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, created_at FROM orders WHERE id = $1 AND user_id = $2",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::backend)?;

        match row {
            Some(row) => Ok(self.attach_tickets(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}
