pub mod app_config;
pub mod database;
pub mod flight_repo;
pub mod memory;
pub mod order_repo;

pub use database::DbClient;
pub use flight_repo::PostgresFlightRepository;
pub use memory::InMemoryStore;
pub use order_repo::PostgresOrderRepository;
