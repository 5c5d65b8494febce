pub mod audit;
pub mod error;
pub mod handlers;
pub mod history;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod tickets;
pub mod ws;

pub use routes::create_router;
