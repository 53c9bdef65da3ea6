pub mod downloads;
pub mod handlers;
pub mod items;
pub mod routes;
pub mod stream;
pub mod ws;

pub use routes::create_router;
