// API module
//
// Thin HTTP layer over the blockchain and wallet modules

pub mod handlers;
pub mod routes;
pub mod schema;

// Re-export main components for easier access
pub use routes::configure_routes;
