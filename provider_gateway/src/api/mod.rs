//! HTTP surface of the gateway.

pub mod errors;
pub mod handlers;
pub mod server;
pub mod validation;

pub use server::{create_router, start_server, AppState};
