//! Gateway: HTTP server receiving LINE webhooks.
//!
//! Single port serves the health probe and the webhook route.

mod server;

pub use server::{router, run_gateway, GatewayState};
