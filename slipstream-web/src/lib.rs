//! HTTP surface for Slipstream: session endpoints, range-capable direct
//! delivery, and the chunked remux path.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, router, run_server};
