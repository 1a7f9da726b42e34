//! HTTP control surface
//!
//! REST endpoints for sessions, transport control, saved sections and stored
//! defaults, plus an SSE stream of session events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
