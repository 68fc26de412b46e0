//! Collector HTTP surface.
//!
//! Routing and middleware live in [`router`]; handlers decode requests and
//! delegate to [`MetricService`](crate::application::collector::MetricService).

pub mod error;
pub mod handlers;
pub mod listing;
pub mod router;

pub use error::ApiError;
pub use router::{AppState, router};
