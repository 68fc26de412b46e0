pub mod bootstrap;
pub mod checkpoint;
pub mod service;

pub use bootstrap::CollectorApplication;
pub use checkpoint::Checkpointer;
pub use service::{CollectorError, MetricService};
