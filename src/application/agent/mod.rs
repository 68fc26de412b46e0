pub mod collector;
pub mod dispatcher;
pub mod runner;
pub mod sender;

pub use collector::MetricsCollector;
pub use dispatcher::{DispatchError, Dispatcher, DispatcherState, JobOutcome};
pub use runner::AgentRunner;
pub use sender::MetricSender;
