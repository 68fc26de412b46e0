// Agent side: polling, reporting and the bounded dispatcher
pub mod agent;

// Collector side: metric use cases and server wiring
pub mod collector;
