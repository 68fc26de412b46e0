// Collector HTTP surface
pub mod http;
