// Metric value object
pub mod metric;

// Wire format and integrity digest
pub mod message;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
