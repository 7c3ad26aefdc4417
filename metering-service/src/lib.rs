pub mod api;
pub mod config;
pub mod engine;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;

pub use pipeline::{Envelope, Measurement, Tick};
