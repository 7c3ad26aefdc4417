pub mod http_json;
pub mod scheduler;

pub use http_json::HttpMeasurementSource;
pub use scheduler::TickSource;
