use std::{pin::Pin, time::SystemTime};

use futures::Stream;
use rust_decimal::Decimal;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

/// One reading pushed by the external measurement feed. The value has already
/// been parsed to a decimal at the feed boundary; the engine trusts it.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub entity_id: String,
    pub value: Decimal,
    pub unit: String,
    pub ts: OffsetDateTime,
}

/// Wall-clock tick from the scheduler source.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub at: OffsetDateTime,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}
