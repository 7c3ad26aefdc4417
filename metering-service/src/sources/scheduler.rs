use std::time::{Duration, SystemTime};

use futures::{Stream, StreamExt};
use time::OffsetDateTime;
use tokio_stream::wrappers::IntervalStream;

use crate::pipeline::{Envelope, PipelineError, Source, Tick};

/// Periodic tick source. The engine does not own a timer; this source pushes
/// wall-clock ticks at a fixed cadence so every meter can check its cycle
/// boundary.
pub struct TickSource {
    period: Duration,
}

impl TickSource {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait::async_trait]
impl Source<Tick> for TickSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<Tick>, PipelineError>> + Send>> {
        // The first tick fires immediately and doubles as the system-started
        // signal that establishes every instance's period start.
        let interval = tokio::time::interval(self.period);
        let stream = IntervalStream::new(interval).map(|_| {
            Ok(Envelope {
                payload: Tick {
                    at: OffsetDateTime::now_utc(),
                },
                received_at: SystemTime::now(),
            })
        });
        Box::pin(stream)
    }
}
