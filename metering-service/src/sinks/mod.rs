pub mod postgres;

pub use postgres::PgSnapshotStore;

use std::{sync::Arc, time::Duration};

use meter_core::MeterSnapshot;
use tokio::sync::mpsc;

use crate::pipeline::PipelineError;

/// Persistence contract for tariff meter instance snapshots. The engine only
/// depends on this trait; the Postgres implementation lives next door and
/// tests substitute their own.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<MeterSnapshot>, PipelineError>;
    async fn save(&self, snapshot: &MeterSnapshot) -> Result<(), PipelineError>;
}

/// Drain the snapshot queue into the store, retrying with linear backoff.
/// A snapshot is abandoned after `max_retries`; the next mutation queues a
/// fresher one.
pub async fn run_persister(
    store: Arc<dyn SnapshotStore>,
    mut rx: mpsc::Receiver<MeterSnapshot>,
    max_retries: u32,
    retry_backoff: Duration,
) {
    while let Some(snapshot) = rx.recv().await {
        let mut attempt: u32 = 0;
        loop {
            match store.save(&snapshot).await {
                Ok(()) => {
                    metrics::counter!("snapshots_saved_total").increment(1);
                    break;
                }
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "snapshot save failed, retrying with backoff"
                    );
                    tokio::time::sleep(retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        meter = %snapshot.meter,
                        tariff = %snapshot.tariff,
                        "snapshot save failed, giving up"
                    );
                    metrics::counter!("snapshot_store_errors_total").increment(1);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_core::Status;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    struct RecordingStore {
        saved: Mutex<Vec<MeterSnapshot>>,
    }

    #[async_trait::async_trait]
    impl SnapshotStore for RecordingStore {
        async fn load_all(&self) -> Result<Vec<MeterSnapshot>, PipelineError> {
            Ok(self.saved.lock().expect("lock poisoned").clone())
        }

        async fn save(&self, snapshot: &MeterSnapshot) -> Result<(), PipelineError> {
            self.saved.lock().expect("lock poisoned").push(snapshot.clone());
            Ok(())
        }
    }

    fn snapshot(tariff: &str) -> MeterSnapshot {
        MeterSnapshot {
            meter: "energy_bill".into(),
            tariff: tariff.into(),
            total: Decimal::ZERO,
            last_period_total: Decimal::ZERO,
            status: Status::Collecting,
            period_start: None,
            last_source_value: None,
            last_source_update: None,
        }
    }

    #[tokio::test]
    async fn persister_drains_the_queue_in_order() {
        let store = Arc::new(RecordingStore { saved: Mutex::new(Vec::new()) });
        let (tx, rx) = mpsc::channel(16);

        tx.send(snapshot("onpeak")).await.expect("queue open");
        tx.send(snapshot("offpeak")).await.expect("queue open");
        drop(tx);

        run_persister(store.clone(), rx, 0, Duration::from_millis(1)).await;

        let saved = store.saved.lock().expect("lock poisoned");
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].tariff, "onpeak");
        assert_eq!(saved[1].tariff, "offpeak");
    }
}
