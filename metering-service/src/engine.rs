//! Per-meter event processing.
//!
//! Every meter gets its own task owning the `meter_core::Meter` and a single
//! event queue. Source updates, ticks and commands all travel through that
//! queue, so tariff switching and calibration are serialized with update
//! delivery per meter without any locking. Meters are independent and run
//! concurrently.

use std::collections::HashMap;

use meter_core::{Meter, MeterError, MeterSnapshot, Status};
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::pipeline::{Measurement, PipelineError, Tick};

enum MeterEvent {
    Update {
        value: Decimal,
        ts: OffsetDateTime,
    },
    Tick {
        at: OffsetDateTime,
    },
    SelectTariff {
        tariff: String,
        reply: oneshot::Sender<Result<(), MeterError>>,
    },
    Calibrate {
        tariff: String,
        value: String,
        reply: oneshot::Sender<Result<(), MeterError>>,
    },
    Read {
        reply: oneshot::Sender<MeterState>,
    },
}

/// Read model for the command surface. Totals are formatted as decimal
/// strings here; display formatting is not core logic.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TariffState {
    pub tariff: String,
    pub total: String,
    pub last_period_total: String,
    pub status: Status,
    pub period_start: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MeterState {
    pub name: String,
    pub active_tariff: String,
    pub tariffs: Vec<TariffState>,
}

/// Cheap handle for sending commands to one meter task.
#[derive(Clone)]
pub struct MeterHandle {
    name: String,
    tx: mpsc::Sender<MeterEvent>,
}

impl MeterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outer error: the meter task is gone. Inner result: the command's
    /// typed acceptance or rejection.
    pub async fn select_tariff(&self, tariff: String) -> Result<Result<(), MeterError>, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MeterEvent::SelectTariff { tariff, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn calibrate(
        &self,
        tariff: String,
        value: String,
    ) -> Result<Result<(), MeterError>, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MeterEvent::Calibrate { tariff, value, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn read(&self) -> Result<MeterState, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MeterEvent::Read { reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> PipelineError {
        PipelineError::Engine(format!("meter task {:?} is not running", self.name))
    }
}

pub struct Engine {
    handles: HashMap<String, MeterHandle>,
    by_entity: HashMap<String, Vec<mpsc::Sender<MeterEvent>>>,
}

impl Engine {
    /// Spawn one task per meter. `persist` receives a snapshot of every
    /// instance after each state-mutating event.
    pub fn start(
        meters: Vec<Meter>,
        persist: mpsc::Sender<MeterSnapshot>,
        queue_capacity: usize,
    ) -> Self {
        let mut handles = HashMap::new();
        let mut by_entity: HashMap<String, Vec<mpsc::Sender<MeterEvent>>> = HashMap::new();

        for meter in meters {
            let (tx, rx) = mpsc::channel(queue_capacity);
            handles.insert(
                meter.name().to_string(),
                MeterHandle {
                    name: meter.name().to_string(),
                    tx: tx.clone(),
                },
            );
            by_entity
                .entry(meter.source_entity().to_string())
                .or_default()
                .push(tx);
            tokio::spawn(run_meter(meter, rx, persist.clone()));
        }

        Self { handles, by_entity }
    }

    pub fn meter(&self, name: &str) -> Option<&MeterHandle> {
        self.handles.get(name)
    }

    /// Route a measurement to every meter tracking its source entity.
    pub async fn dispatch_measurement(&self, m: Measurement) {
        let Some(senders) = self.by_entity.get(&m.entity_id) else {
            debug!(entity = %m.entity_id, "measurement for unknown source entity");
            metrics::counter!("measurements_unrouted_total").increment(1);
            return;
        };
        for tx in senders {
            if tx
                .send(MeterEvent::Update { value: m.value, ts: m.ts })
                .await
                .is_err()
            {
                warn!(entity = %m.entity_id, "meter task is gone; dropping update");
            }
        }
        metrics::counter!("measurements_routed_total").increment(1);
    }

    /// Fan a tick out to every meter.
    pub async fn broadcast_tick(&self, tick: Tick) {
        for handle in self.handles.values() {
            if handle.tx.send(MeterEvent::Tick { at: tick.at }).await.is_err() {
                warn!(meter = %handle.name, "meter task is gone; dropping tick");
            }
        }
    }
}

async fn run_meter(
    mut meter: Meter,
    mut rx: mpsc::Receiver<MeterEvent>,
    persist: mpsc::Sender<MeterSnapshot>,
) {
    while let Some(event) = rx.recv().await {
        let changed = match event {
            MeterEvent::Update { value, ts } => meter.handle_source_update(value, ts),
            MeterEvent::Tick { at } => meter.handle_tick(at),
            MeterEvent::SelectTariff { tariff, reply } => {
                let res = meter.select_tariff(&tariff);
                let changed = res.is_ok();
                let _ = reply.send(res);
                changed
            }
            MeterEvent::Calibrate { tariff, value, reply } => {
                let res = meter.calibrate(&tariff, &value);
                let changed = res.is_ok();
                let _ = reply.send(res);
                changed
            }
            MeterEvent::Read { reply } => {
                let _ = reply.send(state_of(&meter));
                false
            }
        };
        if changed {
            queue_snapshots(&meter, &persist);
        }
    }
}

/// Persistence is fire-and-forget: the save hook never blocks event
/// processing. A full queue drops the write; the next mutation queues a
/// fresher snapshot anyway.
fn queue_snapshots(meter: &Meter, persist: &mpsc::Sender<MeterSnapshot>) {
    for snapshot in meter.snapshots() {
        if persist.try_send(snapshot).is_err() {
            warn!(meter = %meter.name(), "snapshot queue full; dropping write");
            metrics::counter!("snapshots_dropped_total").increment(1);
        }
    }
}

fn state_of(meter: &Meter) -> MeterState {
    MeterState {
        name: meter.name().to_string(),
        active_tariff: meter.active_tariff().to_string(),
        tariffs: meter
            .instances()
            .iter()
            .map(|i| TariffState {
                tariff: i.tariff().to_string(),
                total: i.total().to_string(),
                last_period_total: i.last_period_total().to_string(),
                status: i.status(),
                period_start: i.period_start().and_then(|t| t.format(&Rfc3339).ok()),
            })
            .collect(),
    }
}
