//! Per-tariff accumulation state machine.

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::accumulator;
use crate::cycle;
use crate::domain::{Cycle, CycleOffset, MeterSnapshot, Status};

/// Accumulation state for one tariff of a meter (or the sole implicit
/// tariff). All mutation goes through the parent [`crate::Meter`], which
/// serializes events and enforces tariff mutual exclusion.
#[derive(Debug, Clone)]
pub struct TariffMeter {
    tariff: String,
    cycle: Cycle,
    offset: CycleOffset,
    net_consumption: bool,
    total: Decimal,
    last_period_total: Decimal,
    last_source_value: Option<Decimal>,
    last_source_update: Option<OffsetDateTime>,
    period_start: Option<OffsetDateTime>,
    status: Status,
}

impl TariffMeter {
    pub(crate) fn new(
        tariff: String,
        cycle: Cycle,
        offset: CycleOffset,
        net_consumption: bool,
        status: Status,
    ) -> Self {
        Self {
            tariff,
            cycle,
            offset,
            net_consumption,
            total: Decimal::ZERO,
            last_period_total: Decimal::ZERO,
            last_source_value: None,
            last_source_update: None,
            period_start: None,
            status,
        }
    }

    /// Apply one source reading. `prev` is the last value observed on the
    /// source stream, tracked by the parent meter; it may predate this
    /// instance's own last observation if the instance was paused in between.
    ///
    /// Returns whether state changed (paused instances ignore updates).
    pub(crate) fn apply_update(
        &mut self,
        prev: Option<Decimal>,
        value: Decimal,
        ts: OffsetDateTime,
    ) -> bool {
        if self.status == Status::Paused {
            return false;
        }
        self.total += accumulator::delta(prev, value, self.net_consumption);
        self.last_source_value = Some(value);
        self.last_source_update = Some(ts);
        true
    }

    /// Evaluate the cycle boundary at `now`. The first tick only establishes
    /// the period start; a changed boundary afterwards performs a self-reset.
    /// Runs regardless of collecting/paused status.
    ///
    /// Returns whether state changed.
    pub(crate) fn handle_tick(&mut self, now: OffsetDateTime) -> bool {
        let Some(new_boundary) = cycle::boundary(self.cycle, self.offset, now) else {
            return false;
        };
        match self.period_start {
            None => {
                self.period_start = Some(new_boundary);
                true
            }
            Some(current) if current != new_boundary => {
                self.last_period_total = self.total;
                self.total = Decimal::ZERO;
                self.period_start = Some(new_boundary);
                true
            }
            Some(_) => false,
        }
    }

    /// Overwrite the running total. Leaves `last_period_total`, the last
    /// source value and the period start untouched.
    pub(crate) fn calibrate(&mut self, new_total: Decimal) {
        self.total = new_total;
    }

    pub(crate) fn pause(&mut self) {
        self.status = Status::Paused;
    }

    pub(crate) fn collect(&mut self) {
        self.status = Status::Collecting;
    }

    pub(crate) fn restore_from(&mut self, snapshot: &MeterSnapshot) {
        self.total = snapshot.total;
        self.last_period_total = snapshot.last_period_total;
        self.status = snapshot.status;
        self.period_start = snapshot.period_start;
        self.last_source_value = snapshot.last_source_value;
        self.last_source_update = snapshot.last_source_update;
    }

    pub fn snapshot(&self, meter: &str) -> MeterSnapshot {
        MeterSnapshot {
            meter: meter.to_string(),
            tariff: self.tariff.clone(),
            total: self.total,
            last_period_total: self.last_period_total,
            status: self.status,
            period_start: self.period_start,
            last_source_value: self.last_source_value,
            last_source_update: self.last_source_update,
        }
    }

    pub fn tariff(&self) -> &str {
        &self.tariff
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn last_period_total(&self) -> Decimal {
        self.last_period_total
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn period_start(&self) -> Option<OffsetDateTime> {
        self.period_start
    }

    pub fn last_source_value(&self) -> Option<Decimal> {
        self.last_source_value
    }

    pub fn last_source_update(&self) -> Option<OffsetDateTime> {
        self.last_source_update
    }
}
