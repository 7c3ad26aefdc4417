//! The meter: owns its tariff instances and the tariff register.
//!
//! A single `Meter` is the one logical owner of all events for its tariff
//! instances (updates, ticks, commands), which keeps tariff switching atomic
//! with respect to update delivery: there is no instant at which an update
//! can be applied to the wrong instance mid-switch.

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::domain::{MeterConfig, MeterSnapshot, Status};
use crate::error::MeterError;
use crate::meter::TariffMeter;

#[derive(Debug)]
pub struct Meter {
    config: MeterConfig,
    instances: Vec<TariffMeter>,
    /// Index of the collecting instance. Always valid: a meter has at least
    /// the implicit instance, and exactly one instance collects.
    active: usize,
    /// Last value observed on the source stream, independent of which tariff
    /// was collecting when it arrived. A freshly selected tariff accumulates
    /// from here, not from its own (possibly stale) last observation.
    last_source_value: Option<Decimal>,
}

impl Meter {
    pub fn new(config: MeterConfig) -> Self {
        let instances = if config.tariffs.is_empty() {
            // Implicit tariff: one always-collecting instance named after the
            // meter itself.
            vec![TariffMeter::new(
                config.name.clone(),
                config.cycle,
                config.offset,
                config.net_consumption,
                Status::Collecting,
            )]
        } else {
            config
                .tariffs
                .iter()
                .enumerate()
                .map(|(i, tariff)| {
                    let status = if i == 0 { Status::Collecting } else { Status::Paused };
                    TariffMeter::new(
                        tariff.clone(),
                        config.cycle,
                        config.offset,
                        config.net_consumption,
                        status,
                    )
                })
                .collect()
        };

        Self {
            config,
            instances,
            active: 0,
            last_source_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn source_entity(&self) -> &str {
        &self.config.source_entity
    }

    pub fn instances(&self) -> &[TariffMeter] {
        &self.instances
    }

    pub fn active_tariff(&self) -> &str {
        self.instances[self.active].tariff()
    }

    pub fn instance(&self, tariff: &str) -> Option<&TariffMeter> {
        self.instances.iter().find(|i| i.tariff() == tariff)
    }

    /// Switch the collecting tariff. Pauses the previous instance and sets
    /// the target collecting; totals are never touched. Selecting the tariff
    /// that is already active is a no-op. Meters without configured tariffs
    /// reject every selection.
    pub fn select_tariff(&mut self, tariff: &str) -> Result<(), MeterError> {
        let Some(idx) = self.config.tariffs.iter().position(|t| t == tariff) else {
            return Err(MeterError::InvalidTariff {
                meter: self.config.name.clone(),
                tariff: tariff.to_string(),
            });
        };
        if idx != self.active {
            self.instances[self.active].pause();
            self.instances[idx].collect();
            self.active = idx;
        }
        Ok(())
    }

    /// Route a source reading to the collecting instance. Returns whether any
    /// state changed.
    pub fn handle_source_update(&mut self, value: Decimal, ts: OffsetDateTime) -> bool {
        let prev = self.last_source_value.replace(value);
        self.instances[self.active].apply_update(prev, value, ts)
    }

    /// Fan a tick out to every instance; self-resets apply uniformly to
    /// collecting and paused tariffs. Returns whether any state changed.
    pub fn handle_tick(&mut self, now: OffsetDateTime) -> bool {
        let mut changed = false;
        for instance in &mut self.instances {
            changed |= instance.handle_tick(now);
        }
        changed
    }

    /// Overwrite one instance's total with a caller-supplied decimal string.
    pub fn calibrate(&mut self, tariff: &str, raw_value: &str) -> Result<(), MeterError> {
        let value: Decimal = raw_value.trim().parse().map_err(|_| MeterError::InvalidValue {
            value: raw_value.to_string(),
        })?;
        let instance = self
            .instances
            .iter_mut()
            .find(|i| i.tariff() == tariff)
            .ok_or_else(|| MeterError::InvalidTariff {
                meter: self.config.name.clone(),
                tariff: tariff.to_string(),
            })?;
        instance.calibrate(value);
        Ok(())
    }

    pub fn snapshots(&self) -> Vec<MeterSnapshot> {
        self.instances
            .iter()
            .map(|i| i.snapshot(&self.config.name))
            .collect()
    }

    pub(crate) fn instances_mut(&mut self) -> &mut [TariffMeter] {
        &mut self.instances
    }

    pub(crate) fn set_active(&mut self, idx: usize) {
        self.active = idx;
    }

    pub(crate) fn seed_last_source_value(&mut self, value: Option<Decimal>) {
        self.last_source_value = value;
    }
}
