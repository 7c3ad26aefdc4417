pub mod accumulator;
pub mod cycle;
pub mod domain;
pub mod error;
pub mod meter;
pub mod register;
pub mod restore;

pub use domain::{Cycle, CycleOffset, MeterConfig, MeterSnapshot, Status};
pub use error::MeterError;
pub use meter::TariffMeter;
pub use register::Meter;
