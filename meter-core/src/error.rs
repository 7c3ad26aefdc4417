use thiserror::Error;

/// Typed rejections for meter commands. Every command either succeeds or
/// returns one of these with no partial mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeterError {
    #[error("tariff {tariff:?} is not configured for meter {meter:?}")]
    InvalidTariff { meter: String, tariff: String },
    #[error("{value:?} is not a valid decimal value")]
    InvalidValue { value: String },
}
