use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Billing period granularity after which a meter's total resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cycle {
    None,
    QuarterHourly,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Bimonthly,
    Quarterly,
    Biannually,
    Yearly,
}

impl Default for Cycle {
    fn default() -> Self {
        Cycle::None
    }
}

/// Shift of the period boundary forward from the calendar-aligned instant,
/// expressed as whole days plus a sub-day remainder in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOffset {
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub seconds: i64,
}

impl CycleOffset {
    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.seconds == 0
    }

    pub fn as_duration(&self) -> time::Duration {
        time::Duration::days(self.days) + time::Duration::seconds(self.seconds)
    }
}

/// One configured logical meter tracking one source measurement stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    pub name: String,
    pub source_entity: String,
    /// Ordered tariff names. Empty means a single implicit tariff with no
    /// tariff selection surface.
    #[serde(default)]
    pub tariffs: Vec<String>,
    #[serde(default)]
    pub cycle: Cycle,
    #[serde(default)]
    pub offset: CycleOffset,
    #[serde(default)]
    pub net_consumption: bool,
}

/// Collection state of one tariff meter instance. At most one instance per
/// meter is collecting at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Collecting,
    Paused,
}

/// Persisted state of one tariff meter instance. Loaded verbatim on restore;
/// the first tick afterwards performs any reset missed while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub meter: String,
    /// Tariff name; the implicit instance of a tariff-less meter uses the
    /// meter name itself.
    pub tariff: String,
    pub total: Decimal,
    pub last_period_total: Decimal,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339::option")]
    pub period_start: Option<OffsetDateTime>,
    pub last_source_value: Option<Decimal>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_source_update: Option<OffsetDateTime>,
}
