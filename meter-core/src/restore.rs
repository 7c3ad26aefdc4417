//! Startup reconciliation of persisted snapshots with live configuration.
//!
//! Snapshots load verbatim: no missed boundary is recomputed here. The first
//! tick after restore re-evaluates the period start against the current time
//! and performs any reset that was crossed while offline, through the normal
//! tick path.

use tracing::warn;

use crate::domain::{MeterConfig, MeterSnapshot, Status};
use crate::register::Meter;

/// Build a meter from configuration and whatever snapshots survive it.
///
/// Policy for config drift: a snapshot whose tariff no longer exists in the
/// configuration is dropped with a warning. If no surviving snapshot is
/// collecting, the first configured tariff collects (the construction
/// default).
pub fn reconcile(config: MeterConfig, snapshots: &[MeterSnapshot]) -> Meter {
    let mut meter = Meter::new(config);

    let meter_name = meter.name().to_string();
    for snapshot in snapshots.iter().filter(|s| s.meter == meter_name) {
        let Some(idx) = meter
            .instances()
            .iter()
            .position(|i| i.tariff() == snapshot.tariff)
        else {
            warn!(
                meter = %meter.name(),
                tariff = %snapshot.tariff,
                "persisted snapshot names a tariff no longer in configuration; dropping it"
            );
            continue;
        };
        meter.instances_mut()[idx].restore_from(snapshot);
    }

    enforce_mutual_exclusion(&mut meter);

    // Seed the stream-level last value from the collecting instance so the
    // first post-restore reading yields a delta instead of a fresh baseline.
    let seed = meter
        .instance(meter.active_tariff())
        .and_then(|i| i.last_source_value());
    meter.seed_last_source_value(seed);

    meter
}

fn enforce_mutual_exclusion(meter: &mut Meter) {
    let collecting: Vec<usize> = meter
        .instances()
        .iter()
        .enumerate()
        .filter(|(_, i)| i.status() == Status::Collecting)
        .map(|(idx, _)| idx)
        .collect();

    match collecting.as_slice() {
        [only] => meter.set_active(*only),
        [] => {
            // Either nothing was persisted as collecting or those snapshots
            // were dropped: fall back to the first instance.
            meter.instances_mut()[0].collect();
            meter.set_active(0);
        }
        [first, rest @ ..] => {
            warn!(
                meter = %meter.name(),
                "multiple persisted instances were collecting; keeping the first"
            );
            for idx in rest {
                meter.instances_mut()[*idx].pause();
            }
            meter.set_active(*first);
        }
    }
}
