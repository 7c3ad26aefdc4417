use meter_core::{MeterSnapshot, Status};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use super::SnapshotStore;
use crate::pipeline::PipelineError;

/// Snapshot persistence on Postgres, one row per (meter, tariff) pair.
pub struct PgSnapshotStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    meter: String,
    tariff: String,
    total: Decimal,
    last_period_total: Decimal,
    status: String,
    period_start: Option<OffsetDateTime>,
    last_source_value: Option<Decimal>,
    last_source_update: Option<OffsetDateTime>,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meter_snapshots (
                meter TEXT NOT NULL,
                tariff TEXT NOT NULL,
                total NUMERIC NOT NULL,
                last_period_total NUMERIC NOT NULL,
                status TEXT NOT NULL,
                period_start TIMESTAMPTZ,
                last_source_value NUMERIC,
                last_source_update TIMESTAMPTZ,
                PRIMARY KEY (meter, tariff)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> PipelineError {
    PipelineError::Store(e.to_string())
}

fn status_to_str(status: Status) -> &'static str {
    match status {
        Status::Collecting => "collecting",
        Status::Paused => "paused",
    }
}

fn status_from_str(raw: &str) -> Result<Status, PipelineError> {
    match raw {
        "collecting" => Ok(Status::Collecting),
        "paused" => Ok(Status::Paused),
        other => Err(PipelineError::Store(format!("unknown status {other:?}"))),
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn load_all(&self) -> Result<Vec<MeterSnapshot>, PipelineError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT
                meter,
                tariff,
                total,
                last_period_total,
                status,
                period_start,
                last_source_value,
                last_source_update
            FROM meter_snapshots
            ORDER BY meter, tariff
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter()
            .map(|r| {
                Ok(MeterSnapshot {
                    meter: r.meter,
                    tariff: r.tariff,
                    total: r.total,
                    last_period_total: r.last_period_total,
                    status: status_from_str(&r.status)?,
                    period_start: r.period_start,
                    last_source_value: r.last_source_value,
                    last_source_update: r.last_source_update,
                })
            })
            .collect()
    }

    async fn save(&self, snapshot: &MeterSnapshot) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO meter_snapshots (
                meter, tariff, total, last_period_total, status,
                period_start, last_source_value, last_source_update
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (meter, tariff) DO UPDATE SET
                total = EXCLUDED.total,
                last_period_total = EXCLUDED.last_period_total,
                status = EXCLUDED.status,
                period_start = EXCLUDED.period_start,
                last_source_value = EXCLUDED.last_source_value,
                last_source_update = EXCLUDED.last_source_update
            "#,
        )
        .bind(&snapshot.meter)
        .bind(&snapshot.tariff)
        .bind(snapshot.total)
        .bind(snapshot.last_period_total)
        .bind(status_to_str(snapshot.status))
        .bind(snapshot.period_start)
        .bind(snapshot.last_source_value)
        .bind(snapshot.last_source_update)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_text_form() {
        for status in [Status::Collecting, Status::Paused] {
            let parsed = status_from_str(status_to_str(status)).expect("known status");
            assert_eq!(parsed, status);
        }
        assert!(status_from_str("archived").is_err());
    }
}
