use std::{net::SocketAddr, sync::Arc, time::SystemTime};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::pipeline::{Envelope, Measurement, PipelineError, Source};

#[derive(Clone)]
struct SharedSender {
    tx: mpsc::Sender<Envelope<Measurement>>,
}

/// Inbound measurement feed: accepts batches of readings over HTTP and
/// exposes them as a stream. Malformed readings are rejected here, at the
/// boundary; the engine only ever sees well-formed decimal values.
#[derive(Clone)]
pub struct HttpMeasurementSource {
    receiver: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<Envelope<Measurement>>>>>,
}

#[derive(serde::Deserialize)]
struct IncomingMeasurement {
    entity_id: String,
    /// Decimal as a JSON string or number. Parsed via the literal text so
    /// binary float rounding never leaks into the totals.
    value: serde_json::Value,
    unit: String,
    #[serde(with = "time::serde::rfc3339")]
    ts: time::OffsetDateTime,
}

fn parse_decimal(raw: &serde_json::Value) -> Option<Decimal> {
    match raw {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

impl HttpMeasurementSource {
    pub async fn new(bind_addr: &str, channel_capacity: usize) -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let shared = SharedSender { tx };

        let app = Router::new()
            .route("/ingest/measurements", post(ingest_measurements))
            .with_state(shared.clone());

        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| PipelineError::Source(format!("invalid bind addr: {e}")))?;

        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                        tracing::error!(error = %e, "measurement source server error");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to bind measurement source listener");
                }
            }
        });

        Ok(Self {
            receiver: Arc::new(tokio::sync::Mutex::new(Some(rx))),
        })
    }
}

#[async_trait::async_trait]
impl Source<Measurement> for HttpMeasurementSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<
        Box<dyn Stream<Item = Result<Envelope<Measurement>, PipelineError>> + Send>,
    > {
        let mut guard = self.receiver.lock().await;
        let rx = guard
            .take()
            .expect("HttpMeasurementSource stream already taken; only one consumer supported");

        let stream = ReceiverStream::new(rx).map(Ok);
        Box::pin(stream)
    }
}

async fn ingest_measurements(
    State(sender): State<SharedSender>,
    Json(payload): Json<Vec<IncomingMeasurement>>,
) -> Result<(), StatusCode> {
    metrics::counter!("measurement_requests_total").increment(1);

    for incoming in payload {
        let Some(value) = parse_decimal(&incoming.value) else {
            metrics::counter!("measurements_rejected_total").increment(1);
            return Err(StatusCode::BAD_REQUEST);
        };
        if incoming.unit.is_empty() {
            metrics::counter!("measurements_rejected_total").increment(1);
            return Err(StatusCode::BAD_REQUEST);
        }

        let env = Envelope {
            payload: Measurement {
                entity_id: incoming.entity_id,
                value,
                unit: incoming.unit,
                ts: incoming.ts,
            },
            received_at: SystemTime::now(),
        };

        if sender.tx.send(env).await.is_err() {
            // Channel closed; treat as server error
            metrics::counter!("measurements_failed_total").increment(1);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_number_values() {
        assert_eq!(
            parse_decimal(&serde_json::json!("0.123")),
            Some("0.123".parse().unwrap())
        );
        assert_eq!(
            parse_decimal(&serde_json::json!(" 42 ")),
            Some("42".parse().unwrap())
        );
        assert_eq!(
            parse_decimal(&serde_json::json!(0.123)),
            Some("0.123".parse().unwrap())
        );
        assert_eq!(parse_decimal(&serde_json::json!(6)), Some("6".parse().unwrap()));
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert_eq!(parse_decimal(&serde_json::json!("not a number")), None);
        assert_eq!(parse_decimal(&serde_json::json!(null)), None);
        assert_eq!(parse_decimal(&serde_json::json!([1, 2])), None);
    }
}
