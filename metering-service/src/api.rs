//! Command and read surface for collaborators.
//!
//! Commands are forwarded to the owning meter task, so they are serialized
//! with source updates and ticks; the handlers here only translate typed
//! rejections into HTTP responses.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use meter_core::MeterError;

use crate::engine::{Engine, MeterHandle, MeterState};

#[derive(Deserialize)]
pub struct SelectTariffRequest {
    pub tariff: String,
}

#[derive(Deserialize)]
pub struct CalibrateRequest {
    /// Decimal as a JSON string or number. Anything else fails the core's
    /// decimal parse and comes back as InvalidValue.
    pub value: Value,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/meters/:name", get(read_meter))
        .route("/meters/:name/select_tariff", post(select_tariff))
        .route("/meters/:name/tariffs/:tariff/calibrate", post(calibrate))
        .with_state(engine)
}

type ApiError = (StatusCode, Json<Value>);

fn not_found(name: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown meter {name:?}") })),
    )
}

fn engine_unavailable() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "meter is not running" })),
    )
}

fn rejection(err: MeterError) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
}

fn handle<'a>(engine: &'a Engine, name: &str) -> Result<&'a MeterHandle, ApiError> {
    engine.meter(name).ok_or_else(|| not_found(name))
}

async fn read_meter(
    State(engine): State<Arc<Engine>>,
    Path(name): Path<String>,
) -> Result<Json<MeterState>, ApiError> {
    let state = handle(&engine, &name)?
        .read()
        .await
        .map_err(|_| engine_unavailable())?;
    Ok(Json(state))
}

async fn select_tariff(
    State(engine): State<Arc<Engine>>,
    Path(name): Path<String>,
    Json(req): Json<SelectTariffRequest>,
) -> Result<StatusCode, ApiError> {
    handle(&engine, &name)?
        .select_tariff(req.tariff)
        .await
        .map_err(|_| engine_unavailable())?
        .map_err(rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn calibrate(
    State(engine): State<Arc<Engine>>,
    Path((name, tariff)): Path<(String, String)>,
    Json(req): Json<CalibrateRequest>,
) -> Result<StatusCode, ApiError> {
    let raw = match req.value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    handle(&engine, &name)?
        .calibrate(tariff, raw)
        .await
        .map_err(|_| engine_unavailable())?
        .map_err(rejection)?;
    Ok(StatusCode::NO_CONTENT)
}
