//! HTTP API surface.
//!
//! Read-only status endpoints plus the manual per-feed trigger, intended
//! for an external presentation layer. The trigger shares the engine's
//! single-flight permit and answers 409 while a flow is in flight.

use crate::service::ServiceContext;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use relayer_core::TriggerError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
struct AppState {
	context: Arc<ServiceContext>,
}

pub async fn serve(context: Arc<ServiceContext>, port: u16) -> anyhow::Result<()> {
	let app = Router::new()
		.route("/health", get(health))
		.route("/status", get(status))
		.route("/feeds", get(feeds))
		.route("/logs", get(logs))
		.route("/feeds/{alias}/trigger", post(trigger))
		.with_state(AppState { context })
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive());

	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
	info!("API server listening on port {}", port);

	axum::serve(listener, app).await?;
	Ok(())
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn status(State(state): State<AppState>) -> Json<Value> {
	let snapshot = state.context.engine.snapshot();
	Json(json!({ "state": snapshot }))
}

async fn feeds(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, String)> {
	let feeds = state
		.context
		.feeds
		.load_active()
		.await
		.map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
	Ok(Json(json!({ "feeds": feeds })))
}

#[derive(Deserialize)]
struct LogsQuery {
	#[serde(default = "default_log_limit")]
	limit: usize,
}

fn default_log_limit() -> usize {
	100
}

async fn logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> Json<Value> {
	let records = state.context.engine.sink().recent(query.limit);
	Json(json!({ "logs": records }))
}

async fn trigger(
	State(state): State<AppState>,
	Path(alias): Path<String>,
) -> Result<Json<Value>, (StatusCode, String)> {
	match state.context.engine.trigger(&alias).await {
		Ok(outcome) => Ok(Json(json!({
			"alias": alias,
			"price_e6": outcome.price_e6,
			"tx_hash": outcome.receipt.map(|r| r.hash.to_string()),
		}))),
		Err(TriggerError::Busy) => Err((
			StatusCode::CONFLICT,
			"a flow is already in flight".to_string(),
		)),
		Err(TriggerError::UnknownFeed(alias)) => {
			Err((StatusCode::NOT_FOUND, format!("unknown feed: {}", alias)))
		}
		Err(other) => Err((StatusCode::BAD_GATEWAY, other.to_string())),
	}
}
