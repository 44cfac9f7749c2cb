//! HTTP API for predictions, history, health checks and Prometheus metrics

use aqi_engine::{
    history::DEFAULT_RECENT_LIMIT, AqiCategory, AqiPredictor, DualPrediction, EngineError,
    EngineMetrics, FeatureVector, LazyPredictor, ModelVariant, Prediction, PredictionHistory,
    PredictionRecord, StructuredLogger,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<LazyPredictor>,
    pub history: Arc<dyn PredictionHistory>,
    pub metrics: EngineMetrics,
    pub logger: StructuredLogger,
    pub page_size: usize,
}

impl AppState {
    pub fn new(
        predictor: Arc<LazyPredictor>,
        history: Arc<dyn PredictionHistory>,
        metrics: EngineMetrics,
        page_size: usize,
    ) -> Self {
        Self {
            predictor,
            history,
            metrics,
            logger: StructuredLogger::new("aqi-server"),
            page_size,
        }
    }

    /// The loaded predictor, loading artifacts first if needed
    pub async fn predictor(&self) -> Result<Arc<AqiPredictor>, ApiError> {
        if self.predictor.is_loaded() {
            return self.predictor.get().map_err(ApiError::from);
        }

        let lazy = Arc::clone(&self.predictor);
        let loaded = tokio::task::spawn_blocking(move || lazy.get())
            .await
            .map_err(|e| ApiError::Internal(format!("model loading task failed: {}", e)))?;
        loaded.map_err(ApiError::from)
    }
}

/// Error returned from a handler, rendered as `{ "success": false, "error": ... }`
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::ModelsUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Engine(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Engine(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct DualPredictions {
    linear_regression: Prediction,
    decision_tree: Prediction,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    success: bool,
    predictions: DualPredictions,
    difference: f64,
}

impl From<DualPrediction> for PredictResponse {
    fn from(p: DualPrediction) -> Self {
        Self {
            success: true,
            predictions: DualPredictions {
                linear_regression: p.linear,
                decision_tree: p.tree,
            },
            difference: p.difference,
        }
    }
}

#[derive(Debug, Serialize)]
struct SinglePredictResponse {
    success: bool,
    model: ModelVariant,
    prediction: Prediction,
}

#[derive(Debug, Serialize)]
struct HistoryItem {
    timestamp: DateTime<Utc>,
    features: FeatureVector,
    linear_aqi: f64,
    linear_category: AqiCategory,
    tree_aqi: f64,
    tree_category: AqiCategory,
    difference: f64,
}

impl From<PredictionRecord> for HistoryItem {
    fn from(r: PredictionRecord) -> Self {
        Self {
            difference: r.difference(),
            linear_category: AqiCategory::categorize(r.linear_aqi),
            tree_category: AqiCategory::categorize(r.tree_aqi),
            timestamp: r.timestamp,
            features: r.features,
            linear_aqi: r.linear_aqi,
            tree_aqi: r.tree_aqi,
        }
    }
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    success: bool,
    page: usize,
    per_page: usize,
    total: usize,
    total_pages: usize,
    items: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    training_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Predict with both models and record the result
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FeatureVector>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(features) = body.inspect_err(|_| state.metrics.inc_prediction_errors())?;
    let predictor = state.predictor().await?;

    let prediction = predictor.predict_both(&features);
    state.history.append(PredictionRecord::new(
        features,
        prediction.linear.aqi,
        prediction.tree.aqi,
    ));
    state.logger.log_prediction(&features, &prediction);

    Ok(Json(PredictResponse::from(prediction)))
}

/// Predict with a single model chosen by path segment
async fn predict_variant(
    State(state): State<Arc<AppState>>,
    Path(variant): Path<String>,
    body: Result<Json<FeatureVector>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let variant = variant
        .parse::<ModelVariant>()
        .inspect_err(|_| state.metrics.inc_prediction_errors())?;
    let Json(features) = body.inspect_err(|_| state.metrics.inc_prediction_errors())?;
    let predictor = state.predictor().await?;

    Ok(Json(SinglePredictResponse {
        success: true,
        model: variant,
        prediction: Prediction::new(predictor.predict(&features, variant)),
    }))
}

/// Paginated history, newest first. Unparseable page numbers serve page 1.
async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let number = params
        .page
        .and_then(|p| p.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let page = state.history.page(number, state.page_size);

    Json(HistoryResponse {
        success: true,
        page: page.page,
        per_page: page.per_page,
        total: page.total,
        total_pages: page.total_pages,
        items: page.items.into_iter().map(HistoryItem::from).collect(),
    })
}

/// Most recent predictions for the dashboard
async fn recent_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let items: Vec<HistoryItem> = state
        .history
        .recent(limit)
        .into_iter()
        .map(HistoryItem::from)
        .collect();
    Json(json!({ "success": true, "items": items }))
}

/// Liveness: the process is up and serving
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Readiness check response - returns 200 once models are loaded, 503 otherwise
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status_code, readiness) = match state.predictor().await {
        Ok(predictor) => (
            StatusCode::OK,
            ReadinessResponse {
                ready: true,
                training_id: predictor.training_id().map(str::to_string),
                reason: None,
            },
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ReadinessResponse {
                ready: false,
                training_id: None,
                reason: Some(e.message()),
            },
        ),
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/predict/:variant", post(predict_variant))
        .route("/api/v1/history", get(history))
        .route("/api/v1/history/recent", get(recent_history))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
