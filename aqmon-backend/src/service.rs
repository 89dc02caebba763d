//! HTTP control surface: the event source for the interaction dispatcher and
//! a read side for the current dashboard.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use aqmon_common::QualityLevel;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::module::dashboard::{Dashboard, DashboardView};
use crate::module::dispatcher::{DispatchOutcome, DispatcherOptions, Interaction, InteractionDispatcher};
use crate::module::feed::PageFetcher;
use crate::module::filter::{FilterModel, FilterState, parse_quality, parse_region};
use crate::module::geolocation::GeolocationProvider;
use crate::module::projector::{Surfaces, ViewProjector};
use crate::module::renderer::DashboardRenderer;
use crate::module::snapshot::SnapshotStore;
use crate::module::status::{StatusBoard, StatusView};
use crate::module::sync::{SyncController, SyncStatus};

/// Everything the handlers and the scheduled tasks share.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<InteractionDispatcher>,
    pub dashboard: Arc<Dashboard>,
    pub filter: Arc<RwLock<FilterModel>>,
    pub status: Arc<StatusBoard>,
    pub renderer: Arc<DashboardRenderer>,
}

impl AppState {
    /// Wire the ingestion core to an in-memory dashboard.
    pub fn build(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        geolocation: Arc<dyn GeolocationProvider>,
    ) -> Self {
        let dashboard = Arc::new(Dashboard::new());
        let store = Arc::new(RwLock::new(SnapshotStore::new()));
        let filter = Arc::new(RwLock::new(FilterModel::new()));
        let status = Arc::new(StatusBoard::new());
        let projector = Arc::new(ViewProjector::new(
            Surfaces::single(dashboard.clone()),
            config.view.list_cap,
        ));
        let sync = Arc::new(SyncController::new(
            fetcher,
            config.initial_url(),
            store.clone(),
            filter.clone(),
            projector.clone(),
            status.clone(),
        ));
        let dispatcher = Arc::new(InteractionDispatcher::new(
            sync,
            store,
            filter.clone(),
            projector,
            status.clone(),
            geolocation,
            DispatcherOptions::from_config(config),
        ));
        let renderer = Arc::new(DashboardRenderer::new(&config.media.image_dir, &config.media.fonts_dir));

        Self {
            dispatcher,
            dashboard,
            filter,
            status,
            renderer,
        }
    }
}

pub struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub dashboard: DashboardView,
    pub filter: FilterState,
    pub sync: SyncStatus,
    pub status: StatusView,
    pub tour: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterRequest {
    pub region: Option<String>,
    pub quality: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartClickRequest {
    /// Missing or null is a background click.
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TourRequest {
    pub enabled: bool,
}

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.renderer.output_dir());

    Router::new()
        .route("/health", get(health_check))
        .route("/api/view", get(get_view))
        .route("/api/status", get(get_status))
        .route("/api/filter", post(set_filter))
        .route("/api/chart/click", post(chart_click))
        .route("/api/focus/{id}", post(focus_station))
        .route("/api/refresh", post(refresh))
        .route("/api/cancel", post(cancel))
        .route("/api/locate", post(locate))
        .route("/api/tour", post(set_tour))
        .route("/dashboard.png", get(dashboard_png))
        .nest_service("/media", media)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn view_response(state: &AppState) -> ViewResponse {
    ViewResponse {
        dashboard: state.dashboard.view(),
        filter: state.filter.read().await.state().clone(),
        sync: state.dispatcher.sync().status(),
        status: state.status.view(),
        tour: state.dispatcher.tour_label(),
    }
}

async fn get_view(State(state): State<AppState>) -> Json<ViewResponse> {
    Json(view_response(&state).await)
}

async fn get_status(State(state): State<AppState>) -> Json<StatusView> {
    Json(state.status.view())
}

async fn set_filter(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<ViewResponse>, ApiError> {
    // Validate everything before mutating anything.
    let quality = request
        .quality
        .as_deref()
        .map(parse_quality)
        .transpose()
        .map_err(ApiError::bad_request)?;

    if let Some(region) = request.region.as_deref() {
        state
            .dispatcher
            .dispatch(Interaction::SelectRegion(parse_region(region)))
            .await;
    }
    if let Some(quality) = quality {
        state.dispatcher.dispatch(Interaction::SelectQuality(quality)).await;
    }
    if let Some(id) = request.id {
        state.dispatcher.dispatch(Interaction::SearchId(id)).await;
    }

    Ok(Json(view_response(&state).await))
}

async fn chart_click(
    State(state): State<AppState>,
    Json(request): Json<ChartClickRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let level = match request.level.as_deref() {
        None => None,
        Some(raw) => Some(raw.parse::<QualityLevel>().map_err(ApiError::bad_request)?),
    };
    let outcome = state.dispatcher.dispatch(Interaction::ChartClick(level)).await;
    Ok(Json(json!({ "applied": outcome != DispatchOutcome::Ignored })))
}

async fn focus_station(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match state.dispatcher.dispatch(Interaction::FocusStation(id.clone())).await {
        DispatchOutcome::Focused(true) => Ok(Json(json!({ "focused": id }))),
        _ => Err(ApiError(StatusCode::NOT_FOUND, format!("station {} not found", id))),
    }
}

async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.dispatch(Interaction::Refresh).await;
    });
    (StatusCode::ACCEPTED, Json(json!({ "accepted": true })))
}

async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.dispatcher.dispatch(Interaction::Cancel).await;
    Json(json!({ "cancelled": outcome == DispatchOutcome::CancelRequested(true) }))
}

async fn locate(State(state): State<AppState>) -> impl IntoResponse {
    match state.dispatcher.dispatch(Interaction::Locate).await {
        DispatchOutcome::Located(Ok(region)) => Json(json!({ "region": region })),
        DispatchOutcome::Located(Err(e)) => Json(json!({ "region": null, "error": e.to_string() })),
        _ => Json(json!({ "region": null })),
    }
}

async fn set_tour(State(state): State<AppState>, Json(request): Json<TourRequest>) -> impl IntoResponse {
    state.dispatcher.dispatch(Interaction::SetTour(request.enabled)).await;
    Json(json!({ "tour": state.dispatcher.tour_label() }))
}

async fn dashboard_png(State(state): State<AppState>) -> Result<Response, ApiError> {
    let png = state
        .renderer
        .render_png(&state.dashboard.view())
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
