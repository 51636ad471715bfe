//! REST API for the load balance service.
//!
//! Provides HTTP endpoints the planner front end calls whenever the layout
//! changes. Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::cg::{AxisBalance, BalanceTolerance, CgResult, Deviation, compute_center_of_gravity_with};
use crate::config::{ApiConfig, BalanceConfig};
use crate::hud::{BalanceBadge, BalanceWarning, HudSnapshot, OverlayPosition};
use crate::model::{
    ContainerDimensions, ItemMetadata, MeshData, MeshUserData, PlacedItem, ValidationError,
    WeightValue,
};
use crate::plan::{LoadPlan, PlanError, PlanEvent, PlanStep};
use crate::types::Vec3;

#[derive(Clone)]
struct ApiState {
    balance_config: BalanceConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>freight-cg API Docs</title>
        <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css" />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the center-of-gravity endpoint.
///
/// `tolerance` overrides the configured balance tolerance for this request.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "length": 12.0, "height": 2.6, "width": 2.4 },
        "items": [
            { "id": "pallet-1", "weight": 500.0, "position": { "x": 3.0, "y": 0.0, "z": 1.2 } },
            { "id": "pallet-2", "metadata": { "weight": "500" }, "position": { "x": 9.0, "y": 0.0, "z": 1.2 } }
        ]
    })
)]
pub struct CgRequest {
    pub container: ContainerDimensions,
    #[serde(default)]
    pub items: Vec<PlacedItem>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub tolerance: Option<BalanceTolerance>,
}

/// Request structure for the replay endpoint.
///
/// `items` is the layout before the first event.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "length": 12.0, "height": 2.6, "width": 2.4 },
        "items": [],
        "events": [
            { "type": "place", "item": { "id": "a", "weight": 1000.0, "position": { "x": 1.0, "y": 0.0, "z": 1.2 } } },
            { "type": "move", "id": "a", "position": { "x": 6.0, "y": 0.0, "z": 1.2 } }
        ]
    })
)]
pub struct ReplayRequest {
    pub container: ContainerDimensions,
    #[serde(default)]
    pub items: Vec<PlacedItem>,
    pub events: Vec<PlanEvent>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub tolerance: Option<BalanceTolerance>,
}

#[derive(Debug, Error)]
enum RequestValidationError {
    #[error("{0}")]
    InvalidContainer(ValidationError),
    #[error("{0}")]
    InvalidTolerance(ValidationError),
    #[error("{0}")]
    InvalidLayout(PlanError),
}

fn resolve_tolerance(
    requested: Option<BalanceTolerance>,
    config: &BalanceConfig,
) -> Result<BalanceTolerance, RequestValidationError> {
    match requested {
        Some(tolerance) => {
            tolerance
                .validate()
                .map_err(RequestValidationError::InvalidTolerance)?;
            Ok(tolerance)
        }
        None => Ok(config.tolerance()),
    }
}

#[derive(Debug)]
struct ValidatedCgRequest {
    container: ContainerDimensions,
    items: Vec<PlacedItem>,
    tolerance: BalanceTolerance,
}

impl CgRequest {
    fn into_validated(
        self,
        config: &BalanceConfig,
    ) -> Result<ValidatedCgRequest, RequestValidationError> {
        self.container
            .validate()
            .map_err(RequestValidationError::InvalidContainer)?;
        let tolerance = resolve_tolerance(self.tolerance, config)?;
        Ok(ValidatedCgRequest {
            container: self.container,
            items: self.items,
            tolerance,
        })
    }
}

impl ReplayRequest {
    fn into_plan(
        self,
        config: &BalanceConfig,
    ) -> Result<(LoadPlan, Vec<PlanEvent>, BalanceTolerance), RequestValidationError> {
        self.container
            .validate()
            .map_err(RequestValidationError::InvalidContainer)?;
        let tolerance = resolve_tolerance(self.tolerance, config)?;
        let plan = LoadPlan::with_items(self.container, self.items)
            .map_err(RequestValidationError::InvalidLayout)?;
        Ok((plan, self.events, tolerance))
    }
}

/// Response of the center-of-gravity endpoint.
///
/// # Fields
/// * `result` - Raw engine output
/// * `hud` - Values for the heads-up display
#[derive(Serialize, ToSchema)]
pub struct CgResponse {
    pub result: CgResult,
    pub hud: HudSnapshot,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

impl IntoResponse for RequestValidationError {
    fn into_response(self) -> Response {
        let error = match &self {
            RequestValidationError::InvalidContainer(_) => "Invalid container configuration",
            RequestValidationError::InvalidTolerance(_) => "Invalid balance tolerance",
            RequestValidationError::InvalidLayout(_) => "Invalid initial layout",
        };
        warn!(error, details = %self, "rejected request");
        error_response(StatusCode::UNPROCESSABLE_ENTITY, error, self.to_string())
    }
}

fn unwrap_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(err) => {
            warn!(error = %err, "rejected request body");
            Err(json_deserialize_error(err))
        }
    }
}

impl CgResponse {
    fn compute(request: &ValidatedCgRequest) -> Self {
        let result =
            compute_center_of_gravity_with(&request.items, &request.container, &request.tolerance);
        let hud = HudSnapshot::from_result(
            &request.items,
            &request.container,
            &result,
            &request.tolerance,
        );
        Self { result, hud }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_cg, handle_replay, handle_health),
    components(
        schemas(
            CgRequest,
            CgResponse,
            ReplayRequest,
            ErrorResponse,
            ContainerDimensions,
            PlacedItem,
            WeightValue,
            ItemMetadata,
            MeshData,
            MeshUserData,
            Vec3,
            BalanceTolerance,
            CgResult,
            Deviation,
            AxisBalance,
            HudSnapshot,
            OverlayPosition,
            BalanceBadge,
            BalanceWarning,
            PlanEvent,
            PlanStep
        )
    ),
    tags((name = "balance", description = "Center-of-gravity and load balance endpoints"))
)]
struct ApiDoc;

fn build_router(config: &ApiConfig, state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/cg", post(handle_cg))
        .route("/cg/replay", post(handle_replay))
        .route("/health", get(handle_health));

    if config.serve_docs() {
        router = router
            .route("/docs/openapi.json", get(serve_openapi_json))
            .route("/docs", get(serve_openapi_ui));
    }

    router.layer(cors).with_state(state)
}

/// Starts the API server.
///
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, balance_config: BalanceConfig) {
    let tolerance = balance_config.tolerance();
    let state = ApiState { balance_config };
    let app = build_router(&config, state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    let display_host = config.display_host();
    info!(
        "Server running on http://{}:{} (tolerance: {:.0}% length, {:.0}% width)",
        display_host,
        config.port(),
        tolerance.length_ratio * 100.0,
        tolerance.width_ratio * 100.0
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("API endpoints: POST /cg, POST /cg/replay, GET /health");
    if config.serve_docs() {
        info!("Documentation: GET /docs, GET /docs/openapi.json");
    }

    if let Err(err) = axum::serve(listener, app).await {
        error!("API server terminated with an error: {err}");
    }
}

/// Handler for POST /cg endpoint.
///
/// Computes the center of gravity of the submitted layout.
///
/// # Returns
/// JSON response with the engine result and the HUD projection
#[utoipa::path(
    post,
    path = "/cg",
    request_body = CgRequest,
    responses(
        (status = 200, description = "Center of gravity computed", body = CgResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, container or tolerance",
            body = ErrorResponse
        )
    ),
    tag = "balance"
)]
async fn handle_cg(
    State(state): State<ApiState>,
    payload: Result<Json<CgRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let request = match request.into_validated(&state.balance_config) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    let response = CgResponse::compute(&request);
    info!(
        items = response.hud.item_count,
        total_weight = response.result.total_weight,
        cg_x = response.result.x,
        cg_z = response.result.z,
        badge = %response.hud.badge,
        warnings = ?response.hud.warnings.iter().map(BalanceWarning::code).collect::<Vec<_>>(),
        "center of gravity computed"
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /cg/replay endpoint (SSE).
///
/// Applies the submitted layout events one after another and streams the
/// recomputed center of gravity after each event as Server-Sent Events.
#[utoipa::path(
    post,
    path = "/cg/replay",
    request_body = ReplayRequest,
    responses(
        (
            status = 200,
            description = "Streams one plan step per event",
            content_type = "text/event-stream",
            body = PlanStep
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, container, tolerance or initial layout",
            body = ErrorResponse
        )
    ),
    tag = "balance"
)]
async fn handle_replay(
    State(state): State<ApiState>,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let (mut plan, events, tolerance) = match request.into_plan(&state.balance_config) {
        Ok(parts) => parts,
        Err(err) => return err.into_response(),
    };

    info!(
        items = plan.items().len(),
        events = events.len(),
        "replaying load plan events"
    );

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        plan.replay(&events, &tolerance, |step| match serde_json::to_string(step) {
            Ok(json) => {
                // Receiver has closed the stream; remaining steps are discarded.
                let _ = tx.blocking_send(json);
            }
            Err(err) => warn!(error = %err, "could not serialize replay step"),
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /health endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = String)),
    tag = "balance"
)]
async fn handle_health() -> &'static str {
    "ok"
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_cg(json: &str) -> CgRequest {
        serde_json::from_str(json).expect("Should parse valid JSON")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/cg", "/cg/replay", "/health"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        let schemas = &components.schemas;
        for name in [
            "CgRequest",
            "CgResponse",
            "ReplayRequest",
            "PlanEvent",
            "ErrorResponse",
            "HudSnapshot",
            "AxisBalance",
        ] {
            assert!(
                schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn cg_request_computes_centered_scenario() {
        let request = parse_cg(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "items": [
                    {"id": "a", "weight": 500, "position": {"x": 3.0, "y": 0.0, "z": 1.2}},
                    {"id": "b", "metadata": {"weight": "500"}, "position": {"x": 9.0, "y": 0.0, "z": 1.2}}
                ]
            }"#,
        );
        let validated = request
            .into_validated(&BalanceConfig::default())
            .expect("Should validate successfully");

        let response = CgResponse::compute(&validated);
        assert!((response.result.total_weight - 1000.0).abs() < 1e-9);
        assert!((response.result.x - 6.0).abs() < 1e-9);
        assert!(response.result.is_balanced);
        assert_eq!(response.hud.badge, BalanceBadge::Balanced);
        assert_eq!(response.hud.item_count, 2);
    }

    #[test]
    fn cg_request_counts_non_numeric_weight_as_zero() {
        let request = parse_cg(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "items": [
                    {"id": "ok", "weight": 500, "position": {"x": 6.0, "y": 0.0, "z": 1.2}},
                    {"id": "bad", "weight": true, "position": {"x": 1.0, "y": 0.0, "z": 1.2}}
                ]
            }"#,
        );
        let validated = request
            .into_validated(&BalanceConfig::default())
            .expect("Should validate successfully");

        let response = CgResponse::compute(&validated);
        assert!((response.result.total_weight - 500.0).abs() < 1e-9);
        assert!((response.result.x - 6.0).abs() < 1e-9);
        assert_eq!(response.hud.item_count, 2);
        assert_eq!(response.hud.weighted_item_count, 1);
    }

    #[test]
    fn cg_response_reports_axis_balance() {
        let request = parse_cg(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "items": [
                    {"id": "a", "weight": 1000, "position": {"x": 1.0, "y": 0.0, "z": 1.2}}
                ]
            }"#,
        );
        let validated = request
            .into_validated(&BalanceConfig::default())
            .expect("Should validate successfully");

        let response = CgResponse::compute(&validated);
        let json = serde_json::to_value(&response).expect("Should serialize response");
        assert_eq!(json["hud"]["axes"], json!({"x": false, "z": true}));
        assert_eq!(response.hud.warnings, vec![BalanceWarning::ShiftedTowardFront]);
    }

    #[test]
    fn cg_request_without_items_defaults_to_empty() {
        let request = parse_cg(r#"{"container": {"length": 10.0, "height": 2.0, "width": 4.0}}"#);
        assert!(request.items.is_empty());
        assert_eq!(request.tolerance, None);
    }

    #[test]
    fn cg_request_rejects_non_positive_container() {
        let request = parse_cg(
            r#"{"container": {"length": 0.0, "height": 2.6, "width": 2.4}, "items": []}"#,
        );
        let err = request
            .into_validated(&BalanceConfig::default())
            .unwrap_err();
        assert!(matches!(err, RequestValidationError::InvalidContainer(_)));
    }

    #[test]
    fn request_tolerance_overrides_config() {
        let request = parse_cg(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "items": [{"id": "a", "weight": 100, "position": {"x": 7.5, "y": 0.0, "z": 1.2}}],
                "tolerance": {"length_ratio": 0.1, "width_ratio": 0.2}
            }"#,
        );
        let validated = request
            .into_validated(&BalanceConfig::default())
            .expect("Should validate successfully");
        assert_eq!(validated.tolerance.length_ratio, 0.1);

        let response = CgResponse::compute(&validated);
        assert!(!response.result.is_balanced);
        assert_eq!(
            response.hud.warnings,
            vec![BalanceWarning::ShiftedTowardRear]
        );
    }

    #[test]
    fn request_tolerance_out_of_range_is_rejected() {
        let request = parse_cg(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "tolerance": {"length_ratio": 1.5, "width_ratio": 0.2}
            }"#,
        );
        let err = request
            .into_validated(&BalanceConfig::default())
            .unwrap_err();
        assert!(matches!(err, RequestValidationError::InvalidTolerance(_)));
    }

    #[test]
    fn replay_request_rejects_duplicate_initial_items() {
        let request: ReplayRequest = serde_json::from_str(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "items": [
                    {"id": "a", "weight": 1, "position": {"x": 1.0, "y": 0.0, "z": 1.0}},
                    {"id": "a", "weight": 2, "position": {"x": 2.0, "y": 0.0, "z": 1.0}}
                ],
                "events": []
            }"#,
        )
        .expect("Should parse valid JSON");

        let err = request.into_plan(&BalanceConfig::default()).unwrap_err();
        assert!(matches!(err, RequestValidationError::InvalidLayout(_)));
    }

    #[test]
    fn replay_request_builds_plan_with_events() {
        let request: ReplayRequest = serde_json::from_str(
            r#"{
                "container": {"length": 12.0, "height": 2.6, "width": 2.4},
                "events": [
                    {"type": "place", "item": {"id": "a", "weight": 1000, "position": {"x": 1.0, "y": 0.0, "z": 1.2}}},
                    {"type": "move", "id": "a", "position": {"x": 6.0, "y": 0.0, "z": 1.2}}
                ]
            }"#,
        )
        .expect("Should parse valid JSON");

        let (mut plan, events, tolerance) = request
            .into_plan(&BalanceConfig::default())
            .expect("Should validate successfully");
        assert!(plan.items().is_empty());

        let mut steps = Vec::new();
        let result = plan.replay(&events, &tolerance, |step| {
            steps.push(serde_json::to_value(step).unwrap())
        });
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0]["type"], "applied");
        assert_eq!(steps[0]["result"]["is_balanced"], false);
        assert_eq!(steps[2]["type"], "finished");
        assert!(result.is_balanced);
    }
}
