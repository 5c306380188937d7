//! HTTP surface for the dashboard and `taskmon-cli`.
//!
//! Read routes are open to any origin when CORS is permissive. Control
//! routes additionally refuse browser requests whose `Origin` is neither
//! loopback nor listed in `api.allowed_origins`; clients that send no
//! `Origin` (the CLI, curl) are unaffected.

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::alerts::ThresholdOverrides;
use crate::capability::Capabilities;
use crate::config::ApiConfig;
use crate::error::{ControlError, QueryError};
use crate::metrics::MetricsSnapshot;
use crate::service::TelemetryService;
use crate::types::{
    Alert, AppGroup, ControlOutcome, ControlResult, GpuStats, GroupControlResult, Pid,
    ProcessMetric,
};

pub struct ApiState {
    pub service: TelemetryService,
    os: String,
}

impl ApiState {
    pub fn new(service: TelemetryService) -> Self {
        let os = sysinfo::System::long_os_version()
            .unwrap_or_else(|| std::env::consts::OS.to_string());
        Self { service, os }
    }
}

pub fn router(state: Arc<ApiState>, config: &ApiConfig) -> Router {
    let policy = Arc::new(OriginPolicy::new(&config.allowed_origins));
    let control = Router::new()
        .route("/api/process/{pid}/kill", post(kill))
        .route("/api/process/{pid}/suspend", post(suspend))
        .route("/api/process/{pid}/resume", post(resume))
        .route("/api/app/close", post(close_app))
        .route_layer(middleware::from_fn_with_state(policy, require_trusted_origin));

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/api/stats", get(stats))
        .route("/api/processes", get(processes))
        .route("/api/apps", get(apps))
        .route("/api/alerts", get(alerts))
        .route("/api/process/{pid}/info", get(process_info))
        .merge(control)
        .with_state(state);

    if config.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Browser origins trusted to drive process control.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.iter().map(|o| normalize_origin(o)).collect(),
        }
    }

    /// Loopback origins are always trusted; anything else must be listed.
    pub fn permits(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.allowed.contains(&origin) || is_loopback_origin(&origin)
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn is_loopback_origin(origin: &str) -> bool {
    let Ok(uri) = origin.parse::<Uri>() else {
        return false;
    };
    if !matches!(uri.scheme_str(), Some("http" | "https")) {
        return false;
    }
    let Some(host) = uri.host() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host == "localhost" || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

async fn require_trusted_origin(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN)
        && !origin.to_str().is_ok_and(|o| policy.permits(o))
    {
        warn!(
            target: "taskmon_audit",
            "REFUSED {} {} from origin {:?}",
            request.method(), request.uri().path(), origin
        );
        return error_response(
            StatusCode::FORBIDDEN,
            "control requests from this origin are not allowed",
        );
    }
    next.run(request).await
}

/// Human-readable size with a 1024 base and one decimal, e.g. "1.5 GB".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: error.into() })).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    uptime_secs: u64,
    generation: u64,
    primed: bool,
    metrics: MetricsSnapshot,
    capabilities: Capabilities,
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let view = state.service.view();
    let metrics = state.service.metrics().snapshot();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: metrics.uptime_secs,
        generation: view.generation,
        primed: view.is_primed(),
        metrics,
        capabilities: state.service.capabilities(),
    })
}

#[derive(Serialize)]
struct CpuStats {
    percent: f64,
    per_core: Vec<f64>,
    core_count: usize,
}

#[derive(Serialize)]
struct MemoryStats {
    total: u64,
    available: u64,
    used: u64,
    percent: f64,
    swap_total: u64,
    swap_used: u64,
    total_formatted: String,
    used_formatted: String,
}

#[derive(Serialize)]
struct DiskStats {
    total: u64,
    used: u64,
    free: u64,
    percent: f64,
    read_bps: f64,
    write_bps: f64,
    total_formatted: String,
    used_formatted: String,
}

#[derive(Serialize)]
struct NetworkStats {
    sent_bps: f64,
    recv_bps: f64,
    sent_formatted: String,
    recv_formatted: String,
}

#[derive(Serialize)]
struct SystemInfo {
    os: String,
    uptime_seconds: u64,
}

#[derive(Serialize)]
struct GpuInfo {
    name: String,
    load: f64,
    memory_used: u64,
    memory_total: u64,
    memory_percent: f64,
    memory_used_formatted: String,
    memory_total_formatted: String,
    temperature: Option<f64>,
}

impl From<&GpuStats> for GpuInfo {
    fn from(gpu: &GpuStats) -> Self {
        Self {
            name: gpu.name.clone(),
            load: gpu.load_percent,
            memory_used: gpu.memory_used,
            memory_total: gpu.memory_total,
            memory_percent: gpu.memory_percent(),
            memory_used_formatted: format_bytes(gpu.memory_used),
            memory_total_formatted: format_bytes(gpu.memory_total),
            temperature: gpu.temperature_celsius,
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    generation: u64,
    timestamp: chrono::DateTime<chrono::Utc>,
    interval_ms: u64,
    cpu: CpuStats,
    memory: MemoryStats,
    disk: DiskStats,
    network: NetworkStats,
    system: SystemInfo,
    /// Null when this host has no GPU source.
    gpu: Option<GpuInfo>,
}

async fn stats(State(state): State<Arc<ApiState>>) -> Json<StatsResponse> {
    let view = state.service.view();
    let s = &view.snapshot;
    let per_second = |bps: f64| format!("{}/s", format_bytes(bps as u64));

    Json(StatsResponse {
        generation: view.generation,
        timestamp: s.timestamp,
        interval_ms: u64::try_from(s.interval.as_millis()).unwrap_or(u64::MAX),
        cpu: CpuStats {
            percent: s.system_cpu_percent,
            per_core: s.per_core_cpu_percent.clone(),
            core_count: s.core_count,
        },
        memory: MemoryStats {
            total: s.memory.total,
            available: s.memory.available,
            used: s.memory.used,
            percent: s.memory_percent,
            swap_total: s.memory.swap_total,
            swap_used: s.memory.swap_used,
            total_formatted: format_bytes(s.memory.total),
            used_formatted: format_bytes(s.memory.used),
        },
        disk: DiskStats {
            total: s.disk.total,
            used: s.disk.used,
            free: s.disk.total.saturating_sub(s.disk.used),
            percent: s.disk_percent,
            read_bps: s.disk_read_bps,
            write_bps: s.disk_write_bps,
            total_formatted: format_bytes(s.disk.total),
            used_formatted: format_bytes(s.disk.used),
        },
        network: NetworkStats {
            sent_bps: s.network_sent_bps,
            recv_bps: s.network_recv_bps,
            sent_formatted: per_second(s.network_sent_bps),
            recv_formatted: per_second(s.network_recv_bps),
        },
        system: SystemInfo {
            os: state.os.clone(),
            uptime_seconds: s.uptime_secs,
        },
        gpu: s.gpu.as_ref().map(GpuInfo::from),
    })
}

#[derive(Serialize)]
struct ProcessListResponse {
    processes: Vec<ProcessMetric>,
    total_count: usize,
}

async fn processes(State(state): State<Arc<ApiState>>) -> Json<ProcessListResponse> {
    let processes = state.service.processes();
    Json(ProcessListResponse {
        total_count: processes.len(),
        processes,
    })
}

#[derive(Serialize)]
struct AppsResponse {
    apps: Vec<AppGroup>,
    total_count: usize,
}

async fn apps(State(state): State<Arc<ApiState>>) -> Json<AppsResponse> {
    let apps = state.service.app_groups();
    Json(AppsResponse {
        total_count: apps.len(),
        apps,
    })
}

#[derive(Serialize)]
struct AlertsResponse {
    alerts: Vec<Alert>,
}

async fn alerts(
    State(state): State<Arc<ApiState>>,
    Query(overrides): Query<ThresholdOverrides>,
) -> Response {
    match state.service.alerts_with(&overrides) {
        Ok(alerts) => Json(AlertsResponse { alerts }).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
    }
}

async fn process_info(State(state): State<Arc<ApiState>>, Path(pid): Path<Pid>) -> Response {
    match state.service.process_detail(pid) {
        Ok(process) => Json(process).into_response(),
        Err(err @ QueryError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, err.to_string()),
    }
}

fn outcome_status(outcome: ControlOutcome) -> StatusCode {
    match outcome {
        ControlOutcome::Success => StatusCode::OK,
        ControlOutcome::NotFound => StatusCode::NOT_FOUND,
        ControlOutcome::PermissionDenied => StatusCode::FORBIDDEN,
        ControlOutcome::PlatformUnsupported => StatusCode::NOT_IMPLEMENTED,
    }
}

fn control_error_response(err: ControlError) -> Response {
    match err {
        ControlError::Timeout(timeout) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "pending",
                "message": timeout.to_string(),
            })),
        )
            .into_response(),
        ControlError::Aborted { .. } => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn control_response(result: Result<ControlResult, ControlError>) -> Response {
    match result {
        Ok(result) => (outcome_status(result.outcome), Json(result)).into_response(),
        Err(err) => control_error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TerminateParams {
    /// SIGKILL when true, SIGTERM when false, configured default when absent.
    force: Option<bool>,
}

async fn kill(
    State(state): State<Arc<ApiState>>,
    Path(pid): Path<Pid>,
    Query(params): Query<TerminateParams>,
) -> Response {
    debug!("[api] kill pid={pid} force={:?}", params.force);
    control_response(state.service.terminate(pid, params.force).await)
}

async fn suspend(State(state): State<Arc<ApiState>>, Path(pid): Path<Pid>) -> Response {
    debug!("[api] suspend pid={pid}");
    control_response(state.service.suspend(pid).await)
}

async fn resume(State(state): State<Arc<ApiState>>, Path(pid): Path<Pid>) -> Response {
    debug!("[api] resume pid={pid}");
    control_response(state.service.resume(pid).await)
}

fn group_status(result: &GroupControlResult) -> StatusCode {
    if result.partial_success {
        return StatusCode::MULTI_STATUS;
    }
    if result.succeeded == result.outcomes.len() {
        return StatusCode::OK;
    }
    let denied = result
        .outcomes
        .iter()
        .any(|o| o.outcome == ControlOutcome::PermissionDenied);
    if denied {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn close_app(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<TerminateParams>,
    Json(pids): Json<Vec<Pid>>,
) -> Response {
    if pids.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no pids given");
    }
    debug!("[api] close pids={pids:?} force={:?}", params.force);
    match state.service.terminate_group(pids, params.force).await {
        Ok(result) => (group_status(&result), Json(result)).into_response(),
        Err(err) => control_error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertThresholds, evaluate};
    use crate::cache::TelemetryCache;
    use crate::metrics::Metrics;
    use crate::testing::{FakeControl, metric, snapshot_with};
    use crate::types::TerminateMode;
    use axum::body::Body;
    use axum::http::{HeaderValue, Method};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    type HttpRequest = axum::http::Request<Body>;

    fn app(control: FakeControl) -> Router {
        app_with(Arc::new(control), None, &ApiConfig::default())
    }

    fn app_with(control: Arc<FakeControl>, gpu: Option<GpuStats>, config: &ApiConfig) -> Router {
        let cache = Arc::new(TelemetryCache::new());
        let mut snapshot = snapshot_with(vec![
            metric(300, "firefox", Some("/usr/lib/firefox/firefox"), 12.5, 3 << 30),
            metric(301, "firefox", Some("/usr/lib/firefox/firefox"), 2.5, 1 << 30),
            metric(400, "bash", Some("/usr/bin/bash"), 0.0, 4 << 20),
        ]);
        snapshot.system_cpu_percent = 82.0;
        snapshot.memory.total = 8 << 30;
        snapshot.memory.used = 4 << 30;
        snapshot.memory_percent = 50.0;
        snapshot.gpu = gpu;
        let groups = crate::aggregator::aggregate(&snapshot);
        let alerts = evaluate(&snapshot, &AlertThresholds::default());
        cache.publish(snapshot, groups, alerts);

        let service = TelemetryService::new(
            cache,
            control,
            AlertThresholds::default(),
            Arc::new(Metrics::new()),
            Duration::from_millis(200),
            TerminateMode::Forced,
        );
        router(Arc::new(ApiState::new(service)), config)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, body, _) = send_request(app, request(method, uri, body)).await;
        (status, body)
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> HttpRequest {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    fn with_origin(mut request: HttpRequest, origin: &str) -> HttpRequest {
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        request
    }

    async fn send_request(app: Router, request: HttpRequest) -> (StatusCode, Value, Option<String>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let allow_origin = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value, allow_origin)
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536 << 20), "1.5 GB");
        assert_eq!(format_bytes(u64::MAX), "16384.0 PB");
    }

    #[tokio::test]
    async fn test_health_and_alias() {
        for uri in ["/healthz", "/health"] {
            let (status, body) = send(app(FakeControl::default()), Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "ok");
        }
    }

    #[tokio::test]
    async fn test_status_reports_generation() {
        let (status, body) = send(app(FakeControl::default()), Method::GET, "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generation"], 1);
        assert_eq!(body["primed"], true);
        assert!(body["metrics"]["refresh_cycles"].is_u64());
        assert_eq!(body["capabilities"]["suspend_resume"], true);
    }

    #[tokio::test]
    async fn test_stats() {
        let (status, body) = send(app(FakeControl::default()), Method::GET, "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cpu"]["percent"], 82.0);
        assert_eq!(body["cpu"]["core_count"], 4);
        assert_eq!(body["memory"]["total_formatted"], "8.0 GB");
        assert_eq!(body["memory"]["used_formatted"], "4.0 GB");
        assert!(body["system"]["os"].is_string());
        assert!(body.as_object().unwrap().contains_key("gpu"));
        assert!(body["gpu"].is_null());
    }

    #[tokio::test]
    async fn test_stats_with_gpu() {
        let gpu = GpuStats {
            name: "Radeon RX 7600".to_string(),
            load_percent: 37.0,
            memory_used: 2 << 30,
            memory_total: 8 << 30,
            temperature_celsius: Some(51.5),
        };
        let app = app_with(Arc::new(FakeControl::default()), Some(gpu), &ApiConfig::default());
        let (status, body) = send(app, Method::GET, "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gpu"]["name"], "Radeon RX 7600");
        assert_eq!(body["gpu"]["memory_percent"], 25.0);
        assert_eq!(body["gpu"]["memory_total_formatted"], "8.0 GB");
        assert_eq!(body["gpu"]["temperature"], 51.5);
    }

    #[tokio::test]
    async fn test_processes_and_apps() {
        let (status, body) =
            send(app(FakeControl::default()), Method::GET, "/api/processes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["processes"][0]["pid"], 300);

        let (status, body) = send(app(FakeControl::default()), Method::GET, "/api/apps", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["apps"][0]["name"], "firefox");
        assert_eq!(body["apps"][0]["process_count"], 2);
        assert_eq!(body["apps"][0]["key"]["kind"], "by_executable_path");
        assert_eq!(body["apps"][0]["is_closeable"], true);
    }

    #[tokio::test]
    async fn test_alerts_with_query_overrides() {
        let (_, body) = send(app(FakeControl::default()), Method::GET, "/api/alerts", None).await;
        assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
        assert_eq!(body["alerts"][0]["severity"], "warning");

        let (_, body) = send(
            app(FakeControl::default()),
            Method::GET,
            "/api/alerts?cpu_critical=81&memory_warning=40",
            None,
        )
        .await;
        let alerts = body["alerts"].as_array().unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0]["severity"], "critical");
        assert_eq!(alerts[1]["resource"], "memory");

        let (status, _) = send(
            app(FakeControl::default()),
            Method::GET,
            "/api/alerts?cpu_warning=150",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_info() {
        let (status, body) =
            send(app(FakeControl::default()), Method::GET, "/api/process/400/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "bash");
        assert_eq!(body["user"], "tester");
        assert_eq!(body["command_line"][0], "bash");

        let (status, _) =
            send(app(FakeControl::default()), Method::GET, "/api/process/9999/info", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_control_status_codes() {
        let control = || {
            FakeControl::default()
                .with_outcome(404, ControlOutcome::NotFound)
                .with_outcome(403, ControlOutcome::PermissionDenied)
                .with_outcome(501, ControlOutcome::PlatformUnsupported)
        };
        let cases = [
            ("/api/process/300/kill", StatusCode::OK),
            ("/api/process/404/kill", StatusCode::NOT_FOUND),
            ("/api/process/403/suspend", StatusCode::FORBIDDEN),
            ("/api/process/501/resume", StatusCode::NOT_IMPLEMENTED),
        ];
        for (uri, expected) in cases {
            let (status, body) = send(app(control()), Method::POST, uri, None).await;
            assert_eq!(status, expected, "{uri}");
            assert!(body["outcome"].is_string(), "{uri}: {body}");
        }
    }

    #[tokio::test]
    async fn test_control_timeout_is_accepted() {
        let control = FakeControl {
            delay: Some(Duration::from_millis(600)),
            ..FakeControl::default()
        };
        let (status, body) = send(app(control), Method::POST, "/api/process/300/kill", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn test_close_app() {
        let (status, body) = send(
            app(FakeControl::default()),
            Method::POST,
            "/api/app/close",
            Some(json!([300, 301])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"], 2);

        let partial = FakeControl::default().with_outcome(301, ControlOutcome::PermissionDenied);
        let (status, body) =
            send(app(partial), Method::POST, "/api/app/close", Some(json!([300, 301]))).await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(body["partial_success"], true);
        assert_eq!(body["outcomes"][1]["outcome"], "permission_denied");

        let (status, _) =
            send(app(FakeControl::default()), Method::POST, "/api/app/close", Some(json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_kill_force_query_overrides_default() {
        let control = Arc::new(FakeControl::default());
        let config = ApiConfig::default();
        for uri in [
            "/api/process/300/kill",
            "/api/process/301/kill?force=false",
            "/api/process/400/kill?force=true",
        ] {
            let app = app_with(Arc::clone(&control), None, &config);
            let (status, _) = send(app, Method::POST, uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
        }
        let app = app_with(Arc::clone(&control), None, &config);
        let (status, _) = send(
            app,
            Method::POST,
            "/api/app/close?force=false",
            Some(json!([500])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(
            control.calls(),
            vec![("kill", 300), ("terminate", 301), ("kill", 400), ("terminate", 500)]
        );
    }

    #[tokio::test]
    async fn test_cross_origin_control_is_refused() {
        let control = Arc::new(FakeControl::default());
        let config = ApiConfig::default();

        let req = with_origin(
            request(Method::POST, "/api/process/4242/kill", None),
            "https://evil.example",
        );
        let (status, body, _) =
            send_request(app_with(Arc::clone(&control), None, &config), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("origin"));

        let req = with_origin(
            request(Method::POST, "/api/app/close", Some(json!([1, 2]))),
            "null",
        );
        let (status, _, _) = send_request(app_with(Arc::clone(&control), None, &config), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(control.calls().is_empty());

        // Reads stay open to any origin.
        let req = with_origin(request(Method::GET, "/api/stats", None), "https://evil.example");
        let (status, _, allow_origin) =
            send_request(app_with(Arc::clone(&control), None, &config), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(allow_origin.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn test_trusted_origins_may_control() {
        let control = Arc::new(FakeControl::default());
        let config = ApiConfig {
            allowed_origins: vec!["https://dash.example.org/".to_string()],
            ..ApiConfig::default()
        };
        for origin in [
            "http://localhost:3000",
            "http://127.0.0.1:5173",
            "http://[::1]:8080",
            "https://Dash.example.org",
        ] {
            let req = with_origin(request(Method::POST, "/api/process/300/suspend", None), origin);
            let (status, _, _) =
                send_request(app_with(Arc::clone(&control), None, &config), req).await;
            assert_eq!(status, StatusCode::OK, "{origin}");
        }

        // No Origin header: not a browser, e.g. taskmon-cli.
        let (status, _) = send(
            app_with(Arc::clone(&control), None, &config),
            Method::POST,
            "/api/process/300/resume",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(control.calls().len(), 5);
    }

    #[test]
    fn test_origin_policy() {
        let policy = OriginPolicy::new(&["https://ops.internal:8443".to_string()]);
        assert!(policy.permits("http://localhost"));
        assert!(policy.permits("http://127.8.9.10:9000"));
        assert!(policy.permits("https://ops.internal:8443"));
        assert!(!policy.permits("https://ops.internal"));
        assert!(!policy.permits("http://localhost.evil.example"));
        assert!(!policy.permits("http://192.168.1.20:3000"));
        assert!(!policy.permits("file://"));
        assert!(!policy.permits("null"));
    }

    #[tokio::test]
    async fn test_bad_pid_is_rejected() {
        let (status, _) =
            send(app(FakeControl::default()), Method::POST, "/api/process/abc/kill", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
