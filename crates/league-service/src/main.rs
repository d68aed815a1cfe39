use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use league_api::{
    ClearResult, LeagueApi, MigrateResult, RegisterRunnerResult, SeedPlanRequest,
    SetSettingsRequest, SettingsView, SubmitRequest, SweepReport, API_CONTRACT_VERSION,
};
use league_core::Submission;
use league_store_sqlite::{RunnerRow, SchemaStatus};
use serde::{Deserialize, Serialize};
use time::Date;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";

#[derive(Debug, Clone)]
struct ServiceState {
    api: LeagueApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MigrateRequest {
    dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct PeriodRequest {
    date: Option<Date>,
}

#[derive(Debug, Clone, Deserialize)]
struct RegisterRunnerRequest {
    name: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "league-service")]
#[command(about = "Local HTTP service for the Rando League settings kernel")]
struct Args {
    #[arg(long, default_value = "./league.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        (status, Json(self)).into_response()
    }
}

impl ServiceState {
    fn error(message: impl Into<String>) -> ServiceError {
        ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into() }
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/db/schema-version", post(db_schema_version))
        .route("/v1/db/migrate", post(db_migrate))
        .route("/v1/settings/set", post(settings_set))
        .route("/v1/settings/:date", get(settings_view))
        .route("/v1/settings/clear", post(settings_clear))
        .route("/v1/seed/plan", post(seed_plan))
        .route("/v1/runners", post(runner_add).get(runner_list))
        .route("/v1/submissions", post(submissions_add))
        .route("/v1/submissions/:date", get(submissions_view))
        .route("/v1/sweep", post(sweep))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let state = ServiceState { api: LeagueApi::new(args.db) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn db_schema_version(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<SchemaStatus>>, ServiceError> {
    let status = state.api.schema_status().map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(status)))
}

async fn db_migrate(
    State(state): State<ServiceState>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<ServiceEnvelope<MigrateResult>>, ServiceError> {
    let result =
        state.api.migrate(request.dry_run).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(result)))
}

async fn settings_set(
    State(state): State<ServiceState>,
    Json(request): Json<SetSettingsRequest>,
) -> Result<Json<ServiceEnvelope<SettingsView>>, ServiceError> {
    let view =
        state.api.set_settings(request).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(view)))
}

async fn settings_view(
    State(state): State<ServiceState>,
    Path(date): Path<String>,
) -> Result<Json<ServiceEnvelope<SettingsView>>, ServiceError> {
    let period = league_core::parse_date(&date)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    let view = state
        .api
        .view_settings(Some(period))
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(view)))
}

async fn settings_clear(
    State(state): State<ServiceState>,
    Json(request): Json<PeriodRequest>,
) -> Result<Json<ServiceEnvelope<ClearResult>>, ServiceError> {
    let result = state
        .api
        .clear_settings(request.date)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(result)))
}

async fn seed_plan(
    State(state): State<ServiceState>,
    Json(request): Json<SeedPlanRequest>,
) -> Result<Json<ServiceEnvelope<league_seedgen::SeedPlan>>, ServiceError> {
    let plan = state.api.seed_plan(request).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(plan)))
}

async fn runner_add(
    State(state): State<ServiceState>,
    Json(request): Json<RegisterRunnerRequest>,
) -> Result<Json<ServiceEnvelope<RegisterRunnerResult>>, ServiceError> {
    let result = state
        .api
        .register_runner(&request.name)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(result)))
}

async fn runner_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<RunnerRow>>>, ServiceError> {
    let runners = state.api.list_runners().map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(runners)))
}

async fn submissions_add(
    State(state): State<ServiceState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<ServiceEnvelope<Submission>>, ServiceError> {
    let submission =
        state.api.submit(request).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(submission)))
}

async fn submissions_view(
    State(state): State<ServiceState>,
    Path(date): Path<String>,
) -> Result<Json<ServiceEnvelope<Vec<Submission>>>, ServiceError> {
    let period = league_core::parse_date(&date)
        .map_err(|err| ServiceState::error(err.to_string()))?;
    let submissions = state
        .api
        .submissions(Some(period))
        .map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(submissions)))
}

async fn sweep(
    State(state): State<ServiceState>,
    Json(request): Json<PeriodRequest>,
) -> Result<Json<ServiceEnvelope<SweepReport>>, ServiceError> {
    let report =
        state.api.sweep(request.date).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use http::Request;
    use tower::ServiceExt;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("league-service-{}.sqlite3", ulid::Ulid::new()))
    }

    fn test_router(db_path: PathBuf) -> Router {
        app(ServiceState { api: LeagueApi::new(db_path) })
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> Response {
        let builder = Request::builder().uri(uri).method(method);
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(value.to_string())),
            None => builder.body(axum::body::Body::empty()),
        }
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

        match router.oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = test_router(unique_temp_db_path());
        let response = send(router, "GET", "/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(
            value.get("service_contract_version").and_then(serde_json::Value::as_str),
            Some(SERVICE_CONTRACT_VERSION)
        );
        assert_eq!(
            value.get("data").and_then(|data| data.get("status")).and_then(serde_json::Value::as_str),
            Some("ok")
        );
    }

    #[tokio::test]
    async fn migrate_and_schema_version_flow() {
        let db_path = unique_temp_db_path();
        let router = test_router(db_path.clone());

        let response = send(
            router.clone(),
            "POST",
            "/v1/db/migrate",
            Some(serde_json::json!({ "dry_run": true })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(
            value.get("data").and_then(|data| data.get("would_apply_versions")),
            Some(&serde_json::json!([1, 2]))
        );

        let response = send(
            router.clone(),
            "POST",
            "/v1/db/migrate",
            Some(serde_json::json!({ "dry_run": false })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(router, "POST", "/v1/db/schema-version", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(
            value.get("data").and_then(|data| data.get("current_version")),
            Some(&serde_json::json!(2))
        );

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn settings_set_view_and_seed_plan_flow() {
        let db_path = unique_temp_db_path();
        let router = test_router(db_path.clone());

        let set_payload = serde_json::json!({
            "date": "2024-03-01",
            "settings": [
                { "name": "goal_mode", "value": "World Tour" },
                { "name": "relic_count", "value": "9" }
            ]
        });
        let response = send(router.clone(), "POST", "/v1/settings/set", Some(set_payload)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(router.clone(), "GET", "/v1/settings/2024-03-01", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(
            value
                .get("data")
                .and_then(|data| data.get("settings"))
                .and_then(serde_json::Value::as_array)
                .map(Vec::len),
            Some(2)
        );

        let plan_payload = serde_json::json!({ "date": "2024-03-01", "base_url": null });
        let response = send(router.clone(), "POST", "/v1/seed/plan", Some(plan_payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        let url = value
            .get("data")
            .and_then(|data| data.get("url"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_else(|| panic!("missing data.url in response: {value}"));
        assert!(url.contains("var=WorldTour"));
        assert!(url.contains("relics=9"));

        let clear_payload = serde_json::json!({ "date": "2024-03-01" });
        let response = send(router, "POST", "/v1/settings/clear", Some(clear_payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(
            value.get("data").and_then(|data| data.get("deleted")),
            Some(&serde_json::json!(2))
        );

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn invalid_setting_value_returns_bad_request() {
        let db_path = unique_temp_db_path();
        let router = test_router(db_path.clone());

        let payload = serde_json::json!({
            "date": "2024-03-01",
            "settings": [{ "name": "logic_mode", "value": "Impossible" }]
        });
        let response = send(router, "POST", "/v1/settings/set", Some(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let value = response_json(response).await;
        assert_eq!(
            value.get("service_contract_version").and_then(serde_json::Value::as_str),
            Some(SERVICE_CONTRACT_VERSION)
        );
        assert!(value.get("error").and_then(serde_json::Value::as_str).is_some());

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn runner_submission_and_sweep_flow() {
        let db_path = unique_temp_db_path();
        let router = test_router(db_path.clone());

        for name in ["grimelios", "eiko"] {
            let response = send(
                router.clone(),
                "POST",
                "/v1/runners",
                Some(serde_json::json!({ "name": name })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(router.clone(), "GET", "/v1/runners", None).await;
        let value = response_json(response).await;
        assert_eq!(
            value.get("data").and_then(serde_json::Value::as_array).map(Vec::len),
            Some(2)
        );

        let submit_payload = serde_json::json!({
            "date": "2024-03-01",
            "runner": "eiko",
            "time": "55:01",
            "vod": "https://twitch.tv/videos/2"
        });
        let response =
            send(router.clone(), "POST", "/v1/submissions", Some(submit_payload.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(router.clone(), "POST", "/v1/submissions", Some(submit_payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let sweep_payload = serde_json::json!({ "date": "2024-03-01" });
        let response = send(router.clone(), "POST", "/v1/sweep", Some(sweep_payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(
            value.get("data").and_then(|data| data.get("swept")),
            Some(&serde_json::json!(["grimelios"]))
        );

        let response = send(router, "GET", "/v1/submissions/2024-03-01", None).await;
        let value = response_json(response).await;
        assert_eq!(
            value.get("data").and_then(serde_json::Value::as_array).map(Vec::len),
            Some(2)
        );

        let _ = std::fs::remove_file(&db_path);
    }
}
