use crate::ai;
use crate::ai::structurizer::StructuredTask;
use crate::analyzer::filter::{FilterState, RequestToken};
use crate::analyzer::mentor::MentorAdvice;
use crate::analyzer::merge::{ReportDraft, merge_drafts};
use crate::analyzer::{self, HistoryDay, TeamScope};
use crate::config::{Config, TenantSettings};
use crate::db::{Database, TeamRow};
use crate::error::PipelineError;
use crate::model::{DailyReport, DigestData, TeamMemberReport, TeamSummary};
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/teams", get(teams))
        .route("/api/v1/teams/:team_id/reports", get(team_reports))
        .route("/api/v1/teams/:team_id/summary", get(team_summary))
        .route("/api/v1/departments/:dept_id/reports", get(department_reports))
        .route("/api/v1/departments/:dept_id/summary", get(department_summary))
        .route("/api/v1/members/:user_id/reports/:date", put(submit_report))
        .route("/api/v1/members/:user_id/history", get(member_history))
        .route("/api/v1/ai/digest", post(ai_digest))
        .route("/api/v1/ai/mentor", post(ai_mentor))
        .route("/api/v1/ai/structure-task", post(structure_task))
        .route("/api/v1/reports/merge", post(merge_reports))
        .route(
            "/api/v1/orgs/:org_id/settings",
            get(org_settings_get).put(org_settings_put),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeQuery {
    date: Option<String>,
    request_token: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    date: Option<String>,
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    db_path: String,
    api_port: u16,
    default_org_id: String,
    teams: usize,
    reports_stored: i64,
    latest_digest_date: Option<String>,
    ai_enabled: bool,
    ai_key_configured: bool,
}

#[derive(Debug, Serialize)]
struct TeamsPayload {
    teams: Vec<TeamRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportsPayload {
    request_token: Option<RequestToken>,
    date: NaiveDate,
    total: usize,
    reports: Vec<TeamMemberReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    request_token: Option<RequestToken>,
    #[serde(flatten)]
    summary: TeamSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryPayload {
    user_id: String,
    days: Vec<HistoryDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DigestRequest {
    team_id: Option<String>,
    dept_id: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MentorRequest {
    user_id: String,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructureRequest {
    #[serde(default)]
    raw_text: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    #[serde(default)]
    current: ReportDraft,
    #[serde(default)]
    incoming: ReportDraft,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;

    let payload = StatusPayload {
        db_path: state.config.db_path.display().to_string(),
        api_port: state.config.api_port,
        default_org_id: state.config.default_org_id.clone(),
        teams: database.list_teams()?.len(),
        reports_stored: database.count_reports()?,
        latest_digest_date: database.latest_digest_meta()?.map(|meta| meta.date),
        ai_enabled: state.config.ai_enabled,
        ai_key_configured: ai::has_api_key(&state.config),
    };

    Ok(Json(payload))
}

async fn teams(State(state): State<ApiState>) -> ApiResult<Json<TeamsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    Ok(Json(TeamsPayload {
        teams: database.list_teams()?,
    }))
}

async fn team_reports(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Query(query): Query<ScopeQuery>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<ReportsPayload>> {
    scope_reports(&state, TeamScope::Team(team_id), query, raw)
}

async fn department_reports(
    State(state): State<ApiState>,
    Path(dept_id): Path<String>,
    Query(query): Query<ScopeQuery>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<ReportsPayload>> {
    scope_reports(&state, TeamScope::Department(dept_id), query, raw)
}

async fn team_summary(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<SummaryPayload>> {
    scope_summary(&state, TeamScope::Team(team_id), query)
}

async fn department_summary(
    State(state): State<ApiState>,
    Path(dept_id): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<SummaryPayload>> {
    scope_summary(&state, TeamScope::Department(dept_id), query)
}

fn scope_reports(
    state: &ApiState,
    scope: TeamScope,
    query: ScopeQuery,
    raw: Option<String>,
) -> ApiResult<Json<ReportsPayload>> {
    let filters = FilterState::from_query_string(raw.as_deref().unwrap_or_default())
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    let date = query.date.as_deref().map(parse_date).transpose()?;

    let database = Database::open(&state.config.db_path)?;
    let dashboard = analyzer::team_dashboard(&database, &scope, date)?;
    let total = dashboard.reports.len();
    let reports = filters
        .apply(&dashboard.reports)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();

    Ok(Json(ReportsPayload {
        request_token: query.request_token.map(RequestToken),
        date: dashboard.date,
        total,
        reports,
    }))
}

fn scope_summary(
    state: &ApiState,
    scope: TeamScope,
    query: ScopeQuery,
) -> ApiResult<Json<SummaryPayload>> {
    let date = query.date.as_deref().map(parse_date).transpose()?;
    let database = Database::open(&state.config.db_path)?;
    let dashboard = analyzer::team_dashboard(&database, &scope, date)?;

    Ok(Json(SummaryPayload {
        request_token: query.request_token.map(RequestToken),
        summary: dashboard.summary,
    }))
}

async fn submit_report(
    State(state): State<ApiState>,
    Path((user_id, date)): Path<(String, String)>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Json<DailyReport>> {
    let date = parse_date(&date)?;

    // Identity comes from the path; the body may omit it.
    if let Some(object) = payload.as_object_mut() {
        object.insert("userId".to_string(), json!(user_id));
        object.insert("date".to_string(), json!(date));
    }
    let report: DailyReport = serde_json::from_value(payload)
        .map_err(|error| ApiError::BadRequest(format!("Invalid daily report: {error}")))?;

    let database = Database::open(&state.config.db_path)?;
    let saved = analyzer::submit_report(&database, &user_id, date, report)?;

    Ok(Json(saved))
}

async fn member_history(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryPayload>> {
    let date = query.date.as_deref().map(parse_date).transpose()?;
    let database = Database::open(&state.config.db_path)?;
    let days = analyzer::member_history(&database, &user_id, date, query.days.unwrap_or(14))?;

    Ok(Json(HistoryPayload { user_id, days }))
}

async fn ai_digest(
    State(state): State<ApiState>,
    Json(request): Json<DigestRequest>,
) -> ApiResult<Json<DigestData>> {
    let scope = match (request.team_id, request.dept_id) {
        (Some(team_id), _) => TeamScope::Team(team_id),
        (None, Some(dept_id)) => TeamScope::Department(dept_id),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "teamId or deptId is required".to_string(),
            ));
        }
    };
    let date = request.date.as_deref().map(parse_date).transpose()?;

    let (digest, _) = analyzer::generate_and_store_digest(&state.config, &scope, date)?;
    Ok(Json(digest))
}

async fn ai_mentor(
    State(state): State<ApiState>,
    Json(request): Json<MentorRequest>,
) -> ApiResult<Json<MentorAdvice>> {
    let date = request.date.as_deref().map(parse_date).transpose()?;
    let database = Database::open(&state.config.db_path)?;

    let advice = analyzer::mentor_advice(&database, &request.user_id, date)?;
    let (_, settings) = analyzer::member_settings(&database, &request.user_id)?;
    let config = Arc::clone(&state.config);
    let tone = settings.ai_policy.tone;

    let advice = tokio::task::spawn_blocking(move || {
        ai::enhance_mentor_advice(&config, advice, &tone)
    })
    .await
    .map_err(|error| ApiError::Internal(error.into()))?;

    Ok(Json(advice))
}

async fn structure_task(
    State(state): State<ApiState>,
    Json(request): Json<StructureRequest>,
) -> ApiResult<Json<StructuredTask>> {
    if request.raw_text.trim().is_empty() {
        return Err(ApiError::BadRequest("rawText is required".to_string()));
    }

    let config = Arc::clone(&state.config);
    let task =
        tokio::task::spawn_blocking(move || ai::structure_task(&config, &request.raw_text))
            .await
            .map_err(|error| ApiError::Internal(error.into()))??;

    Ok(Json(task))
}

async fn merge_reports(Json(request): Json<MergeRequest>) -> Json<ReportDraft> {
    Json(merge_drafts(&request.current, &request.incoming))
}

async fn org_settings_get(
    State(state): State<ApiState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<TenantSettings>> {
    let database = Database::open(&state.config.db_path)?;
    let org = database
        .organization(&org_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Organization not found: {org_id}")))?;

    Ok(Json(org.settings))
}

async fn org_settings_put(
    State(state): State<ApiState>,
    Path(org_id): Path<String>,
    Json(settings): Json<TenantSettings>,
) -> ApiResult<Json<Value>> {
    settings
        .validate()
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let database = Database::open(&state.config.db_path)?;
    if !database.update_tenant_settings(&org_id, &settings)? {
        return Err(ApiError::NotFound(format!(
            "Organization not found: {org_id}"
        )));
    }

    Ok(Json(json!({
        "saved": true,
        "orgId": org_id,
        "settings": settings
    })))
}

fn parse_date(input: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid date format: {input}. Example: 2026-02-18"
        ))
    })
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Forbidden { code: &'static str, message: String },
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        let Some(typed) = value.downcast_ref::<PipelineError>() else {
            return Self::Internal(value);
        };

        match typed {
            PipelineError::FeatureDisabled { .. } => Self::Forbidden {
                code: typed.code(),
                message: typed.to_string(),
            },
            PipelineError::NotFound { .. } => Self::NotFound(typed.to_string()),
            PipelineError::Conflict(message) => Self::Conflict(message.clone()),
            PipelineError::Validation(message) => Self::BadRequest(message.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Forbidden { code, message } => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": message, "code": code })),
            )
                .into_response(),
            ApiError::Internal(error) => {
                warn!(error = %error, "API request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed::seed_demo;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
    }

    fn seeded_state() -> (tempfile::TempDir, ApiState) {
        let dir = tempdir().expect("temp dir");
        let config = Config {
            db_path: dir.path().join("api.db"),
            digest_dir: dir.path().join("digests"),
            ..Config::default()
        };
        let database = Database::open(&config.db_path).expect("open");
        seed_demo(&database, day()).expect("seed");

        (
            dir,
            ApiState {
                config: Arc::new(config),
            },
        )
    }

    fn scope_query(token: u64) -> ScopeQuery {
        ScopeQuery {
            date: Some("2026-02-18".to_string()),
            request_token: Some(token),
        }
    }

    #[test]
    fn pipeline_errors_map_to_status_codes() {
        let forbidden: ApiError = anyhow::Error::from(PipelineError::FeatureDisabled {
            feature: "Manager digest",
        })
        .into();
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);

        let missing: ApiError = anyhow::Error::from(PipelineError::not_found("Team", "x")).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let conflict: ApiError =
            anyhow::Error::from(PipelineError::Conflict("read-only".into())).into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let other: ApiError = anyhow::anyhow!("disk full").into();
        assert_eq!(
            other.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn reports_echo_token_and_apply_query_filters() {
        let (_dir, state) = seeded_state();

        let Json(payload) = scope_reports(
            &state,
            TeamScope::Team("core".into()),
            scope_query(7),
            Some("date=2026-02-18&requestToken=7&filter=highRisk".to_string()),
        )
        .expect("reports");

        assert_eq!(payload.request_token, Some(RequestToken(7)));
        assert_eq!(payload.total, 4);
        let ids = payload
            .reports
            .iter()
            .map(|report| report.user_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["iryna", "taras"]);
    }

    #[test]
    fn unknown_filter_value_is_bad_request() {
        let (_dir, state) = seeded_state();

        let result = scope_reports(
            &state,
            TeamScope::Team("core".into()),
            scope_query(1),
            Some("filter=everyone".to_string()),
        );
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn summary_flattens_metrics_next_to_token() {
        let (_dir, state) = seeded_state();
        let Json(payload) =
            scope_summary(&state, TeamScope::Team("core".into()), scope_query(3)).expect("summary");

        let value = serde_json::to_value(&payload).expect("json");
        assert_eq!(value["requestToken"], 3);
        assert_eq!(value["teamSize"], 4);
        assert_eq!(value["reportsSubmitted"], 3);
    }

    #[tokio::test]
    async fn disabled_digest_is_forbidden() {
        let (_dir, state) = seeded_state();
        let database = Database::open(&state.config.db_path).expect("open");
        let mut settings = TenantSettings::default();
        settings.ai_policy.manager_digest_enabled = false;
        database
            .update_tenant_settings("default", &settings)
            .expect("update");

        let result = ai_digest(
            State(state),
            Json(DigestRequest {
                team_id: Some("core".into()),
                dept_id: None,
                date: Some("2026-02-18".into()),
            }),
        )
        .await;

        match result {
            Err(error) => assert_eq!(error.into_response().status(), StatusCode::FORBIDDEN),
            Ok(_) => panic!("digest should be disabled"),
        }
    }

    #[tokio::test]
    async fn bad_dates_are_rejected_before_touching_storage() {
        let (_dir, state) = seeded_state();

        let result = submit_report(
            State(state),
            Path(("anna".to_string(), "18.02.2026".to_string())),
            Json(json!({})),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn merge_endpoint_applies_policy_table() {
        let Json(merged) = merge_reports(Json(
            serde_json::from_value::<MergeRequest>(json!({
                "current": {"today": {"bigTask": "Old", "mediumTasks": "A"}},
                "incoming": {"today": {"bigTask": "New", "mediumTasks": "B"}}
            }))
            .expect("request"),
        ))
        .await;

        assert_eq!(merged.today.big_task, "New");
        assert_eq!(merged.today.medium_tasks, "A\nB");
    }
}
