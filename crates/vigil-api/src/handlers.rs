//! HTTP request handlers for the triage API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_core::{
    Alert, AlertId, AlertRule, AlertStatus, EscalationEvent, Observation, PatientId, RuleCondition,
    RuleId, Severity, UserId,
};
use vigil_engine::{
    BulkOutcome, BulkRequest, EvaluationReport, Page, Pagination, QueuePage, QueueView,
    RuleChanges, RuleRemoval,
};
use vigil_store::AlertQueryFilter;

use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

fn parse_alert_id(id: &str) -> ApiResult<AlertId> {
    AlertId::parse(id).map_err(|_| ApiError::InvalidRequest(format!("invalid alert id: {id}")))
}

fn parse_rule_id(id: &str) -> ApiResult<RuleId> {
    RuleId::parse(id).map_err(|_| ApiError::InvalidRequest(format!("invalid rule id: {id}")))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Handle GET /api/health.
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Query parameters for alert listing.
#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    /// Filter by status.
    pub status: Option<AlertStatus>,
    /// Filter by severity.
    pub severity: Option<Severity>,
    /// Filter by patient.
    pub patient_id: Option<PatientId>,
    /// Filter by originating rule.
    pub rule_id: Option<RuleId>,
    /// Filter by live claim holder.
    pub claimed_by: Option<UserId>,
    /// Only alerts with no live claim.
    #[serde(default)]
    pub unclaimed: bool,
    /// Filter on suppression state.
    pub suppressed: Option<bool>,
    /// Entries to skip.
    pub offset: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
}

impl AlertQuery {
    fn filter(&self) -> AlertQueryFilter {
        AlertQueryFilter {
            statuses: self.status.into_iter().collect(),
            severity: self.severity,
            patient_id: self.patient_id,
            rule_id: self.rule_id,
            claimed_by: self.claimed_by,
            unclaimed_only: self.unclaimed,
            suppressed: self.suppressed,
            created_after: None,
            created_before: None,
        }
    }
}

/// A paginated alert listing.
#[derive(Debug, Serialize)]
pub struct AlertListPage {
    /// Alerts in creation order.
    pub data: Vec<Alert>,
    /// Applied pagination and total match count.
    pub pagination: Pagination,
}

/// Handle GET /api/alerts.
pub async fn list_alerts(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Query(query): Query<AlertQuery>,
) -> Json<AlertListPage> {
    let alerts = state.engine().list_alerts(&ctx, &query.filter(), Utc::now());

    let mut page = Page::default();
    if let Some(offset) = query.offset {
        page.offset = offset;
    }
    if let Some(limit) = query.limit {
        page.limit = limit;
    }

    let limit = page.limit.clamp(1, vigil_engine::queue::MAX_PAGE_LIMIT);
    let total = alerts.len();
    let data: Vec<Alert> = alerts.into_iter().skip(page.offset).take(limit).collect();

    Json(AlertListPage {
        data,
        pagination: Pagination {
            offset: page.offset,
            limit,
            total,
        },
    })
}

/// Request body for manual alert creation.
#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    /// The patient concerned.
    pub patient_id: PatientId,
    /// Severity of the alert.
    pub severity: Severity,
}

/// Handle POST /api/alerts.
pub async fn create_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Json(body): Json<CreateAlertRequest>,
) -> ApiResult<(StatusCode, Json<Alert>)> {
    let alert = state
        .engine()
        .create_manual_alert(&ctx, body.patient_id, body.severity, Utc::now())?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// Handle GET /api/alerts/{id}.
pub async fn get_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    let alert = state.engine().get_alert(&ctx, parse_alert_id(&id)?)?;
    Ok(Json(alert))
}

/// Query parameters for the triage queue.
#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    /// Queue view: `full`, `my-tasks`, or `unassigned-critical`.
    pub view: Option<String>,
    /// Entries to skip.
    pub offset: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Handle GET /api/alerts/triage-queue.
pub async fn triage_queue(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Json<QueuePage>> {
    let view = match query.view.as_deref() {
        None | Some("full") => QueueView::Full,
        Some("my-tasks") => QueueView::MyTasks(ctx.user_id),
        Some("unassigned-critical") => QueueView::UnassignedCritical,
        Some(other) => {
            return Err(ApiError::InvalidRequest(format!("unknown queue view: {other}")));
        }
    };
    let mut page = Page::default();
    if let Some(offset) = query.offset {
        page.offset = offset;
    }
    if let Some(limit) = query.limit {
        page.limit = limit;
    }

    Ok(Json(state.engine().triage_queue(&ctx, view, page, Utc::now())))
}

/// Handle POST /api/alerts/{id}/claim.
pub async fn claim_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().claim(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Handle POST /api/alerts/{id}/unclaim.
pub async fn unclaim_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().unclaim(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Handle POST /api/alerts/{id}/force-claim.
pub async fn force_claim_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().force_claim(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Handle POST /api/alerts/{id}/acknowledge.
pub async fn acknowledge_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().acknowledge(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Request body for resolving an alert.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// Mandatory resolution documentation.
    pub notes: String,
}

/// Handle POST /api/alerts/{id}/resolve.
pub async fn resolve_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(body): Json<ResolveRequest>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().resolve(&ctx, parse_alert_id(&id)?, &body.notes, Utc::now())?))
}

/// Request body for cancelling an alert.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Optional cancellation reason.
    pub reason: Option<String>,
}

/// Handle POST /api/alerts/{id}/cancel.
pub async fn cancel_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().cancel(
        &ctx,
        parse_alert_id(&id)?,
        body.reason.as_deref(),
        Utc::now(),
    )?))
}

/// Request body for snoozing an alert.
#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    /// When queue visibility resumes.
    pub until: DateTime<Utc>,
}

/// Handle POST /api/alerts/{id}/snooze.
pub async fn snooze_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(body): Json<SnoozeRequest>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().snooze(&ctx, parse_alert_id(&id)?, body.until, Utc::now())?))
}

/// Handle POST /api/alerts/{id}/unsnooze.
pub async fn unsnooze_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().unsnooze(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Handle POST /api/alerts/{id}/suppress.
pub async fn suppress_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().suppress(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Handle POST /api/alerts/{id}/unsuppress.
pub async fn unsuppress_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().unsuppress(&ctx, parse_alert_id(&id)?, Utc::now())?))
}

/// Request body for manual escalation.
#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    /// Why the alert is being escalated.
    pub reason: String,
}

/// Handle POST /api/alerts/{id}/escalate.
pub async fn escalate_alert(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(body): Json<EscalateRequest>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine().escalate(&ctx, parse_alert_id(&id)?, &body.reason, Utc::now())?))
}

/// Handle GET /api/alerts/{id}/escalation-history.
pub async fn escalation_history(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<EscalationEvent>>> {
    Ok(Json(state.engine().escalation_history(&ctx, parse_alert_id(&id)?)?))
}

/// Handle POST /api/alerts/bulk.
pub async fn bulk_action(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Json(body): Json<BulkRequest>,
) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.engine().bulk(&ctx, &body, Utc::now())?))
}

/// Request body for observation ingestion.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// The observations to evaluate.
    pub observations: Vec<Observation>,
}

/// What an evaluation pass did, in wire form.
#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    /// Items examined.
    pub processed: usize,
    /// Alerts opened.
    pub alerts_created: Vec<AlertId>,
    /// Open alerts refreshed.
    pub alerts_refreshed: Vec<AlertId>,
    /// Items that failed, with reasons.
    pub failures: Vec<String>,
}

impl From<EvaluationReport> for EvaluationResponse {
    fn from(report: EvaluationReport) -> Self {
        Self {
            processed: report.processed,
            alerts_created: report.alerts_created,
            alerts_refreshed: report.alerts_refreshed,
            failures: report.failures.into_iter().map(|f| f.reason).collect(),
        }
    }
}

/// Handle POST /api/observations.
///
/// Ingestion stays inside the caller's organization; a batch naming
/// another organization is rejected outright.
pub async fn ingest_observations(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Json(body): Json<IngestRequest>,
) -> ApiResult<Json<EvaluationResponse>> {
    if body.observations.iter().any(|o| o.org_id != ctx.org_id) {
        return Err(ApiError::InvalidRequest(
            "observations must belong to the caller's organization".to_string(),
        ));
    }
    let report = state.engine().ingest(&body.observations, Utc::now());
    Ok(Json(report.into()))
}

/// Handle POST /api/alerts/evaluate.
///
/// Runs a full evaluation pass including missing-data checks.
pub async fn trigger_evaluation(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
) -> ApiResult<Json<EvaluationResponse>> {
    let report = state.engine().trigger_evaluation(&ctx, &[], Utc::now())?;
    Ok(Json(report.into()))
}

/// Request body for rule creation.
#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    /// Human-readable name.
    pub name: String,
    /// The metric the rule watches.
    pub metric: String,
    /// The predicate to evaluate.
    pub condition: RuleCondition,
    /// Severity of alerts the rule produces.
    pub severity: Severity,
    /// Whether the rule starts enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Handle GET /api/rules.
pub async fn list_rules(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
) -> Json<Vec<AlertRule>> {
    Json(state.engine().list_rules(&ctx))
}

/// Handle POST /api/rules.
pub async fn create_rule(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Json(body): Json<CreateRuleRequest>,
) -> ApiResult<(StatusCode, Json<AlertRule>)> {
    let metric = vigil_core::MetricId::new(&body.metric)
        .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
    let rule = AlertRule::builder(body.name, metric, body.condition)
        .org(ctx.org_id)
        .severity(body.severity)
        .enabled(body.enabled)
        .build()
        .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

    let rule = state.engine().create_rule(&ctx, rule, Utc::now())?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Handle GET /api/rules/{id}.
pub async fn get_rule(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<AlertRule>> {
    Ok(Json(state.engine().get_rule(&ctx, parse_rule_id(&id)?)?))
}

/// Handle PATCH /api/rules/{id}.
pub async fn update_rule(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(changes): Json<RuleChanges>,
) -> ApiResult<Json<AlertRule>> {
    Ok(Json(state.engine().update_rule(&ctx, parse_rule_id(&id)?, &changes, Utc::now())?))
}

/// Response body for rule deletion.
#[derive(Debug, Serialize)]
pub struct RuleRemovalResponse {
    /// True when the rule was removed outright; false when it was
    /// deactivated because alerts still reference it.
    pub removed: bool,
    /// The deactivated rule, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<AlertRule>,
}

/// Handle DELETE /api/rules/{id}.
pub async fn delete_rule(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<RuleRemovalResponse>> {
    let removal = state.engine().delete_rule(&ctx, parse_rule_id(&id)?, Utc::now())?;
    let response = match removal {
        RuleRemoval::Removed => RuleRemovalResponse { removed: true, rule: None },
        RuleRemoval::Deactivated(rule) => RuleRemovalResponse {
            removed: false,
            rule: Some(rule),
        },
    };
    Ok(Json(response))
}

/// Handle POST /api/rules/{id}/customize.
pub async fn customize_rule(
    State(state): State<Arc<ApiState>>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<AlertRule>)> {
    let clone = state.engine().customize_rule(&ctx, parse_rule_id(&id)?, Utc::now())?;
    Ok((StatusCode::CREATED, Json(clone)))
}
