//! Route configuration for the triage API.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    acknowledge_alert, bulk_action, cancel_alert, claim_alert, create_alert, create_rule,
    customize_rule, delete_rule, escalate_alert, escalation_history, force_claim_alert, get_alert,
    get_rule, health_check, ingest_observations, list_alerts, list_rules, resolve_alert,
    snooze_alert, suppress_alert, triage_queue, trigger_evaluation, unclaim_alert, unsnooze_alert,
    unsuppress_alert, update_rule,
};
use crate::state::ApiState;

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Alerts
        .route("/alerts", get(list_alerts).post(create_alert))
        .route("/alerts/triage-queue", get(triage_queue))
        .route("/alerts/bulk-actions", post(bulk_action))
        .route("/alerts/evaluate", post(trigger_evaluation))
        .route("/alerts/{id}", get(get_alert))
        .route("/alerts/{id}/claim", post(claim_alert))
        .route("/alerts/{id}/unclaim", post(unclaim_alert))
        .route("/alerts/{id}/force-claim", post(force_claim_alert))
        .route("/alerts/{id}/acknowledge", post(acknowledge_alert))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/alerts/{id}/cancel", post(cancel_alert))
        .route("/alerts/{id}/snooze", post(snooze_alert))
        .route("/alerts/{id}/unsnooze", post(unsnooze_alert))
        .route("/alerts/{id}/suppress", post(suppress_alert))
        .route("/alerts/{id}/unsuppress", post(unsuppress_alert))
        .route("/alerts/{id}/escalate", post(escalate_alert))
        .route("/alerts/{id}/escalation-history", get(escalation_history))
        // Observation ingestion
        .route("/observations", post(ingest_observations))
        // Rules
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/{id}", get(get_rule).patch(update_rule).delete(delete_rule))
        .route("/rules/{id}/customize", post(customize_rule));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &crate::config::ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use vigil_core::{OrgId, TriagePolicy, UserId};
    use vigil_engine::TriageEngine;
    use vigil_policy::Role;

    use crate::auth::{ORG_ID_HEADER, ROLE_HEADER, USER_ID_HEADER};
    use crate::config::ServerConfig;

    struct Identity {
        user: UserId,
        org: OrgId,
        role: Role,
    }

    impl Identity {
        fn new(org: OrgId, role: Role) -> Self {
            Self {
                user: UserId::new(),
                org,
                role,
            }
        }
    }

    fn make_app() -> Router {
        let engine = Arc::new(TriageEngine::in_memory(TriagePolicy::default()));
        create_router(Arc::new(ApiState::new(ServerConfig::default(), engine)))
    }

    fn request(
        method: Method,
        uri: &str,
        identity: &Identity,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, identity.user.to_string())
            .header(ORG_ID_HEADER, identity.org.to_string())
            .header(ROLE_HEADER, identity.role.as_str());

        match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = make_app();

        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn missing_identity_headers_are_unauthorized() {
        let app = make_app();

        let response = app
            .oneshot(Request::builder().uri("/api/alerts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn alert_workflow_over_http() {
        let app = make_app();
        let clinician = Identity::new(OrgId::new(), Role::Clinician);

        // Create a manual alert.
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/alerts",
                &clinician,
                Some(serde_json::json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "severity": "HIGH",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let alert = json_body(response).await;
        let alert_id = alert["id"].as_str().unwrap().to_string();
        assert_eq!(alert["status"], "PENDING");

        // It shows up in the queue.
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/alerts/triage-queue", &clinician, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let queue = json_body(response).await;
        assert_eq!(queue["pagination"]["total"], 1);

        // Claim, acknowledge, resolve.
        for action in ["claim", "acknowledge"] {
            let response = app
                .clone()
                .oneshot(request(
                    Method::POST,
                    &format!("/api/alerts/{alert_id}/{action}"),
                    &clinician,
                    None,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{action} failed");
        }

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/api/alerts/{alert_id}/resolve"),
                &clinician,
                Some(serde_json::json!({"notes": "spoke to patient"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let resolved = json_body(response).await;
        assert_eq!(resolved["status"], "RESOLVED");
    }

    #[tokio::test]
    async fn resolve_requires_notes() {
        let app = make_app();
        let clinician = Identity::new(OrgId::new(), Role::Clinician);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/alerts",
                &clinician,
                Some(serde_json::json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "severity": "LOW",
                })),
            ))
            .await
            .unwrap();
        let alert = json_body(response).await;
        let alert_id = alert["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request(
                Method::POST,
                &format!("/api/alerts/{alert_id}/resolve"),
                &clinician,
                Some(serde_json::json!({"notes": "   "})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_claim_conflicts() {
        let app = make_app();
        let org = OrgId::new();
        let first = Identity::new(org, Role::Clinician);
        let second = Identity::new(org, Role::Clinician);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/alerts",
                &first,
                Some(serde_json::json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "severity": "CRITICAL",
                })),
            ))
            .await
            .unwrap();
        let alert = json_body(response).await;
        let alert_id = alert["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/api/alerts/{alert_id}/claim"),
                &first,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(
                Method::POST,
                &format!("/api/alerts/{alert_id}/claim"),
                &second,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = json_body(response).await;
        assert_eq!(json["error"], "already_claimed");
    }

    #[tokio::test]
    async fn cross_tenant_access_is_forbidden() {
        let app = make_app();
        let owner = Identity::new(OrgId::new(), Role::Clinician);
        let outsider = Identity::new(OrgId::new(), Role::Admin);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/alerts",
                &owner,
                Some(serde_json::json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "severity": "HIGH",
                })),
            ))
            .await
            .unwrap();
        let alert = json_body(response).await;
        let alert_id = alert["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request(
                Method::GET,
                &format!("/api/alerts/{alert_id}"),
                &outsider,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn force_claim_requires_coordinator() {
        let app = make_app();
        let org = OrgId::new();
        let clinician = Identity::new(org, Role::Clinician);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/alerts",
                &clinician,
                Some(serde_json::json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "severity": "MEDIUM",
                })),
            ))
            .await
            .unwrap();
        let alert = json_body(response).await;
        let alert_id = alert["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request(
                Method::POST,
                &format!("/api/alerts/{alert_id}/force-claim"),
                &clinician,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_alert_is_not_found() {
        let app = make_app();
        let caller = Identity::new(OrgId::new(), Role::Clinician);

        let response = app
            .oneshot(request(
                Method::GET,
                &format!("/api/alerts/{}", uuid::Uuid::new_v4()),
                &caller,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_alert_id_is_bad_request() {
        let app = make_app();
        let caller = Identity::new(OrgId::new(), Role::Clinician);

        let response = app
            .oneshot(request(Method::GET, "/api/alerts/not-a-uuid", &caller, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_queue_view_is_bad_request() {
        let app = make_app();
        let caller = Identity::new(OrgId::new(), Role::Clinician);

        let response = app
            .oneshot(request(Method::GET, "/api/alerts/triage-queue?view=backlog", &caller, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn observations_open_alerts_through_rules() {
        let app = make_app();
        let org = OrgId::new();
        let admin = Identity::new(org, Role::Admin);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/rules",
                &admin,
                Some(serde_json::json!({
                    "name": "High pain score",
                    "metric": "pain_score",
                    "condition": {"type": "threshold", "comparator": ">=", "threshold": 8.0},
                    "severity": "HIGH",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/observations",
                &admin,
                Some(serde_json::json!({
                    "observations": [{
                        "org_id": admin.org,
                        "patient_id": uuid::Uuid::new_v4(),
                        "metric": "pain_score",
                        "value": 9.5,
                        "recorded_at": chrono::Utc::now(),
                    }],
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["alerts_created"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_observations_are_rejected() {
        let app = make_app();
        let caller = Identity::new(OrgId::new(), Role::Admin);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/observations",
                &caller,
                Some(serde_json::json!({
                    "observations": [{
                        "org_id": uuid::Uuid::new_v4(),
                        "patient_id": uuid::Uuid::new_v4(),
                        "metric": "pain_score",
                        "value": 9.5,
                        "recorded_at": chrono::Utc::now(),
                    }],
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rule_management_requires_admin() {
        let app = make_app();
        let clinician = Identity::new(OrgId::new(), Role::Clinician);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/rules",
                &clinician,
                Some(serde_json::json!({
                    "name": "High pain score",
                    "metric": "pain_score",
                    "condition": {"type": "threshold", "comparator": ">=", "threshold": 8.0},
                    "severity": "HIGH",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn evaluate_requires_coordinator() {
        let app = make_app();
        let clinician = Identity::new(OrgId::new(), Role::Clinician);
        let coordinator = Identity::new(OrgId::new(), Role::Coordinator);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/alerts/evaluate", &clinician, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(Method::POST, "/api/alerts/evaluate", &coordinator, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_bulk_request_is_rejected() {
        let app = make_app();
        let coordinator = Identity::new(OrgId::new(), Role::Coordinator);

        let ids: Vec<_> = (0..101).map(|_| uuid::Uuid::new_v4()).collect();
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/alerts/bulk-actions",
                &coordinator,
                Some(serde_json::json!({
                    "action": {"type": "acknowledge"},
                    "alert_ids": ids,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_reports_per_item_outcomes() {
        let app = make_app();
        let org = OrgId::new();
        let clinician = Identity::new(org, Role::Clinician);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/alerts",
                &clinician,
                Some(serde_json::json!({
                    "patient_id": uuid::Uuid::new_v4(),
                    "severity": "HIGH",
                })),
            ))
            .await
            .unwrap();
        let alert = json_body(response).await;
        let alert_id = alert["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/alerts/bulk-actions",
                &clinician,
                Some(serde_json::json!({
                    "action": {"type": "claim"},
                    "alert_ids": [alert_id, uuid::Uuid::new_v4()],
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = json_body(response).await;
        assert_eq!(outcome["succeeded"], 1);
        assert_eq!(outcome["failed"], 1);
    }

    #[tokio::test]
    async fn unknown_endpoint_is_not_found() {
        let app = make_app();

        let response = app
            .oneshot(Request::builder().uri("/api/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
