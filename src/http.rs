/**
 * API REST VIGIE - Serveur HTTP principal
 *
 * RÔLE :
 * Expose l'ingestion de samples et les vues de lecture : API JSON,
 * roster clients, health check et dashboard HTML.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes /api/metrics (POST+GET), /api/clients, /health, /
 * - Identifiant client dérivé par requête : client_name > client_id > IP source
 * - Erreurs JSON standardisées : 400 corps vide/invalide, 500 échec stockage
 *
 * SÉCURITÉ : aucune authentification, outil réseau interne de confiance ;
 * le texte des erreurs est restitué tel quel à l'appelant.
 */
use crate::charts;
use crate::config::ServerConfig;
use crate::dashboard;
use crate::models::Sample;
use crate::store::{MetricsStore, SampleOrder, StoreError};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetricsStore>,
    pub cfg: ServerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    message: &'static str,
    client_id: String,
    stored_count: usize,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    order: Option<String>,
}

impl ListParams {
    /// Ordre explicite de la fenêtre récente : `newest` (défaut) ou `oldest`.
    fn sample_order(&self) -> Result<SampleOrder, ApiError> {
        match self.order.as_deref() {
            None | Some("newest") => Ok(SampleOrder::NewestFirst),
            Some("oldest") => Ok(SampleOrder::OldestFirst),
            Some(other) => Err(ApiError::InvalidRequest(format!(
                "Unknown order '{other}', expected 'newest' or 'oldest'"
            ))),
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(render_dashboard))
        .route("/health", get(health))
        .route("/api/metrics", get(get_metrics).post(receive_metrics))
        .route("/api/clients", get(get_clients))
        .route("/api/clients/{client_id}/metrics", get(get_client_metrics))
        .with_state(app_state)
}

// POST /api/metrics (ingestion d'un sample)
async fn receive_metrics(
    State(app): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::InvalidRequest("No data provided".into()));
    }
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid JSON body: {e}")))?;
    let non_empty = payload.as_object().is_some_and(|o| !o.is_empty());
    if !non_empty {
        return Err(ApiError::InvalidRequest("No data provided".into()));
    }

    let mut sample: Sample =
        serde_json::from_value(payload).map_err(|e| ApiError::Internal(e.to_string()))?;

    // Horodatage serveur de réception
    sample.received_at = Some(
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
    );

    // Identifiant client : nom fourni > id fourni > adresse d'origine.
    // Une chaîne vide ne compte pas comme fournie.
    let client_id = sample
        .client_name
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| sample.client_id.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| addr.ip().to_string());

    let stored_count = app.store.append(&client_id, sample)?;

    Ok(Json(IngestResponse {
        status: "success",
        message: "Metrics received",
        client_id,
        stored_count,
    }))
}

// GET /api/metrics (vue fusionnée tous clients)
async fn get_metrics(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = params.limit.unwrap_or(usize::MAX);
    let metrics = app.store.all_samples(limit, params.sample_order()?)?;
    Ok(Json(serde_json::json!({
        "total_entries": app.store.total_samples()?,
        "total_clients": app.store.total_clients()?,
        "metrics": metrics,
    })))
}

// GET /api/clients/{client_id}/metrics (historique d'un seul client)
async fn get_client_metrics(
    State(app): State<AppState>,
    Path(client_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = params.limit.unwrap_or(usize::MAX);
    // Client inconnu = historique vide, pas une erreur
    let metrics = app
        .store
        .client_samples(&client_id, limit, params.sample_order()?)?;
    Ok(Json(serde_json::json!({
        "client_id": client_id,
        "metric_count": metrics.len(),
        "metrics": metrics,
    })))
}

// GET /api/clients (roster)
async fn get_clients(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    let clients = app.store.roster()?;
    Ok(Json(serde_json::json!({
        "total_clients": clients.len(),
        "clients": clients,
    })))
}

// GET /health
async fn health(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "clients": app.store.total_clients()?,
        "timestamp": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    })))
}

// GET / (dashboard HTML)
async fn render_dashboard(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    let base_url = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_default();

    let table = app
        .store
        .all_samples(app.cfg.page_size, SampleOrder::NewestFirst)?;
    // Fenêtre récente en ordre chronologique pour les courbes
    let window = app
        .store
        .all_samples(app.cfg.chart_window, SampleOrder::OldestFirst)?;
    let charts = charts::build_charts(&window);

    let page = dashboard::render(
        &table,
        &charts,
        app.store.total_clients()?,
        app.store.total_samples()?,
        &base_url,
    );
    Ok(Html(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new(100)),
            cfg: ServerConfig::default(),
        }
    }

    fn post_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/metrics")
            .header("content-type", "application/json")
            .extension(ConnectInfo(SocketAddr::from(([1, 2, 3, 4], 9000))))
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_success_and_round_trip() {
        let app = build_router(test_state());
        let response = app
            .clone()
            .oneshot(post_request(
                r#"{"timestamp": "2025-01-01T10:00:00", "client_name": "X", "custom": [1, 2]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["client_id"], "X");
        assert_eq!(body["stored_count"], 1);

        // Round-trip : champs d'origine + received_at + client_id
        let response = app
            .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["total_entries"], 1);
        assert_eq!(body["total_clients"], 1);
        let metric = &body["metrics"][0];
        assert_eq!(metric["client_id"], "X");
        assert_eq!(metric["custom"], serde_json::json!([1, 2]));
        assert!(metric["received_at"].is_string());
    }

    #[tokio::test]
    async fn test_empty_body_rejected_without_side_effect() {
        let state = test_state();
        let app = build_router(state.clone());

        for body in ["", "{}", "null"] {
            let response = app.clone().oneshot(post_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert!(body["error"].is_string());
        }
        assert_eq!(state.store.total_samples().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_client_id_precedence() {
        let state = test_state();
        let app = build_router(state.clone());

        let cases = [
            (r#"{"client_name": "X", "client_id": "Y"}"#, "X"),
            (r#"{"client_id": "Y"}"#, "Y"),
            (r#"{"cpu_percent": 5}"#, "1.2.3.4"),
            // Identifiant vide = absent : repli sur le candidat suivant
            (r#"{"client_name": "", "client_id": "Y"}"#, "Y"),
            (r#"{"client_name": "", "client_id": ""}"#, "1.2.3.4"),
        ];
        for (payload, expected) in cases {
            let response = app.clone().oneshot(post_request(payload)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["client_id"], expected, "payload: {payload}");
        }

        let roster = state.store.roster().unwrap();
        let ids: Vec<_> = roster.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, vec!["1.2.3.4", "X", "Y"]);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_honors_order_param() {
        let app = build_router(test_state());
        for ts in ["10:00:01", "10:00:02"] {
            app.clone()
                .oneshot(post_request(&format!(
                    r#"{{"timestamp": "2025-01-01T{ts}", "client_id": "pc"}}"#
                )))
                .await
                .unwrap();
        }

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/metrics?order=oldest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metrics"][0]["timestamp"], "2025-01-01T10:00:01");
        assert_eq!(body["metrics"][1]["timestamp"], "2025-01-01T10:00:02");

        // Même validation d'ordre que la route par client
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/metrics?order=sideways")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clients_endpoint_reports_roster() {
        let app = build_router(test_state());
        app.clone()
            .oneshot(post_request(
                r#"{"timestamp": "2025-01-01T10:00:00", "client_name": "X"}"#,
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_request(
                r#"{"timestamp": "2025-01-01T10:00:05", "client_name": "X"}"#,
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/api/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_clients"], 1);
        assert_eq!(body["clients"][0]["client_id"], "X");
        assert_eq!(body["clients"][0]["metric_count"], 2);
        assert_eq!(body["clients"][0]["last_seen"], "2025-01-01T10:00:05");
    }

    #[tokio::test]
    async fn test_client_metrics_window_with_order_param() {
        let app = build_router(test_state());
        for ts in ["10:00:01", "10:00:02", "10:00:03"] {
            app.clone()
                .oneshot(post_request(&format!(
                    r#"{{"timestamp": "2025-01-01T{ts}", "client_id": "pc"}}"#
                )))
                .await
                .unwrap();
        }

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/clients/pc/metrics?limit=2&order=oldest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metric_count"], 2);
        // Fenêtre des 2 plus récents, parcourue en ordre chronologique
        assert_eq!(body["metrics"][0]["timestamp"], "2025-01-01T10:00:02");
        assert_eq!(body["metrics"][1]["timestamp"], "2025-01-01T10:00:03");

        // Ordre invalide : 400
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/clients/pc/metrics?order=sideways")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Client inconnu : historique vide
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/clients/ghost/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metric_count"], 0);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["clients"], 0);
    }

    #[tokio::test]
    async fn test_dashboard_renders_html() {
        let app = build_router(test_state());
        app.clone()
            .oneshot(post_request(
                r#"{"timestamp": "2025-01-01T10:00:00", "client_name": "X", "cpu_percent": 10}"#,
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_request(
                r#"{"timestamp": "2025-01-01T10:00:05", "client_name": "X", "cpu_percent": 20}"#,
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "localhost:8000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("System Metrics Dashboard"));
        assert!(page.contains("<strong>X</strong>"));
        // 2 points CPU : le graphique CPU est présent
        assert!(page.contains("CPU Usage"));
        assert!(page.contains("data:image/svg+xml;base64,"));
    }
}
