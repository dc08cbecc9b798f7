use std::sync::Arc;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shared::protocol::{QueryResponse, APPS_PATH, TRANSACTION_ID_HEADER};
use tracing::Instrument;
use crate::error::{ApiError, QueryError};
use crate::query::QueryService;
use crate::registry::RegistryFetcher;
use crate::strategy::GroupBy;

pub struct AppState<F> {
    pub query: Arc<QueryService<F>>,
}

impl<F> AppState<F> {
    pub fn new(query: QueryService<F>) -> Self {
        Self {
            query: Arc::new(query),
        }
    }
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            query: Arc::clone(&self.query),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppsRequest {
    #[serde(rename = "eurekaServerURL")]
    pub eureka_server_url: Option<String>,
    #[serde(rename = "groupBy")]
    pub group_by: Option<String>,
}

impl AppsRequest {
    /// Parameter checks done before the query runs. Reports every
    /// failing field as `field: message; `.
    pub fn validate(&self) -> Result<(), QueryError> {
        let mut problems = String::new();

        if is_blank(self.eureka_server_url.as_deref()) {
            problems.push_str("eurekaServerURL: Eureka server URL must not be blank.; ");
        }

        match self.group_by.as_deref().map(str::trim) {
            None | Some("") => problems.push_str("groupBy: GroupBy parameter is required.; "),
            Some(key)
                if !key.eq_ignore_ascii_case(GroupBy::SERVERS)
                    && !key.eq_ignore_ascii_case(GroupBy::SERVICES) =>
            {
                problems.push_str("groupBy: groupBy must be either 'servers' or 'services'; ")
            }
            Some(_) => {}
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(QueryError::InvalidRequest(problems))
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub fn router<F: RegistryFetcher + 'static>(state: AppState<F>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(APPS_PATH, get(get_apps::<F>).post(post_apps::<F>))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn get_apps<F: RegistryFetcher + 'static>(
    State(state): State<AppState<F>>,
    headers: HeaderMap,
    params: Result<Query<AppsRequest>, QueryRejection>,
) -> Response {
    let request = params.map(|Query(params)| params).map_err(|e| {
        tracing::debug!("Rejected query string: {}", e);
        QueryError::invalid("Malformed request parameters")
    });
    respond(&state, &headers, request).await
}

async fn post_apps<F: RegistryFetcher + 'static>(
    State(state): State<AppState<F>>,
    headers: HeaderMap,
    payload: Result<Json<AppsRequest>, JsonRejection>,
) -> Response {
    let request = payload.map(|Json(body)| body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        QueryError::invalid("Malformed JSON request body")
    });
    respond(&state, &headers, request).await
}

async fn respond<F: RegistryFetcher>(
    state: &AppState<F>,
    headers: &HeaderMap,
    request: Result<AppsRequest, QueryError>,
) -> Response {
    let transaction_id = transaction_id(headers);
    let span = tracing::info_span!("query", transaction_id = %transaction_id);

    let result = execute(state, request, &transaction_id).instrument(span).await;

    let mut response = match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => ApiError {
            transaction_id: transaction_id.clone(),
            error,
        }
        .into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&transaction_id) {
        response.headers_mut().insert(TRANSACTION_ID_HEADER, value);
    }
    response
}

async fn execute<F: RegistryFetcher>(
    state: &AppState<F>,
    request: Result<AppsRequest, QueryError>,
    transaction_id: &str,
) -> Result<QueryResponse, QueryError> {
    let request = request?;
    request.validate()?;

    state
        .query
        .handle(
            request.group_by.as_deref(),
            request.eureka_server_url.as_deref().unwrap_or_default(),
            transaction_id,
        )
        .await
}

/// Caller-supplied correlation id, or a fresh one
fn transaction_id(headers: &HeaderMap) -> String {
    headers
        .get(TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
