//! Component session endpoints.
//!
//! Every route is scoped by the `{tenant}` path segment. Component names in
//! paths may carry `_@_` in place of `/`.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sift_session::{
    ComponentConfiguration, ComponentDescriptor, CreateInput, Error as SessionError,
    OutputColumn, Row, SessionInfo, unescape_component_name,
};

use crate::error::{Result, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters for session creation.
#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    /// Session timeout in milliseconds.
    pub timeout: Option<String>,
}

/// Body of a processing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInput {
    /// Rows to push through the session's component.
    pub data: Vec<Row>,
}

/// Rows produced by a processing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub rows: Vec<Row>,
}

/// Body of a stateless invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatelessInput {
    /// Component name, escaped or not.
    pub component: String,
    #[serde(default)]
    pub configuration: ComponentConfiguration,
    #[serde(default)]
    pub data: Vec<Row>,
}

/// Query parameters for a stateless invocation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatelessQuery {
    /// `tabular` (default) or `map`.
    pub output_style: Option<String>,
    /// Include output column metadata.
    #[serde(default)]
    pub columns: bool,
}

/// Response of a stateless invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatelessOutput {
    /// Arrays in `tabular` style, objects keyed by column name in `map` style.
    pub rows: Vec<Value>,
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<OutputColumn>>,
}

/// Final result of a deleted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub result: Option<Value>,
}

/// Live sessions of a tenant.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionInfo>,
    pub total: usize,
}

/// Components that can be instantiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub components: Vec<ComponentDescriptor>,
    pub total: usize,
}

/// Output columns a configuration would produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputColumnsResponse {
    pub columns: Vec<OutputColumn>,
}

/// Row shape of stateless output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Tabular,
    Map,
}

impl OutputStyle {
    /// Parse the `outputStyle` parameter. Empty means tabular; `document` is
    /// an alias of `map`.
    pub fn parse(value: Option<&str>) -> sift_session::Result<Self> {
        match value.map(str::trim).unwrap_or_default() {
            "" | "tabular" => Ok(OutputStyle::Tabular),
            "map" | "document" => Ok(OutputStyle::Map),
            other => Err(SessionError::InvalidConfiguration(format!(
                "unknown output style '{other}'"
            ))),
        }
    }

    fn render(self, rows: Vec<Row>, columns: &[OutputColumn]) -> Vec<Value> {
        match self {
            OutputStyle::Tabular => rows.into_iter().map(Value::Array).collect(),
            OutputStyle::Map => rows
                .into_iter()
                .map(|row| {
                    let object: Map<String, Value> = columns
                        .iter()
                        .map(|c| c.name.clone())
                        .zip(row)
                        .collect();
                    Value::Object(object)
                })
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /{tenant}/components - List live sessions.
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Json<ListSessionsResponse> {
    let sessions = state.cache.list(&tenant);
    let total = sessions.len();
    Json(ListSessionsResponse { sessions, total })
}

/// POST /{tenant}/components/{name} - Create a session.
///
/// Returns the session id as plain text with 201.
pub async fn create_session_handler(
    State(state): State<AppState>,
    Path((tenant, name)): Path<(String, String)>,
    query: std::result::Result<Query<CreateQuery>, QueryRejection>,
    body: std::result::Result<Json<CreateInput>, JsonRejection>,
) -> Result<(StatusCode, String)> {
    let Query(query) = query?;
    let Json(input) = body?;
    let timeout = match query.timeout.as_deref().map(str::trim) {
        None | Some("") => state.cache.default_timeout(),
        Some(raw) => raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            ServerError::BadRequest(format!("timeout must be a number of milliseconds, got '{raw}'"))
        })?,
    };
    let name = unescape_component_name(&name);

    let id = state
        .with_cache(move |cache| cache.create_session(&tenant, &name, input, timeout))
        .await?;
    Ok((StatusCode::CREATED, id))
}

/// PUT /{tenant}/components/{id} - Push rows through a session.
pub async fn process_handler(
    State(state): State<AppState>,
    Path((tenant, id)): Path<(String, String)>,
    body: std::result::Result<Json<ProcessInput>, JsonRejection>,
) -> Result<Json<ProcessOutput>> {
    let Json(input) = body?;
    let rows = state
        .with_cache(move |cache| cache.process(&tenant, &id, input.data))
        .await?;
    Ok(Json(ProcessOutput { rows }))
}

/// DELETE /{tenant}/components/{id} - Close a session and return its result.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path((tenant, id)): Path<(String, String)>,
) -> Result<Json<FinalResult>> {
    let result = state
        .with_cache(move |cache| cache.finalize(&tenant, &id))
        .await?;
    Ok(Json(FinalResult { result }))
}

/// PUT /{tenant}/components - Run rows through a component without a session.
pub async fn stateless_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    query: std::result::Result<Query<StatelessQuery>, QueryRejection>,
    body: std::result::Result<Json<StatelessInput>, JsonRejection>,
) -> Result<Json<StatelessOutput>> {
    let Query(query) = query?;
    let Json(input) = body?;
    let style = OutputStyle::parse(query.output_style.as_deref())?;
    let name = unescape_component_name(&input.component);
    let create = CreateInput::new(input.configuration);
    let data = input.data;

    let output = state
        .with_cache(move |cache| cache.process_once(&tenant, &name, create, data))
        .await?;

    let rows = style.render(output.rows, &output.columns);
    Ok(Json(StatelessOutput {
        rows,
        result: output.result,
        columns: query.columns.then_some(output.columns),
    }))
}

/// POST /{tenant}/components/{key}/_output_columns - Preview output columns.
pub async fn output_columns_handler(
    State(state): State<AppState>,
    Path((_tenant, name)): Path<(String, String)>,
    body: std::result::Result<Json<CreateInput>, JsonRejection>,
) -> Result<Json<OutputColumnsResponse>> {
    let Json(input) = body?;
    let name = unescape_component_name(&name);
    let columns = state
        .with_cache(move |cache| cache.output_columns(&name, &input))
        .await?;
    Ok(Json(OutputColumnsResponse { columns }))
}

/// GET /{tenant}/components/_catalog - List available components.
pub async fn catalog_handler(State(state): State<AppState>) -> Json<CatalogResponse> {
    let components = state.cache.descriptors();
    let total = components.len();
    Json(CatalogResponse { components, total })
}

/// GET /{tenant}/components/_catalog/{name} - Describe one component.
pub async fn descriptor_handler(
    State(state): State<AppState>,
    Path((_tenant, name)): Path<(String, String)>,
) -> Result<Json<ComponentDescriptor>> {
    let name = unescape_component_name(&name);
    state
        .cache
        .descriptor(&name)
        .map(Json)
        .ok_or(ServerError::ComponentNotFound(name))
}

/// Create component routes.
pub fn component_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{tenant}/components",
            get(list_sessions_handler).put(stateless_handler),
        )
        .route("/{tenant}/components/_catalog", get(catalog_handler))
        .route("/{tenant}/components/_catalog/{name}", get(descriptor_handler))
        .route(
            "/{tenant}/components/{key}",
            post(create_session_handler)
                .put(process_handler)
                .delete(delete_session_handler),
        )
        .route(
            "/{tenant}/components/{key}/_output_columns",
            post(output_columns_handler),
        )
}
