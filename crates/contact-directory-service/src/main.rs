use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use clap::Parser;
use contact_directory_api::ContactDirectoryApi;
use contact_directory_core::{
    ContactRecord, CreateContactRequest, DirectoryError, UpdateContactRequest, ValidationErrors,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Debug, Clone)]
struct ServiceState {
    api: ContactDirectoryApi,
}

/// Wire shape shared by every contact route. `HasError` always agrees with the status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseEnvelope<T>
where
    T: Serialize,
{
    message: String,
    has_error: bool,
    data: Option<T>,
}

impl<T: Serialize> ResponseEnvelope<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self { message: message.into(), has_error: false, data: Some(data) }
    }
}

#[derive(Debug, Clone)]
struct ServiceError {
    status: StatusCode,
    message: String,
    violations: Option<ValidationErrors>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "contact-directory-service")]
#[command(about = "HTTP service for the contact directory")]
struct Args {
    #[arg(long, env = "CONTACTS_DB", default_value = "./contacts.sqlite3")]
    db: PathBuf,
    #[arg(long, env = "CONTACTS_BIND", default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl ServiceError {
    fn new(status: StatusCode, message: String) -> Self {
        Self { status, message, violations: None }
    }

    fn malformed_body(rejection: &JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, format!("Malformed request body: {}", rejection.body_text()))
    }

    /// A path segment that does not decode (for example invalid percent-encoded UTF-8).
    fn malformed_path(rejection: &PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, format!("Malformed request path: {}", rejection.body_text()))
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Validation(errors) => Self {
                status: StatusCode::BAD_REQUEST,
                message: format!("Invalid contact data: {errors}"),
                violations: Some(errors),
            },
            DirectoryError::NotFound { id } => {
                Self::new(StatusCode::NOT_FOUND, format!("Contact with id {id} not found"))
            }
            DirectoryError::Storage(detail) => {
                warn!(error = %detail, "contact store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Storage failure: {detail}"))
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // Validation failures carry the per-field violations; every other error has null data.
        let body = ResponseEnvelope { message: self.message, has_error: true, data: self.violations };
        (self.status, Json(body)).into_response()
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/openapi", get(openapi))
        .route("/contacts", post(create_contact))
        .route("/contacts/getAll", get(list_contacts))
        .route("/contacts/getByDDD/:code", get(list_contacts_by_area_code))
        .route("/contacts/getById/:id", get(get_contact))
        .route("/contacts/updateById/:id", put(update_contact))
        .route("/contacts/deleteById/:id", delete(delete_contact))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let api = ContactDirectoryApi::new(args.db.clone());
    let migrated = api.migrate(false)?;
    info!(
        db = %args.db.display(),
        schema_version = ?migrated.after_version,
        "contact store ready"
    );

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(bind = %args.bind, "contact directory service listening");
    axum::serve(listener, app(ServiceState { api })).await?;
    Ok(())
}

async fn health() -> Json<ResponseEnvelope<HealthResponse>> {
    Json(ResponseEnvelope::ok("Service is healthy", HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn create_contact(
    State(state): State<ServiceState>,
    payload: Result<Json<CreateContactRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope<ContactRecord>>, ServiceError> {
    let Json(request) = payload.map_err(|rejection| ServiceError::malformed_body(&rejection))?;
    let record = state.api.create_contact(request)?;
    Ok(Json(ResponseEnvelope::ok("Contact created successfully", record)))
}

async fn list_contacts(
    State(state): State<ServiceState>,
) -> Result<Json<ResponseEnvelope<Vec<ContactRecord>>>, ServiceError> {
    let records = state.api.list_contacts()?;
    Ok(Json(ResponseEnvelope::ok("Contacts retrieved successfully", records)))
}

async fn list_contacts_by_area_code(
    State(state): State<ServiceState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ResponseEnvelope<Vec<ContactRecord>>>, ServiceError> {
    let Path(code) = path.map_err(|rejection| ServiceError::malformed_path(&rejection))?;
    let records = state.api.list_contacts_by_area_code(&code)?;
    Ok(Json(ResponseEnvelope::ok("Filtered contacts retrieved successfully", records)))
}

async fn get_contact(
    State(state): State<ServiceState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ResponseEnvelope<ContactRecord>>, ServiceError> {
    let Path(id) = path.map_err(|rejection| ServiceError::malformed_path(&rejection))?;
    let record = state.api.get_contact(&id)?;
    Ok(Json(ResponseEnvelope::ok("Contact retrieved successfully", record)))
}

async fn update_contact(
    State(state): State<ServiceState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateContactRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope<ContactRecord>>, ServiceError> {
    let Path(id) = path.map_err(|rejection| ServiceError::malformed_path(&rejection))?;
    let Json(request) = payload.map_err(|rejection| ServiceError::malformed_body(&rejection))?;
    let record = state.api.update_contact(&id, request)?;
    Ok(Json(ResponseEnvelope::ok(format!("Contact with id {id} updated successfully"), record)))
}

async fn delete_contact(
    State(state): State<ServiceState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ResponseEnvelope<ContactRecord>>, ServiceError> {
    let Path(id) = path.map_err(|rejection| ServiceError::malformed_path(&rejection))?;
    let record = state.api.delete_contact(&id)?;
    Ok(Json(ResponseEnvelope::ok(format!("Contact with id {id} deleted successfully"), record)))
}
