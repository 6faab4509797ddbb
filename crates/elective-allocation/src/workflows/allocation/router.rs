use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CourseId, PackageId, StudentId};
use super::repository::{AllocationStore, RepositoryError};
use super::service::{AllocationService, AllocationServiceError};

/// Ranked list submitted by a student. Index 0 is the favourite.
#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceSubmission {
    pub courses: Vec<CourseId>,
}

/// Administrative update of the submission window.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowUpdate {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Router builder exposing the administrative and student-facing allocation endpoints.
pub fn allocation_router<S>(service: Arc<AllocationService<S>>) -> Router
where
    S: AllocationStore + 'static,
{
    Router::new()
        .route("/api/v1/packages/:package_id", get(package_handler::<S>))
        .route(
            "/api/v1/packages/:package_id/allocation",
            post(run_allocation_handler::<S>),
        )
        .route(
            "/api/v1/packages/:package_id/window",
            get(window_status_handler::<S>).put(set_window_handler::<S>),
        )
        .route(
            "/api/v1/packages/:package_id/students/:student_id/preferences",
            put(submit_preferences_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn run_allocation_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    Path(package_id): Path<String>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let package_id = PackageId(package_id);
    match service.run_allocation(&package_id, Utc::now()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn package_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    Path(package_id): Path<String>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let package_id = PackageId(package_id);
    match service.package_view(&package_id, Utc::now()) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn window_status_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    Path(package_id): Path<String>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let package_id = PackageId(package_id);
    match service.window_status(&package_id, Utc::now()) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn set_window_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    Path(package_id): Path<String>,
    axum::Json(update): axum::Json<WindowUpdate>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let package_id = PackageId(package_id);
    match service.set_window(&package_id, update.start, update.end) {
        Ok(window) => {
            let payload = json!({
                "package_id": package_id,
                "start": window.start,
                "end": window.end,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_preferences_handler<S>(
    State(service): State<Arc<AllocationService<S>>>,
    Path((package_id, student_id)): Path<(String, String)>,
    axum::Json(submission): axum::Json<PreferenceSubmission>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let package_id = PackageId(package_id);
    let student_id = StudentId(student_id);
    match service.submit_preferences(&package_id, &student_id, submission.courses, Utc::now()) {
        Ok(record) => (StatusCode::ACCEPTED, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn status_for(error: &AllocationServiceError) -> StatusCode {
    match error {
        AllocationServiceError::PackageNotFound { .. }
        | AllocationServiceError::StudentNotFound { .. } => StatusCode::NOT_FOUND,
        AllocationServiceError::EmptyPackage { .. }
        | AllocationServiceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AllocationServiceError::WindowClosed { .. } => StatusCode::FORBIDDEN,
        AllocationServiceError::Lease(_) => StatusCode::CONFLICT,
        AllocationServiceError::Persistence {
            source: RepositoryError::Unavailable(_),
            ..
        }
        | AllocationServiceError::Repository {
            source: RepositoryError::Unavailable(_),
            ..
        } => StatusCode::SERVICE_UNAVAILABLE,
        AllocationServiceError::Persistence { .. } | AllocationServiceError::Repository { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn error_response(error: AllocationServiceError) -> Response {
    let status = status_for(&error);
    let payload = json!({
        "error": error.to_string(),
        "package_id": error.package_id(),
    });
    (status, axum::Json(payload)).into_response()
}
