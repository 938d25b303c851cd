//! REST API handlers mounted under `/api`.
//!
//! Every handler answers with the same envelope so the HR screens can track
//! staleness through the revision counter:
//!
//! ```text
//! { "success": true,  "data": ...,                       "revisionId": 42 }
//! { "success": false, "error": { code, message, details? }, "revisionId": 42 }
//! ```
//!
//! Reads report the revision they observed. Writes report the revision after
//! their own bump, or the pre-write revision when they are rejected.

mod datastore;
mod departments;
mod employees;
mod hierarchy;
mod search;

pub use datastore::*;
pub use departments::*;
pub use employees::*;
pub use hierarchy::*;
pub use search::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Handler result: an enveloped payload or an enveloped error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Success envelope around employees, departments, trees or search hits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse {
        success: true,
        data,
        revision_id,
    })
}

pub fn error<T: Serialize>(error: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision { error, revision_id })
}

/// Revision to stamp on a response; 0 when the meta row cannot be read.
pub(crate) async fn current_revision(state: &AppState) -> i64 {
    state.repo.get_revision_id().await.unwrap_or(0)
}
