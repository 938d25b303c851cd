//! Department API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{current_revision, error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateDepartmentRequest, Department, UpdateDepartmentRequest};
use crate::AppState;

/// GET /api/departments - List all departments.
pub async fn list_departments(State(state): State<AppState>) -> ApiResult<Vec<Department>> {
    let revision_id = current_revision(&state).await;

    match state.repo.list_departments().await {
        Ok(departments) => success(departments, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/departments/:id - Get a single department.
pub async fn get_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Department> {
    let revision_id = current_revision(&state).await;

    match state.repo.get_department(&id).await {
        Ok(Some(department)) => success(department, revision_id),
        Ok(None) => error(AppError::department_not_found(&id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/departments - Create a new department.
pub async fn create_department(
    State(state): State<AppState>,
    Json(request): Json<CreateDepartmentRequest>,
) -> ApiResult<Department> {
    let revision_id = current_revision(&state).await;

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Department name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_department(&request).await {
        Ok(department) => {
            let new_revision = current_revision(&state).await;
            success(department, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/departments/:id - Update a department.
pub async fn update_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDepartmentRequest>,
) -> ApiResult<Department> {
    let revision_id = current_revision(&state).await;

    if matches!(&request.name, Some(name) if name.trim().is_empty()) {
        return error(
            AppError::Validation("Department name is required".to_string()),
            revision_id,
        );
    }
    if matches!(&request.parent_department_id, Some(Some(parent)) if *parent == id) {
        return error(
            AppError::Validation("A department cannot be its own parent".to_string()),
            revision_id,
        );
    }

    match state.repo.update_department(&id, &request).await {
        Ok(department) => {
            refresh_directory(&state).await;
            let new_revision = current_revision(&state).await;
            success(department, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/departments/:id - Delete a department.
pub async fn delete_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = current_revision(&state).await;

    match state.repo.delete_department(&id).await {
        Ok(()) => {
            refresh_directory(&state).await;
            let new_revision = current_revision(&state).await;
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// Department names are part of every employee document, so a renamed or
/// removed department means a full rebuild.
async fn refresh_directory(state: &AppState) {
    let snapshot = match state.repo.get_datastore().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("Failed to read snapshot for directory rebuild: {}", e);
            return;
        }
    };
    if let Err(e) = state
        .search
        .rebuild(&snapshot.employees, &snapshot.departments)
        .await
    {
        tracing::warn!("Failed to rebuild directory index: {}", e);
    }
}
