//! Employee API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{current_revision, error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateEmployeeRequest, Employee, UpdateEmployeeRequest};
use crate::AppState;

/// GET /api/employees - List all employees.
pub async fn list_employees(State(state): State<AppState>) -> ApiResult<Vec<Employee>> {
    let revision_id = current_revision(&state).await;

    match state.repo.list_employees().await {
        Ok(employees) => success(employees, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/employees/:id - Get a single employee.
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Employee> {
    let revision_id = current_revision(&state).await;

    match state.repo.get_employee(&id).await {
        Ok(Some(employee)) => success(employee, revision_id),
        Ok(None) => error(AppError::employee_not_found(&id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/employees - Create a new employee.
pub async fn create_employee(
    State(state): State<AppState>,
    Json(request): Json<CreateEmployeeRequest>,
) -> ApiResult<Employee> {
    let revision_id = current_revision(&state).await;

    if request.first_name.trim().is_empty() && request.last_name.trim().is_empty() {
        return error(
            AppError::Validation("First name or last name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_employee(&request).await {
        Ok(employee) => {
            index_employee(&state, &employee).await;
            let new_revision = current_revision(&state).await;
            success(employee, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/employees/:id - Update an employee.
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> ApiResult<Employee> {
    let revision_id = current_revision(&state).await;

    if let Some(Some(manager_id)) = &request.manager_id {
        if *manager_id == id {
            return error(
                AppError::Validation("An employee cannot be their own manager".to_string()),
                revision_id,
            );
        }
    }

    match state.repo.update_employee(&id, &request).await {
        Ok(employee) => {
            index_employee(&state, &employee).await;
            let new_revision = current_revision(&state).await;
            success(employee, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/employees/:id - Delete an employee.
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = current_revision(&state).await;

    match state.repo.delete_employee(&id).await {
        Ok(()) => {
            if let Err(e) = state.search.remove_employee(&id).await {
                tracing::warn!("Failed to remove employee from index: {}", e);
            }
            let new_revision = current_revision(&state).await;
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// Keep the directory index in line with a written employee.
pub(crate) async fn index_employee(state: &AppState, employee: &Employee) {
    let departments = state.repo.list_departments().await.unwrap_or_default();
    if let Err(e) = state.search.index_employee(employee, &departments).await {
        tracing::warn!("Failed to index employee {}: {}", employee.id, e);
    }
}
