//! Hierarchy API endpoints.
//!
//! Every call reads one datastore snapshot and builds a fresh tree from it;
//! nothing is cached between requests.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::employees::index_employee;
use super::{current_revision, error, success, ApiResult};
use crate::hierarchy::{build_hierarchy, find_root};
use crate::models::{Employee, HierarchyState, HierarchyStats, HierarchyView};
use crate::AppState;

/// Hierarchy query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct HierarchyQuery {
    /// `employees` (default) or `departments`.
    #[serde(default)]
    pub view: HierarchyView,
}

/// Result of the bootstrap action.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapResponse {
    pub employee: Employee,
    /// `false` when a forced root already existed.
    pub created: bool,
}

/// GET /api/hierarchy - Build the tree for the requested view.
pub async fn get_hierarchy(
    State(state): State<AppState>,
    Query(params): Query<HierarchyQuery>,
) -> ApiResult<HierarchyState> {
    match state.repo.get_datastore().await {
        Ok(snapshot) => {
            let hierarchy = build_hierarchy(&snapshot, params.view);
            success(hierarchy, snapshot.revision_id)
        }
        Err(e) => {
            let revision_id = current_revision(&state).await;
            error(e, revision_id)
        }
    }
}

/// GET /api/hierarchy/stats - Summary counts, `null` while there is no tree.
pub async fn get_hierarchy_stats(
    State(state): State<AppState>,
    Query(params): Query<HierarchyQuery>,
) -> ApiResult<Option<HierarchyStats>> {
    match state.repo.get_datastore().await {
        Ok(snapshot) => {
            let stats = match build_hierarchy(&snapshot, params.view) {
                HierarchyState::Ready { stats, .. } => Some(stats),
                HierarchyState::Empty | HierarchyState::NoRootFound => None,
            };
            success(stats, snapshot.revision_id)
        }
        Err(e) => {
            let revision_id = current_revision(&state).await;
            error(e, revision_id)
        }
    }
}

/// GET /api/hierarchy/root - The employee anchoring the org-chart, or `null`.
pub async fn get_hierarchy_root(State(state): State<AppState>) -> ApiResult<Option<Employee>> {
    match state.repo.get_datastore().await {
        Ok(snapshot) => {
            let root = find_root(&snapshot.employees).cloned();
            success(root, snapshot.revision_id)
        }
        Err(e) => {
            let revision_id = current_revision(&state).await;
            error(e, revision_id)
        }
    }
}

/// POST /api/hierarchy/bootstrap - Create the default root employee.
pub async fn bootstrap_hierarchy(State(state): State<AppState>) -> ApiResult<BootstrapResponse> {
    let revision_id = current_revision(&state).await;

    match state.repo.create_default_root().await {
        Ok((employee, created)) => {
            if created {
                index_employee(&state, &employee).await;
            }
            let new_revision = current_revision(&state).await;
            success(BootstrapResponse { employee, created }, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
