//! Directory search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{current_revision, error, success, ApiResult};
use crate::models::Employee;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Search result with employees and metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Single search result item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub employee: Employee,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Search the employee directory.
pub async fn search_employees(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let revision_id = current_revision(&state).await;

    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    let search_results = match state.search.search(&params.q, limit, params.offset) {
        Ok(results) => results,
        Err(e) => return error(e, revision_id),
    };

    // Hits for records deleted since indexing are skipped
    let mut results = Vec::new();
    for hit in search_results {
        if let Ok(Some(employee)) = state.repo.get_employee(&hit.employee_id).await {
            results.push(SearchResultItem {
                employee,
                score: hit.score,
            });
        }
    }

    let total = results.len();

    success(
        SearchResponse {
            results,
            total,
            limit,
            offset: params.offset,
        },
        revision_id,
    )
}
