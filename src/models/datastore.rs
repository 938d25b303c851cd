//! Datastore snapshot model matching the frontend Datastore interface.

use serde::{Deserialize, Serialize};

use super::{Department, Employee};

/// One consistent read of both collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
    pub schema_version: i32,
    pub generated_at: String,
    pub revision_id: i64,
    pub employees: Vec<Employee>,
    pub departments: Vec<Department>,
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}
