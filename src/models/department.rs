//! Department model matching the frontend Department interface.

use serde::{Deserialize, Serialize};

use super::deserialize_nullable;

/// An organisational unit. Departments form their own tree through
/// `parent_department_id`, independent of the reporting chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Explicit membership. Takes precedence over employees' own department
    /// references when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_ids: Option<Vec<String>>,
    #[serde(default)]
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Department {
    pub fn parent_ref(&self) -> Option<&str> {
        self.parent_department_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn manager_ref(&self) -> Option<&str> {
        self.manager_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Request body for creating a new department.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub parent_department_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub employee_ids: Option<Vec<String>>,
}

/// Request body for updating an existing department.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartmentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub manager_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub parent_department_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub employee_ids: Option<Option<Vec<String>>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}
