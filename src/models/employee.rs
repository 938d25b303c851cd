//! Employee model matching the frontend Employee interface.

use serde::{Deserialize, Serialize};

use super::deserialize_nullable;

/// Reference from an employee to its department.
///
/// Older records carry the department inline, either as a plain id string or
/// as an object holding the id. Both shapes resolve to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepartmentRef {
    Id(String),
    Object {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl DepartmentRef {
    /// The referenced department id, whatever the stored shape.
    pub fn id(&self) -> &str {
        match self {
            DepartmentRef::Id(id) => id,
            DepartmentRef::Object { id, .. } => id,
        }
    }
}

/// A person in the organisation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, alias = "title")]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub force_manager: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Employee {
    /// "First Last", trimmed when one of the parts is missing.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Manager id, treating an empty string the same as no manager.
    pub fn manager_ref(&self) -> Option<&str> {
        self.manager_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Normalized department id: `departmentId` first, then the legacy
    /// inline `department` reference.
    pub fn department_key(&self) -> Option<&str> {
        self.department_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.department
                    .as_ref()
                    .map(DepartmentRef::id)
                    .filter(|id| !id.is_empty())
            })
    }

    pub fn image_url(&self) -> Option<&str> {
        self.photo_url.as_deref().or(self.photo.as_deref())
    }
}

/// Request body for creating a new employee.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, alias = "title")]
    pub position: String,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub force_manager: bool,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub department: Option<DepartmentRef>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Request body for updating an existing employee.
///
/// Nullable fields distinguish "absent" (keep) from `null` (clear).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, alias = "title")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub manager_id: Option<Option<String>>,
    #[serde(default)]
    pub force_manager: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub department_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub department: Option<Option<DepartmentRef>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub photo: Option<Option<String>>,
    #[serde(default, rename = "photoURL", deserialize_with = "deserialize_nullable")]
    pub photo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub phone: Option<Option<String>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}
