//! Derived hierarchy types served to the org-chart and tree-view screens.

use serde::{Deserialize, Serialize};

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Employee,
    Department,
}

/// A node of the rendered hierarchy. Rebuilt from scratch on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Department the node is attributed to (its own id for department nodes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub kind: NodeKind,
    pub children: Vec<HierarchyNode>,
}

/// Summary counts shown above the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyStats {
    pub total_nodes: usize,
    pub max_depth: usize,
    pub manager_count: usize,
    pub departments_represented: usize,
}

/// A reporting (or parent-department) cycle that was cut while building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleDiagnostic {
    /// Record whose expansion was stopped.
    pub node_id: String,
    /// Record under which it reappeared.
    pub parent_id: String,
}

/// Which relationship drives the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HierarchyView {
    #[default]
    Employees,
    Departments,
}

/// Outcome of one recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum HierarchyState {
    /// Nothing to show yet for this view.
    Empty,
    /// Employees exist but none qualifies as root.
    NoRootFound,
    Ready {
        tree: HierarchyNode,
        stats: HierarchyStats,
        diagnostics: Vec<CycleDiagnostic>,
    },
}
