//! Organisational hierarchy construction.
//!
//! Turns the flat employee and department collections of one snapshot into a
//! rooted tree for the org-chart and tree-view screens, and derives the summary
//! counts displayed next to it. Everything here is pure: no store access, no
//! shared state. A refresh simply builds a new tree.

use std::collections::{HashMap, HashSet};

use crate::models::{
    CycleDiagnostic, Datastore, Department, Employee, HierarchyNode, HierarchyState,
    HierarchyStats, HierarchyView, NodeKind,
};

/// Position keywords that mark a manager-less employee as the head of the company.
const EXECUTIVE_KEYWORDS: &[&str] = &[
    "pdg",
    "ceo",
    "directeur général",
    "directeur general",
    "président",
    "president",
    "direction",
    "gérant",
];

/// Title given to department nodes.
pub const DEPARTMENT_TITLE: &str = "Département";

/// Id of the synthetic node gathering several top-level departments.
pub const ORGANISATION_NODE_ID: &str = "organisation";
const ORGANISATION_TITLE: &str = "Organisation";

/// Pick the employee anchoring the org-chart.
///
/// An explicit `forceManager` wins. Otherwise, among employees without a
/// manager, one whose position looks executive is preferred, then the first
/// one in input order. `None` means there is nothing to anchor a tree on.
pub fn find_root(employees: &[Employee]) -> Option<&Employee> {
    if let Some(forced) = employees.iter().find(|e| e.force_manager) {
        return Some(forced);
    }

    let mut top_level = employees.iter().filter(|e| e.manager_ref().is_none());
    let first = top_level.clone().next();

    top_level
        .find(|e| is_executive_title(&e.position))
        .or(first)
}

fn is_executive_title(position: &str) -> bool {
    let position = position.to_lowercase();
    EXECUTIVE_KEYWORDS
        .iter()
        .any(|keyword| position.contains(keyword))
}

/// Deterministic colour for nodes without a department colour.
///
/// 32-bit string hash over UTF-16 code units mapped to a hue, so the same
/// name always gets the same colour, across requests and across clients.
pub fn fallback_color(name: &str) -> String {
    let hash = name.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    format!("hsl({}, 70%, 50%)", hash.unsigned_abs() % 360)
}

/// Count nodes, depth and managers of a built tree.
///
/// `manager_count` and `departments_represented` never drop below the hints
/// computed from the raw collections: the tree and the raw counts may come
/// from different refreshes, and the display must not under-report.
pub fn compute_stats(
    tree: &HierarchyNode,
    department_hint: usize,
    manager_hint: usize,
) -> HierarchyStats {
    let mut stats = HierarchyStats::default();
    let mut departments = HashSet::new();
    walk_stats(tree, 1, &mut stats, &mut departments);

    stats.manager_count = stats.manager_count.max(manager_hint);
    stats.departments_represented = departments.len().max(department_hint);
    stats
}

fn walk_stats<'t>(
    node: &'t HierarchyNode,
    depth: usize,
    stats: &mut HierarchyStats,
    departments: &mut HashSet<&'t str>,
) {
    stats.total_nodes += 1;
    stats.max_depth = stats.max_depth.max(depth);
    if !node.children.is_empty() {
        stats.manager_count += 1;
    }
    if let Some(department) = node.department.as_deref() {
        departments.insert(department);
    }
    for child in &node.children {
        walk_stats(child, depth + 1, stats, departments);
    }
}

/// Number of distinct existing employees that somebody else reports to.
pub fn manager_hint(employees: &[Employee]) -> usize {
    let ids: HashSet<&str> = employees.iter().map(|e| e.id.as_str()).collect();
    employees
        .iter()
        .filter_map(|e| e.manager_ref().filter(|m| *m != e.id && ids.contains(m)))
        .collect::<HashSet<_>>()
        .len()
}

/// Recompute the hierarchy for one snapshot.
pub fn build_hierarchy(snapshot: &Datastore, view: HierarchyView) -> HierarchyState {
    let mut builder = HierarchyBuilder::new(&snapshot.employees, &snapshot.departments);

    let tree = match view {
        HierarchyView::Employees => match builder.find_root() {
            Some(root) => builder.build_tree(root),
            None => return HierarchyState::NoRootFound,
        },
        HierarchyView::Departments => {
            if snapshot.departments.is_empty() {
                return HierarchyState::Empty;
            }
            match builder.build_department_view() {
                Some(tree) => tree,
                None => return HierarchyState::NoRootFound,
            }
        }
    };

    let stats = compute_stats(
        &tree,
        snapshot.departments.len(),
        manager_hint(&snapshot.employees),
    );
    let diagnostics = builder.into_diagnostics();

    tracing::debug!(
        ?view,
        revision_id = snapshot.revision_id,
        total_nodes = stats.total_nodes,
        max_depth = stats.max_depth,
        cycles = diagnostics.len(),
        "Hierarchy rebuilt"
    );

    HierarchyState::Ready {
        tree,
        stats,
        diagnostics,
    }
}

/// Builds employee and department trees over one pair of collections.
///
/// Descent keeps the ids of the current path; a record that shows up again
/// below itself is not expanded a second time and a [`CycleDiagnostic`] is
/// recorded instead.
pub struct HierarchyBuilder<'a> {
    employees: &'a [Employee],
    departments: &'a [Department],
    employees_by_id: HashMap<&'a str, &'a Employee>,
    departments_by_id: HashMap<&'a str, &'a Department>,
    /// Direct reports per manager id, in input order.
    reports: HashMap<&'a str, Vec<&'a Employee>>,
    /// Sub-departments per parent id, in input order.
    sub_departments: HashMap<&'a str, Vec<&'a Department>>,
    visited_departments: HashSet<&'a str>,
    diagnostics: Vec<CycleDiagnostic>,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(employees: &'a [Employee], departments: &'a [Department]) -> Self {
        // First occurrence wins on duplicate ids.
        let mut employees_by_id = HashMap::new();
        for employee in employees {
            employees_by_id.entry(employee.id.as_str()).or_insert(employee);
        }
        let mut departments_by_id = HashMap::new();
        for department in departments {
            departments_by_id
                .entry(department.id.as_str())
                .or_insert(department);
        }

        // Self references never make a record its own child.
        let mut reports: HashMap<&'a str, Vec<&'a Employee>> = HashMap::new();
        for employee in employees {
            if let Some(manager) = employee.manager_ref().filter(|m| *m != employee.id) {
                reports.entry(manager).or_default().push(employee);
            }
        }
        let mut sub_departments: HashMap<&'a str, Vec<&'a Department>> = HashMap::new();
        for department in departments {
            if let Some(parent) = department.parent_ref().filter(|p| *p != department.id) {
                sub_departments.entry(parent).or_default().push(department);
            }
        }

        Self {
            employees,
            departments,
            employees_by_id,
            departments_by_id,
            reports,
            sub_departments,
            visited_departments: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn find_root(&self) -> Option<&'a Employee> {
        find_root(self.employees)
    }

    /// Reporting-chain tree below `root`.
    pub fn build_tree(&mut self, root: &'a Employee) -> HierarchyNode {
        let mut path = HashSet::new();
        self.expand_employee(root, None, &mut path)
    }

    /// Department tree below `root`, with member employees as leaves.
    pub fn build_department_tree(&mut self, root: &'a Department) -> HierarchyNode {
        let mut path = HashSet::new();
        self.expand_department(root, &mut path)
    }

    /// Tree for the departments view.
    ///
    /// Top-level departments are those without a parent or whose parent does
    /// not exist. A single one becomes the root; several are gathered under a
    /// synthetic organisation node. Parent cycles that no top-level department
    /// reaches are cut open at one of their members and gathered there too.
    pub fn build_department_view(&mut self) -> Option<HierarchyNode> {
        let departments = self.departments;
        let roots: Vec<&'a Department> = departments
            .iter()
            .filter(|d| match d.parent_ref() {
                None => true,
                Some(parent) => parent == d.id || !self.departments_by_id.contains_key(parent),
            })
            .collect();

        if roots.is_empty() {
            return None;
        }

        let mut trees: Vec<HierarchyNode> = roots
            .into_iter()
            .map(|root| self.build_department_tree(root))
            .collect();

        while let Some(entry) = self.next_detached_cycle() {
            tracing::warn!(
                department_id = %entry.id,
                "Department cycle unreachable from the top level, attached to the organisation"
            );
            trees.push(self.build_department_tree(entry));
        }

        if trees.len() == 1 {
            return trees.pop();
        }

        Some(HierarchyNode {
            id: ORGANISATION_NODE_ID.to_string(),
            name: ORGANISATION_TITLE.to_string(),
            title: ORGANISATION_TITLE.to_string(),
            manager: None,
            color: fallback_color(ORGANISATION_TITLE),
            image_url: None,
            department: None,
            kind: NodeKind::Department,
            children: trees,
        })
    }

    pub fn diagnostics(&self) -> &[CycleDiagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<CycleDiagnostic> {
        self.diagnostics
    }

    fn expand_employee(
        &mut self,
        employee: &'a Employee,
        manager: Option<&'a Employee>,
        path: &mut HashSet<&'a str>,
    ) -> HierarchyNode {
        path.insert(employee.id.as_str());

        let reports = self
            .reports
            .get(employee.id.as_str())
            .cloned()
            .unwrap_or_default();
        let mut children = Vec::new();
        for report in reports {
            if path.contains(report.id.as_str()) {
                self.record_cycle(&report.id, &employee.id);
                continue;
            }
            children.push(self.expand_employee(report, Some(employee), path));
        }

        path.remove(employee.id.as_str());

        let color = self
            .department_of(employee)
            .and_then(|d| d.color.clone())
            .unwrap_or_else(|| fallback_color(&employee.display_name()));

        HierarchyNode {
            id: employee.id.clone(),
            name: employee.display_name(),
            title: employee.position.clone(),
            manager: manager.map(Employee::display_name),
            color,
            image_url: employee.image_url().map(str::to_string),
            department: employee.department_key().map(str::to_string),
            kind: NodeKind::Employee,
            children,
        }
    }

    fn expand_department(
        &mut self,
        department: &'a Department,
        path: &mut HashSet<&'a str>,
    ) -> HierarchyNode {
        path.insert(department.id.as_str());
        self.visited_departments.insert(department.id.as_str());

        let color = department
            .color
            .clone()
            .unwrap_or_else(|| fallback_color(&department.name));

        let subs = self
            .sub_departments
            .get(department.id.as_str())
            .cloned()
            .unwrap_or_default();
        let mut children = Vec::new();
        for sub in subs {
            if path.contains(sub.id.as_str()) {
                self.record_cycle(&sub.id, &department.id);
                continue;
            }
            children.push(self.expand_department(sub, path));
        }

        path.remove(department.id.as_str());

        let manager_id = department.manager_ref();
        let manager_name = manager_id
            .and_then(|id| self.employees_by_id.get(id))
            .map(|e| e.display_name());

        for member in self.members_of(department) {
            if Some(member.id.as_str()) == manager_id {
                continue;
            }
            children.push(HierarchyNode {
                id: member.id.clone(),
                name: member.display_name(),
                title: member.position.clone(),
                manager: member
                    .manager_ref()
                    .and_then(|id| self.employees_by_id.get(id))
                    .map(|e| e.display_name()),
                color: color.clone(),
                image_url: member.image_url().map(str::to_string),
                department: Some(department.id.clone()),
                kind: NodeKind::Employee,
                children: Vec::new(),
            });
        }

        HierarchyNode {
            id: department.id.clone(),
            name: department.name.clone(),
            title: DEPARTMENT_TITLE.to_string(),
            manager: manager_name,
            color,
            image_url: None,
            department: Some(department.id.clone()),
            kind: NodeKind::Department,
            children,
        }
    }

    /// Members of a department: the explicit list when there is one,
    /// otherwise every employee referencing the department.
    fn members_of(&self, department: &Department) -> Vec<&'a Employee> {
        match &department.employee_ids {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .filter_map(|id| self.employees_by_id.get(id.as_str()).copied())
                    .collect()
            }
            None => self
                .employees
                .iter()
                .filter(|e| e.department_key() == Some(department.id.as_str()))
                .collect(),
        }
    }

    /// A department on a parent cycle that no expansion has reached yet.
    ///
    /// Walks up from the first unvisited department until a parent repeats;
    /// the repeated one lies on the cycle, so expanding it reaches the whole
    /// cycle and everything hanging below it.
    fn next_detached_cycle(&self) -> Option<&'a Department> {
        let departments = self.departments;
        let start = departments
            .iter()
            .find(|d| !self.visited_departments.contains(d.id.as_str()))?;

        let mut seen = HashSet::new();
        let mut current = start;
        while seen.insert(current.id.as_str()) {
            match current
                .parent_ref()
                .and_then(|parent| self.departments_by_id.get(parent))
            {
                Some(parent) => current = *parent,
                None => break,
            }
        }
        Some(current)
    }

    fn department_of(&self, employee: &Employee) -> Option<&'a Department> {
        employee
            .department_key()
            .and_then(|id| self.departments_by_id.get(id).copied())
    }

    fn record_cycle(&mut self, node_id: &str, parent_id: &str) {
        tracing::warn!(node_id, parent_id, "Cyclic hierarchy reference, branch truncated");
        self.diagnostics.push(CycleDiagnostic {
            node_id: node_id.to_string(),
            parent_id: parent_id.to_string(),
        });
    }
}
