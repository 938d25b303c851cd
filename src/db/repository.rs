//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity.

use chrono::Utc;
use sqlx::{Row, SqliteExecutor, SqlitePool};

use super::SCHEMA_VERSION;
use crate::errors::AppError;
use crate::models::{
    CreateDepartmentRequest, CreateEmployeeRequest, Datastore, Department, DepartmentRef,
    Employee, RevisionInfo, UpdateDepartmentRequest, UpdateEmployeeRequest,
};

const EMPLOYEE_COLUMNS: &str = "id, first_name, last_name, position, manager_id, force_manager, department_id, department, photo, photo_url, email, phone, updated_at, version";

const DEFAULT_ROOT_FIRST_NAME: &str = "Directeur";
const DEFAULT_ROOT_LAST_NAME: &str = "Général";
const DEFAULT_ROOT_POSITION: &str = "PDG";

const DEPARTMENT_COLUMNS: &str =
    "id, name, description, manager_id, parent_department_id, color, employee_ids, updated_at, version";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        bump_revision(&self.pool).await?;
        self.get_revision_id().await
    }

    /// Read both collections and the revision in one transaction.
    pub async fn get_datastore(&self) -> Result<Datastore, AppError> {
        let mut tx = self.pool.begin().await?;

        let meta =
            sqlx::query("SELECT schema_version, revision_id, generated_at FROM meta WHERE id = 1")
                .fetch_one(&mut *tx)
                .await?;
        let employees = fetch_employees(&mut *tx).await?;
        let departments = fetch_departments(&mut *tx).await?;

        tx.commit().await?;

        Ok(Datastore {
            schema_version: meta.try_get("schema_version").unwrap_or(SCHEMA_VERSION),
            revision_id: meta.get("revision_id"),
            generated_at: meta.get("generated_at"),
            employees,
            departments,
        })
    }

    // ==================== EMPLOYEE OPERATIONS ====================

    /// List all employees in insertion order.
    pub async fn list_employees(&self) -> Result<Vec<Employee>, AppError> {
        fetch_employees(&self.pool).await
    }

    /// Get an employee by ID.
    pub async fn get_employee(&self, id: &str) -> Result<Option<Employee>, AppError> {
        let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(employee_from_row))
    }

    /// First employee flagged `forceManager`, if any.
    pub async fn find_forced_root(&self) -> Result<Option<Employee>, AppError> {
        let sql = format!(
            "SELECT {} FROM employees WHERE force_manager = 1 ORDER BY rowid LIMIT 1",
            EMPLOYEE_COLUMNS
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(employee_from_row))
    }

    /// Create a new employee.
    pub async fn create_employee(
        &self,
        request: &CreateEmployeeRequest,
    ) -> Result<Employee, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let department_json = request
            .department
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let sql = format!(
            "INSERT INTO employees ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
            EMPLOYEE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&request.first_name)
            .bind(&request.last_name)
            .bind(&request.position)
            .bind(&request.manager_id)
            .bind(request.force_manager as i32)
            .bind(&request.department_id)
            .bind(&department_json)
            .bind(&request.photo)
            .bind(&request.photo_url)
            .bind(&request.email)
            .bind(&request.phone)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Employee {
            id,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            position: request.position.clone(),
            manager_id: request.manager_id.clone(),
            force_manager: request.force_manager,
            department_id: request.department_id.clone(),
            department: request.department.clone(),
            photo: request.photo.clone(),
            photo_url: request.photo_url.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update an employee with optimistic concurrency control.
    pub async fn update_employee(
        &self,
        id: &str,
        request: &UpdateEmployeeRequest,
    ) -> Result<Employee, AppError> {
        let existing = self
            .get_employee(id)
            .await?
            .ok_or_else(|| AppError::employee_not_found(id))?;

        check_version(request.expected_version, existing.version)?;

        let updated = Employee {
            id: id.to_string(),
            first_name: request
                .first_name
                .clone()
                .unwrap_or_else(|| existing.first_name.clone()),
            last_name: request
                .last_name
                .clone()
                .unwrap_or_else(|| existing.last_name.clone()),
            position: request
                .position
                .clone()
                .unwrap_or_else(|| existing.position.clone()),
            manager_id: patch(&request.manager_id, &existing.manager_id),
            force_manager: request.force_manager.unwrap_or(existing.force_manager),
            department_id: patch(&request.department_id, &existing.department_id),
            department: patch(&request.department, &existing.department),
            photo: patch(&request.photo, &existing.photo),
            photo_url: patch(&request.photo_url, &existing.photo_url),
            email: patch(&request.email, &existing.email),
            phone: patch(&request.phone, &existing.phone),
            updated_at: Utc::now().to_rfc3339(),
            version: existing.version + 1,
        };
        if updated.first_name.trim().is_empty() && updated.last_name.trim().is_empty() {
            return Err(AppError::Validation(
                "First name or last name is required".to_string(),
            ));
        }
        let department_json = updated
            .department
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Conditional UPDATE with version check to prevent lost updates
        let result = sqlx::query(
            "UPDATE employees SET first_name = ?, last_name = ?, position = ?, manager_id = ?, force_manager = ?, department_id = ?, department = ?, photo = ?, photo_url = ?, email = ?, phone = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&updated.first_name)
        .bind(&updated.last_name)
        .bind(&updated.position)
        .bind(&updated.manager_id)
        .bind(updated.force_manager as i32)
        .bind(&updated.department_id)
        .bind(&department_json)
        .bind(&updated.photo)
        .bind(&updated.photo_url)
        .bind(&updated.email)
        .bind(&updated.phone)
        .bind(&updated.updated_at)
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_employee(id).await?;
            return Err(concurrent_modification(current.map(|e| e.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    /// Delete an employee and detach every reference to it.
    ///
    /// Direct reports lose their manager, departments it heads lose their
    /// manager, and it leaves every explicit membership list.
    pub async fn delete_employee(&self, id: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::employee_not_found(id));
        }

        let reports = sqlx::query(
            "UPDATE employees SET manager_id = NULL, updated_at = ?, version = version + 1 WHERE manager_id = ?",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE departments SET manager_id = NULL, updated_at = ?, version = version + 1 WHERE manager_id = ?",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let memberships =
            sqlx::query("SELECT id, employee_ids FROM departments WHERE employee_ids IS NOT NULL")
                .fetch_all(&mut *tx)
                .await?;

        for row in memberships {
            let employee_ids = parse_json_array(&row.get::<String, _>("employee_ids"));
            if !employee_ids.iter().any(|e| e == id) {
                continue;
            }
            let remaining: Vec<&String> = employee_ids.iter().filter(|e| *e != id).collect();
            sqlx::query(
                "UPDATE departments SET employee_ids = ?, updated_at = ?, version = version + 1 WHERE id = ?",
            )
            .bind(serde_json::to_string(&remaining)?)
            .bind(&now)
            .bind(row.get::<String, _>("id"))
            .execute(&mut *tx)
            .await?;
        }

        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!(
            employee_id = id,
            detached_reports = reports.rows_affected(),
            "Employee deleted"
        );
        Ok(())
    }

    /// Return the `forceManager` employee, creating a default one if needed.
    ///
    /// The boolean is `true` when a record was created. The existence check
    /// and the insert are one statement, so it runs under SQLite's write lock
    /// and concurrent calls create at most one root.
    pub async fn create_default_root(&self) -> Result<(Employee, bool), AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO employees ({}) SELECT ?, ?, ?, ?, NULL, 1, NULL, NULL, NULL, NULL, NULL, NULL, ?, 1 WHERE NOT EXISTS (SELECT 1 FROM employees WHERE force_manager = 1)",
            EMPLOYEE_COLUMNS
        );
        let created = sqlx::query(&sql)
            .bind(&id)
            .bind(DEFAULT_ROOT_FIRST_NAME)
            .bind(DEFAULT_ROOT_LAST_NAME)
            .bind(DEFAULT_ROOT_POSITION)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            == 1;

        if created {
            bump_revision(&mut *tx).await?;
        }
        tx.commit().await?;

        let root = self
            .find_forced_root()
            .await?
            .ok_or_else(|| AppError::Internal("Forced root vanished after bootstrap".to_string()))?;

        if created {
            tracing::info!(employee_id = %root.id, "Default root employee created");
        }
        Ok((root, created))
    }

    // ==================== DEPARTMENT OPERATIONS ====================

    /// List all departments in insertion order.
    pub async fn list_departments(&self) -> Result<Vec<Department>, AppError> {
        fetch_departments(&self.pool).await
    }

    /// Get a department by ID.
    pub async fn get_department(&self, id: &str) -> Result<Option<Department>, AppError> {
        let sql = format!("SELECT {} FROM departments WHERE id = ?", DEPARTMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(department_from_row))
    }

    /// Create a new department.
    pub async fn create_department(
        &self,
        request: &CreateDepartmentRequest,
    ) -> Result<Department, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let employee_ids_json = request
            .employee_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let sql = format!(
            "INSERT INTO departments ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)",
            DEPARTMENT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&request.name)
            .bind(&request.description)
            .bind(&request.manager_id)
            .bind(&request.parent_department_id)
            .bind(&request.color)
            .bind(&employee_ids_json)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Department {
            id,
            name: request.name.clone(),
            description: request.description.clone(),
            manager_id: request.manager_id.clone(),
            parent_department_id: request.parent_department_id.clone(),
            color: request.color.clone(),
            employee_ids: request.employee_ids.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update a department with optimistic concurrency control.
    pub async fn update_department(
        &self,
        id: &str,
        request: &UpdateDepartmentRequest,
    ) -> Result<Department, AppError> {
        let existing = self
            .get_department(id)
            .await?
            .ok_or_else(|| AppError::department_not_found(id))?;

        check_version(request.expected_version, existing.version)?;

        let updated = Department {
            id: id.to_string(),
            name: request.name.clone().unwrap_or_else(|| existing.name.clone()),
            description: patch(&request.description, &existing.description),
            manager_id: patch(&request.manager_id, &existing.manager_id),
            parent_department_id: patch(
                &request.parent_department_id,
                &existing.parent_department_id,
            ),
            color: patch(&request.color, &existing.color),
            employee_ids: patch(&request.employee_ids, &existing.employee_ids),
            updated_at: Utc::now().to_rfc3339(),
            version: existing.version + 1,
        };
        let employee_ids_json = updated
            .employee_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE departments SET name = ?, description = ?, manager_id = ?, parent_department_id = ?, color = ?, employee_ids = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(&updated.manager_id)
        .bind(&updated.parent_department_id)
        .bind(&updated.color)
        .bind(&employee_ids_json)
        .bind(&updated.updated_at)
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_department(id).await?;
            return Err(concurrent_modification(current.map(|d| d.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    /// Delete a department.
    ///
    /// Sub-departments move up to the deleted department's parent and members
    /// lose their department reference, legacy inline form included.
    pub async fn delete_department(&self, id: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let parent: Option<Option<String>> =
            sqlx::query("SELECT parent_department_id FROM departments WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| row.get("parent_department_id"));

        let Some(parent) = parent else {
            return Err(AppError::department_not_found(id));
        };

        sqlx::query(
            "UPDATE departments SET parent_department_id = ?, updated_at = ?, version = version + 1 WHERE parent_department_id = ?",
        )
        .bind(&parent)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE employees SET department_id = NULL, updated_at = ?, version = version + 1 WHERE department_id = ?",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let legacy = sqlx::query("SELECT id, department FROM employees WHERE department IS NOT NULL")
            .fetch_all(&mut *tx)
            .await?;

        for row in legacy {
            let reference = parse_department_ref(&row.get::<String, _>("department"));
            if reference.as_ref().map(DepartmentRef::id) != Some(id) {
                continue;
            }
            sqlx::query(
                "UPDATE employees SET department = NULL, updated_at = ?, version = version + 1 WHERE id = ?",
            )
            .bind(&now)
            .bind(row.get::<String, _>("id"))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM departments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        Ok(())
    }
}

// Collection reads shared by the pool and snapshot transactions

async fn fetch_employees<'e, E>(executor: E) -> Result<Vec<Employee>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM employees ORDER BY rowid", EMPLOYEE_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(executor).await?;
    Ok(rows.iter().map(employee_from_row).collect())
}

async fn fetch_departments<'e, E>(executor: E) -> Result<Vec<Department>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM departments ORDER BY rowid", DEPARTMENT_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(executor).await?;
    Ok(rows.iter().map(department_from_row).collect())
}

async fn bump_revision<'e, E>(executor: E) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(executor)
        .await?;
    Ok(())
}

fn check_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::Conflict {
            message: format!(
                "Version mismatch: expected {}, current {}",
                expected, current
            ),
            current_version: current,
        }),
        _ => Ok(()),
    }
}

fn concurrent_modification(current_version: Option<i64>) -> AppError {
    AppError::Conflict {
        message: "Concurrent modification detected".to_string(),
        current_version: current_version.unwrap_or(0),
    }
}

/// Apply a nullable patch field: absent keeps, `null` clears, a value replaces.
fn patch<T: Clone>(field: &Option<Option<T>>, current: &Option<T>) -> Option<T> {
    match field {
        Some(value) => value.clone(),
        None => current.clone(),
    }
}

// Helper functions for row conversion

fn employee_from_row(row: &sqlx::sqlite::SqliteRow) -> Employee {
    let force_manager: i32 = row.get("force_manager");
    let department_str: Option<String> = row.get("department");
    Employee {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        position: row.get("position"),
        manager_id: row.get("manager_id"),
        force_manager: force_manager != 0,
        department_id: row.get("department_id"),
        department: department_str.and_then(|s| parse_department_ref(&s)),
        photo: row.get("photo"),
        photo_url: row.get("photo_url"),
        email: row.get("email"),
        phone: row.get("phone"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn department_from_row(row: &sqlx::sqlite::SqliteRow) -> Department {
    let employee_ids_str: Option<String> = row.get("employee_ids");
    Department {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        manager_id: row.get("manager_id"),
        parent_department_id: row.get("parent_department_id"),
        color: row.get("color"),
        employee_ids: employee_ids_str.map(|s| parse_json_array(&s)),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn parse_department_ref(s: &str) -> Option<DepartmentRef> {
    serde_json::from_str(s).ok()
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
