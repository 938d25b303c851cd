//! Tantivy-based employee directory index.
//!
//! Full-text search over employee names, positions and department names with
//! field boosting.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{Department, Employee};

const BOOST_NAME: f32 = 10.0;
const BOOST_POSITION: f32 = 6.0;
const BOOST_DEPARTMENT: f32 = 3.0;

/// Search result with employee id and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub employee_id: String,
    pub score: f32,
}

struct SearchFields {
    employee_id: Field,
    name: Field,
    position: Field,
    department: Field,
}

/// Tantivy index over the employee collection.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // STRING keeps the id untokenized so it can be used as a delete term.
        let employee_id = schema_builder.add_text_field("employee_id", STRING | STORED);
        let name = schema_builder.add_text_field("name", TEXT);
        let position = schema_builder.add_text_field("position", TEXT);
        let department = schema_builder.add_text_field("department", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            employee_id,
            name,
            position,
            department,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from both collections.
    pub async fn rebuild(
        &self,
        employees: &[Employee],
        departments: &[Department],
    ) -> Result<(), AppError> {
        let department_names = department_names(departments);
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for employee in employees {
            writer.add_document(self.create_document(employee, &department_names))?;
        }
        writer.commit()?;
        self.reader.reload()?;

        tracing::info!("Directory index rebuilt with {} employees", employees.len());
        Ok(())
    }

    /// Index or re-index a single employee.
    pub async fn index_employee(
        &self,
        employee: &Employee,
        departments: &[Department],
    ) -> Result<(), AppError> {
        let department_names = department_names(departments);
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.employee_id, &employee.id);
        writer.delete_term(term);
        writer.add_document(self.create_document(employee, &department_names))?;
        writer.commit()?;
        self.reader.reload()?;

        Ok(())
    }

    /// Remove an employee from the index.
    pub async fn remove_employee(&self, employee_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.employee_id, employee_id);
        writer.delete_term(term);
        writer.commit()?;
        self.reader.reload()?;

        Ok(())
    }

    /// Search for employees matching the query.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let field_queries = [
            (self.fields.name, BOOST_NAME),
            (self.fields.position, BOOST_POSITION),
            (self.fields.department, BOOST_DEPARTMENT),
        ];

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();
        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
            }
        }

        if subqueries.is_empty() {
            return Err(AppError::Search(format!(
                "Invalid search query: {}",
                query_str
            )));
        }
        let query = BooleanQuery::new(subqueries);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let employee_id = doc
                    .get_first(self.fields.employee_id)?
                    .as_str()?
                    .to_string();
                Some(SearchResult { employee_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(
        &self,
        employee: &Employee,
        department_names: &HashMap<&str, &str>,
    ) -> TantivyDocument {
        // Legacy inline objects may carry the name even when the department is gone.
        let department = employee
            .department_key()
            .and_then(|id| department_names.get(id).copied())
            .or_else(|| match &employee.department {
                Some(crate::models::DepartmentRef::Object { name, .. }) => name.as_deref(),
                _ => None,
            })
            .unwrap_or_default();

        doc!(
            self.fields.employee_id => employee.id.clone(),
            self.fields.name => employee.display_name(),
            self.fields.position => employee.position.clone(),
            self.fields.department => department.to_string()
        )
    }
}

fn department_names(departments: &[Department]) -> HashMap<&str, &str> {
    departments
        .iter()
        .map(|d| (d.id.as_str(), d.name.as_str()))
        .collect()
}
