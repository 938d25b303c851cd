//! Integration tests for the org-chart backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::search::SearchIndex;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_api_key(Some("test-api-key".to_string())).await
    }

    async fn with_api_key(api_key: Option<String>) -> Self {
        Self::serve(api_key.clone(), api_key).await
    }

    /// Serve with `server_key` configured while the client sends `client_key`.
    async fn serve(server_key: Option<String>, client_key: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let index_path = temp_dir.path().join("index");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let search = Arc::new(SearchIndex::open(&index_path).expect("Failed to init search"));

        let config = Config {
            api_key: server_key,
            db_path,
            index_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let state = AppState {
            repo,
            search,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = client_key {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    /// Create an employee and return its id.
    async fn create_employee(&self, body: Value) -> String {
        let (status, body) = self.post("/api/employees", body).await;
        assert_eq!(status, 200, "create employee failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Create a department and return its id.
    async fn create_department(&self, body: Value) -> String {
        let (status, body) = self.post("/api/departments", body).await;
        assert_eq!(status, 200, "create department failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_key() {
    let fixture = TestFixture::serve(Some("secret-key".to_string()), None).await;

    let (status, body) = fixture.get("/api/datastore").await;

    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_key() {
    let fixture = TestFixture::serve(
        Some("correct-key".to_string()),
        Some("wrong-key".to_string()),
    )
    .await;

    let (status, _) = fixture.get("/api/employees").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_auth_bearer_token() {
    let fixture = TestFixture::serve(Some("secret-key".to_string()), None).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/datastore"))
        .bearer_auth("secret-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_auth_disabled_without_key() {
    let fixture = TestFixture::with_api_key(None).await;

    let (status, body) = fixture.get("/api/datastore").await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_auth_valid_key() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/datastore").await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_datastore_get() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/datastore").await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["data"]["schemaVersion"].is_number());
    assert!(body["data"]["revisionId"].is_number());
    assert_eq!(body["data"]["employees"], json!([]));
    assert_eq!(body["data"]["departments"], json!([]));
    assert!(body["revisionId"].is_number());
}

#[tokio::test]
async fn test_datastore_revision() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/datastore/revision").await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["data"]["revisionId"].is_number());
}

#[tokio::test]
async fn test_employee_crud() {
    let fixture = TestFixture::new().await;

    // Create
    let (status, create_body) = fixture
        .post(
            "/api/employees",
            json!({
                "firstName": "Alice",
                "lastName": "Martin",
                "position": "Comptable",
                "email": "alice@example.com",
                "photoURL": "https://example.com/alice.png"
            }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(create_body["success"], true);
    let employee_id = create_body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(create_body["data"]["firstName"], "Alice");
    assert_eq!(create_body["data"]["photoURL"], "https://example.com/alice.png");
    assert_eq!(create_body["data"]["version"], 1);
    let revision_after_create = create_body["revisionId"].as_i64().unwrap();

    // Get
    let (status, get_body) = fixture
        .get(&format!("/api/employees/{}", employee_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(get_body["data"]["lastName"], "Martin");

    // Update
    let (status, update_body) = fixture
        .put(
            &format!("/api/employees/{}", employee_id),
            json!({
                "position": "Responsable comptable",
                "email": null,
                "expectedVersion": 1
            }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(update_body["data"]["position"], "Responsable comptable");
    assert!(update_body["data"].get("email").is_none());
    assert_eq!(update_body["data"]["photoURL"], "https://example.com/alice.png");
    assert_eq!(update_body["data"]["version"], 2);
    let revision_after_update = update_body["revisionId"].as_i64().unwrap();
    assert!(revision_after_update > revision_after_create);

    // List
    let (status, list_body) = fixture.get("/api/employees").await;
    assert_eq!(status, 200);
    assert_eq!(list_body["data"].as_array().unwrap().len(), 1);

    // Delete
    let (status, delete_body) = fixture
        .delete(&format!("/api/employees/{}", employee_id))
        .await;
    assert_eq!(status, 200);
    let revision_after_delete = delete_body["revisionId"].as_i64().unwrap();
    assert!(revision_after_delete > revision_after_update);

    // Verify deleted
    let (status, body) = fixture
        .get(&format!("/api/employees/{}", employee_id))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_employee_accepts_title_alias_and_department_object() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/employees",
            json!({
                "firstName": "Bruno",
                "lastName": "Petit",
                "title": "Développeur",
                "department": { "id": "dep-it", "name": "IT" }
            }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["position"], "Développeur");
    assert_eq!(body["data"]["department"]["id"], "dep-it");
    assert_eq!(body["data"]["department"]["name"], "IT");
}

#[tokio::test]
async fn test_employee_validation_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/api/employees", json!({ "firstName": " ", "lastName": "" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let id = fixture
        .create_employee(json!({ "firstName": "Chloé", "lastName": "Durand" }))
        .await;
    let (status, body) = fixture
        .put(&format!("/api/employees/{}", id), json!({ "managerId": id }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture
        .put(
            &format!("/api/employees/{}", id),
            json!({ "firstName": "  ", "lastName": "" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, current) = fixture.get(&format!("/api/employees/{}", id)).await;
    assert_eq!(current["data"]["firstName"], "Chloé");
    assert_eq!(current["data"]["version"], 1);
}

#[tokio::test]
async fn test_employee_not_found() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .put("/api/employees/missing", json!({ "position": "PDG" }))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.delete("/api/employees/missing").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_optimistic_concurrency_conflict() {
    let fixture = TestFixture::new().await;

    let id = fixture
        .create_employee(json!({ "firstName": "Denis", "lastName": "Roux" }))
        .await;

    let (status, _) = fixture
        .put(
            &format!("/api/employees/{}", id),
            json!({ "position": "Analyste", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);

    // Stale version
    let (status, body) = fixture
        .put(
            &format!("/api/employees/{}", id),
            json!({ "position": "Chef de projet", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(body["error"]["details"]["currentVersion"], 2);

    let (_, current) = fixture.get(&format!("/api/employees/{}", id)).await;
    assert_eq!(current["data"]["position"], "Analyste");
}

#[tokio::test]
async fn test_department_crud() {
    let fixture = TestFixture::new().await;

    let (status, create_body) = fixture
        .post(
            "/api/departments",
            json!({ "name": "Finance", "color": "#2e7d32" }),
        )
        .await;
    assert_eq!(status, 200);
    let department_id = create_body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(create_body["data"]["name"], "Finance");
    assert_eq!(create_body["data"]["version"], 1);

    let (status, update_body) = fixture
        .put(
            &format!("/api/departments/{}", department_id),
            json!({ "name": "Finance & Contrôle", "expectedVersion": 1 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(update_body["data"]["name"], "Finance & Contrôle");
    assert_eq!(update_body["data"]["color"], "#2e7d32");
    assert_eq!(update_body["data"]["version"], 2);

    let (status, list_body) = fixture.get("/api/departments").await;
    assert_eq!(status, 200);
    assert_eq!(list_body["data"].as_array().unwrap().len(), 1);

    let (status, _) = fixture
        .delete(&format!("/api/departments/{}", department_id))
        .await;
    assert_eq!(status, 200);

    let (status, body) = fixture
        .get(&format!("/api/departments/{}", department_id))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_department_validation_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/api/departments", json!({ "name": "  " }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let id = fixture.create_department(json!({ "name": "RH" })).await;
    let (status, body) = fixture
        .put(
            &format!("/api/departments/{}", id),
            json!({ "parentDepartmentId": id }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_department_delete_reparents_children() {
    let fixture = TestFixture::new().await;

    let parent = fixture
        .create_department(json!({ "name": "Direction" }))
        .await;
    let middle = fixture
        .create_department(json!({ "name": "Opérations", "parentDepartmentId": parent }))
        .await;
    let child = fixture
        .create_department(json!({ "name": "Logistique", "parentDepartmentId": middle }))
        .await;

    let (status, _) = fixture
        .delete(&format!("/api/departments/{}", middle))
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get(&format!("/api/departments/{}", child)).await;
    assert_eq!(body["data"]["parentDepartmentId"], parent.as_str());
}

#[tokio::test]
async fn test_hierarchy_empty_store_has_no_root() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/hierarchy").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "noRootFound");

    let (status, body) = fixture.get("/api/hierarchy/stats").await;
    assert_eq!(status, 200);
    assert!(body["data"].is_null());

    let (status, body) = fixture.get("/api/hierarchy/root").await;
    assert_eq!(status, 200);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_hierarchy_bootstrap_is_idempotent() {
    let fixture = TestFixture::new().await;

    let (status, first) = fixture.post("/api/hierarchy/bootstrap", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["created"], true);
    assert_eq!(first["data"]["employee"]["position"], "PDG");
    assert_eq!(first["data"]["employee"]["forceManager"], true);
    let root_id = first["data"]["employee"]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture.get("/api/hierarchy").await;
    assert_eq!(body["data"]["status"], "ready");
    assert_eq!(body["data"]["tree"]["id"], root_id.as_str());
    assert_eq!(body["data"]["tree"]["name"], "Directeur Général");

    let (status, second) = fixture.post("/api/hierarchy/bootstrap", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(second["data"]["created"], false);
    assert_eq!(second["data"]["employee"]["id"], root_id.as_str());

    let (_, list) = fixture.get("/api/employees").await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_hierarchy_reporting_chain() {
    let fixture = TestFixture::new().await;

    let ceo = fixture
        .create_employee(json!({ "firstName": "Hélène", "lastName": "Blanc", "position": "PDG" }))
        .await;
    let manager = fixture
        .create_employee(json!({
            "firstName": "Marc",
            "lastName": "Noir",
            "position": "Manager",
            "managerId": ceo
        }))
        .await;
    let dev = fixture
        .create_employee(json!({
            "firstName": "Léa",
            "lastName": "Vert",
            "position": "Développeuse",
            "managerId": manager
        }))
        .await;

    let (status, body) = fixture.get("/api/hierarchy").await;
    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["status"], "ready");
    assert_eq!(data["tree"]["id"], ceo.as_str());
    assert_eq!(data["tree"]["kind"], "employee");
    assert_eq!(data["tree"]["children"][0]["id"], manager.as_str());
    assert_eq!(data["tree"]["children"][0]["manager"], "Hélène Blanc");
    assert_eq!(data["tree"]["children"][0]["children"][0]["id"], dev.as_str());
    assert!(data["tree"]["color"].as_str().unwrap().starts_with("hsl("));

    assert_eq!(data["stats"]["totalNodes"], 3);
    assert_eq!(data["stats"]["maxDepth"], 3);
    assert_eq!(data["stats"]["managerCount"], 2);
    assert_eq!(data["diagnostics"], json!([]));

    let (_, stats) = fixture.get("/api/hierarchy/stats").await;
    assert_eq!(stats["data"]["totalNodes"], 3);

    let (_, root) = fixture.get("/api/hierarchy/root").await;
    assert_eq!(root["data"]["id"], ceo.as_str());
}

#[tokio::test]
async fn test_hierarchy_deleting_manager_detaches_reports() {
    let fixture = TestFixture::new().await;

    let ceo = fixture
        .create_employee(json!({ "firstName": "Paul", "lastName": "Gris", "position": "CEO" }))
        .await;
    let report = fixture
        .create_employee(json!({ "firstName": "Inès", "lastName": "Rose", "managerId": ceo }))
        .await;

    let (status, _) = fixture.delete(&format!("/api/employees/{}", ceo)).await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get(&format!("/api/employees/{}", report)).await;
    assert!(body["data"].get("managerId").is_none());
    assert_eq!(body["data"]["version"], 2);

    let (_, hierarchy) = fixture.get("/api/hierarchy").await;
    assert_eq!(hierarchy["data"]["status"], "ready");
    assert_eq!(hierarchy["data"]["tree"]["id"], report.as_str());
}

#[tokio::test]
async fn test_hierarchy_departments_view() {
    let fixture = TestFixture::new().await;

    let (_, empty) = fixture.get("/api/hierarchy?view=departments").await;
    assert_eq!(empty["data"]["status"], "empty");

    let head = fixture
        .create_employee(json!({ "firstName": "Sophie", "lastName": "Leroy", "position": "DAF" }))
        .await;
    let finance = fixture
        .create_department(json!({ "name": "Finance", "color": "#1565c0", "managerId": head }))
        .await;
    let accounting = fixture
        .create_department(json!({ "name": "Comptabilité", "parentDepartmentId": finance }))
        .await;
    fixture
        .put(
            &format!("/api/employees/{}", head),
            json!({ "departmentId": finance }),
        )
        .await;
    let clerk = fixture
        .create_employee(json!({
            "firstName": "Hugo",
            "lastName": "Moreau",
            "departmentId": finance,
            "managerId": head
        }))
        .await;

    let (status, body) = fixture.get("/api/hierarchy?view=departments").await;
    assert_eq!(status, 200);
    let tree = &body["data"]["tree"];
    assert_eq!(body["data"]["status"], "ready");
    assert_eq!(tree["id"], finance.as_str());
    assert_eq!(tree["kind"], "department");
    assert_eq!(tree["title"], "Département");
    assert_eq!(tree["manager"], "Sophie Leroy");

    let children = tree["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["id"], accounting.as_str());
    assert_eq!(children[1]["id"], clerk.as_str());
    assert_eq!(children[1]["color"], "#1565c0");

    // A second top-level department brings in the organisation node
    fixture.create_department(json!({ "name": "IT" })).await;
    let (_, body) = fixture.get("/api/hierarchy?view=departments").await;
    assert_eq!(body["data"]["tree"]["id"], "organisation");
    assert_eq!(
        body["data"]["tree"]["children"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_directory_search() {
    let fixture = TestFixture::new().await;

    let finance = fixture
        .create_department(json!({ "name": "Finance" }))
        .await;
    let id = fixture
        .create_employee(json!({
            "firstName": "Camille",
            "lastName": "Fontaine",
            "position": "Trésorière",
            "departmentId": finance
        }))
        .await;
    fixture
        .create_employee(json!({ "firstName": "Julien", "lastName": "Bernard", "position": "Juriste" }))
        .await;

    let (status, body) = fixture.get("/api/search?q=fontaine").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["results"][0]["employee"]["id"], id.as_str());

    let (_, body) = fixture.get("/api/search?q=finance").await;
    assert_eq!(body["data"]["results"][0]["employee"]["id"], id.as_str());

    // Deleted employees leave the directory
    fixture.delete(&format!("/api/employees/{}", id)).await;
    let (_, body) = fixture.get("/api/search?q=fontaine").await;
    assert_eq!(body["data"]["total"], 0);
}
