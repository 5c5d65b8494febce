//! Common test utilities for API testing with mocks.
//!
//! Builds the server router in-process with mock back-office services
//! injected, so the whole API surface can be exercised without external
//! infrastructure.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use pledgedesk_core::service::{CalculationService, CommitService, RemoteServiceConfig};
use pledgedesk_core::testing::{MockCalculationService, MockCommitService};
use pledgedesk_core::{
    create_audit_system, AuditStore, AuthPolicy, Config, HistoryStore, PushEvent,
    SqliteAuditStore, SqliteHistoryStore, UpdateListener, WorkflowEngine,
};

/// Re-export fixtures for test convenience
pub use pledgedesk_core::testing::fixtures;

/// In-process server with mock back-office services behind the engine.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock calculation service - configure validation/calculation results
    pub calc: Arc<MockCalculationService>,
    /// Mock commit service - control commit outcomes
    pub commit: Arc<MockCommitService>,
    /// Durable history store backing the engine
    pub history: Arc<dyn HistoryStore>,
    /// Sender side of the push channel (what the WebSocket handler feeds)
    pub push_tx: mpsc::Sender<PushEvent>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with the default authorization policy.
    pub async fn new() -> Self {
        Self::with_policy(AuthPolicy::default()).await
    }

    /// Create a fixture with a custom authorization policy.
    pub async fn with_policy(policy: AuthPolicy) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            backoffice: RemoteServiceConfig {
                base_url: "http://backoffice.test:9200".to_string(),
                api_key: Some("test-key".to_string()),
                timeout_secs: 5,
            },
            server: Default::default(),
            database: pledgedesk_core::config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth_policy: policy.clone(),
            session: Default::default(),
        };

        let audit_store: Arc<dyn AuditStore> =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let history_store: Arc<dyn HistoryStore> =
            Arc::new(SqliteHistoryStore::new(&db_path).expect("Failed to create history store"));

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let calc = Arc::new(MockCalculationService::new());
        let commit = Arc::new(MockCommitService::new());

        let engine = Arc::new(
            WorkflowEngine::new(
                policy,
                config.session.clone(),
                calc.clone() as Arc<dyn CalculationService>,
                commit.clone() as Arc<dyn CommitService>,
                Arc::clone(&history_store),
            )
            .with_audit(audit_handle),
        );

        let (push_tx, push_rx) = mpsc::channel::<PushEvent>(16);
        let listener = UpdateListener::new(Arc::clone(&engine));
        listener.start(push_rx);

        let state = Arc::new(pledgedesk_server::state::AppState::new(
            config,
            engine,
            audit_store,
            Arc::clone(&history_store),
            push_tx.clone(),
        ));

        let router = pledgedesk_server::api::create_router(state);

        Self {
            router,
            calc,
            commit,
            history: history_store,
            push_tx,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with no body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a DELETE request with JSON body.
    pub async fn delete_with_body(&self, path: &str, body: Value) -> TestResponse {
        self.request("DELETE", path, Some(body)).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);

        let request = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                builder
                    .body(Body::from(serde_json::to_vec(&json).unwrap()))
                    .unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        let body = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
