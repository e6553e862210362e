//! Database context construction and bootstrap tests.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{DATABASE, Patient, names, repo_with_client};
use helios_docstore::backends::memory::MemoryClient;
use helios_docstore::error::{BackendError, ConfigurationError, StorageError, StorageResult};
use helios_docstore::{
    BackendCapability, BackendKind, DbContext, DocumentClient, DocumentCollection,
    DocumentDatabase, DocumentStoreConfig, Session,
};

// ============================================================================
// Test doubles
// ============================================================================

/// Counts how often the context asks for a database.
#[derive(Debug, Default)]
struct CountingClient {
    inner: MemoryClient,
    database_calls: AtomicUsize,
    listings: Arc<AtomicUsize>,
    fail_on: Option<String>,
}

impl CountingClient {
    fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn database_calls(&self) -> usize {
        self.database_calls.load(Ordering::SeqCst)
    }

    fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentClient for CountingClient {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn capabilities(&self) -> Vec<BackendCapability> {
        self.inner.capabilities()
    }

    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase> {
        self.database_calls.fetch_add(1, Ordering::SeqCst);
        Arc::new(FlakyDatabase {
            inner: self.inner.database(name),
            fail_on: self.fail_on.clone(),
            failed: AtomicBool::new(false),
            listings: Arc::clone(&self.listings),
        })
    }

    async fn start_session(&self) -> StorageResult<Session> {
        self.inner.start_session().await
    }
}

/// Fails the first creation of one collection.
#[derive(Debug)]
struct FlakyDatabase {
    inner: Arc<dyn DocumentDatabase>,
    fail_on: Option<String>,
    failed: AtomicBool,
    listings: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentDatabase for FlakyDatabase {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        self.inner.collection(name)
    }

    async fn list_collection_names(&self) -> StorageResult<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.list_collection_names().await
    }

    async fn create_collection(&self, name: &str) -> StorageResult<()> {
        if self.fail_on.as_deref() == Some(name) && !self.failed.swap(true, Ordering::SeqCst) {
            return Err(BackendError::ConnectionFailed {
                backend_name: "flaky".to_string(),
                message: "connection reset".to_string(),
            }
            .into());
        }
        self.inner.create_collection(name).await
    }
}

async fn collection_names(context: &DbContext) -> Vec<String> {
    context.database().list_collection_names().await.unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_reserved_and_empty_names_fail_without_touching_client() {
    for name in ["", "admin", "ADMIN", "local", "config"] {
        let client = Arc::new(CountingClient::default());
        let err = DbContext::new(client.clone(), name, names()).unwrap_err();
        assert!(err.is_configuration(), "{name:?}");
        assert_eq!(client.database_calls(), 0, "{name:?}");
    }
}

#[test]
fn test_malformed_names_fail() {
    let long = "x".repeat(64);
    for name in ["with space", "dot.ted", "sl/ash", "dollar$", long.as_str()] {
        let client = Arc::new(CountingClient::default());
        let err = DbContext::new(client.clone(), name, names()).unwrap_err();
        assert!(
            matches!(
                err,
                StorageError::Configuration(ConfigurationError::InvalidDatabaseName { .. })
            ),
            "{name:?}: {err}"
        );
        assert_eq!(client.database_calls(), 0);
    }
}

#[test]
fn test_valid_name_resolves_database_once() {
    let client = Arc::new(CountingClient::default());
    let context = DbContext::new(client.clone(), DATABASE, names()).unwrap();
    assert_eq!(context.database_name(), DATABASE);

    let _ = context.collection::<Patient>();
    let _ = context.collection::<Patient>();
    assert_eq!(client.database_calls(), 1);
}

#[test]
fn test_from_config() {
    let config = DocumentStoreConfig::from_connection_string("mongodb://db.example:27017/ward_a")
        .unwrap();
    let context =
        DbContext::from_config(Arc::new(MemoryClient::from_config(&config)), &config, names())
            .unwrap();
    assert_eq!(context.database_name(), "ward_a");

    let err = DocumentStoreConfig::from_connection_string("mongodb://db.example/admin")
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Configuration(ConfigurationError::ReservedDatabaseName { .. })
    ));
}

#[test]
fn test_collection_handles_need_no_existing_collection() {
    let context = DbContext::new(Arc::new(MemoryClient::new()), DATABASE, names()).unwrap();
    let handle = context.collection::<Patient>();
    assert_eq!(handle.name(), "patients");
}

// ============================================================================
// Initialize
// ============================================================================

#[tokio::test]
async fn test_initialize_twice_creates_once() {
    let context = DbContext::new(Arc::new(MemoryClient::new()), DATABASE, names()).unwrap();

    let created = context.initialize(["a", "b"]).await.unwrap();
    assert_eq!(created, vec!["a", "b"]);
    let created = context.initialize(["a", "b"]).await.unwrap();
    assert!(created.is_empty());
    assert_eq!(collection_names(&context).await, vec!["a", "b"]);
}

#[tokio::test]
async fn test_initialize_empty_does_not_list() {
    let client = Arc::new(CountingClient::default());
    let context = DbContext::new(client.clone(), DATABASE, names()).unwrap();

    let created = context.initialize(Vec::<String>::new()).await.unwrap();
    assert!(created.is_empty());
    assert_eq!(client.listings(), 0);

    context.initialize(["a"]).await.unwrap();
    assert_eq!(client.listings(), 1);
}

#[tokio::test]
async fn test_initialize_skips_existing_collections() {
    let repo = repo_with_client(Arc::new(MemoryClient::new()));
    repo.add(&Patient::new("Smith", 40)).await.unwrap();

    let created = repo.initialize(["patients", "devices"]).await.unwrap();
    assert_eq!(created, vec!["devices"]);
    assert_eq!(repo.count::<Patient>(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_initialize_failure_keeps_earlier_creations_and_reruns() {
    let context = DbContext::new(
        Arc::new(CountingClient::failing_on("b")),
        DATABASE,
        names(),
    )
    .unwrap();

    let err = context.initialize(["a", "b", "c"]).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::ConnectionFailed { .. })
    ));
    assert_eq!(collection_names(&context).await, vec!["a"]);

    let created = context.initialize(["a", "b", "c"]).await.unwrap();
    assert_eq!(created, vec!["b", "c"]);
    assert_eq!(collection_names(&context).await, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_concurrent_initialize_creates_each_once() {
    let context = Arc::new(DbContext::new(Arc::new(MemoryClient::new()), DATABASE, names()).unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let context = Arc::clone(&context);
            tokio::spawn(async move { context.initialize(["x", "y", "z"]).await })
        })
        .collect();

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap().unwrap().len();
    }
    assert_eq!(total, 3);
    assert_eq!(collection_names(&context).await, vec!["x", "y", "z"]);
}
