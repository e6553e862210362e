//! Database context.
//!
//! [`DbContext`] owns the client and database handles for the life of the
//! process. It resolves collection handles by entity type on every call and
//! bootstraps collections with [`initialize`](DbContext::initialize).
//!
//! Construct it once and share it behind an `Arc`:
//!
//! ```
//! use std::sync::Arc;
//! use helios_docstore::backends::memory::MemoryClient;
//! use helios_docstore::naming::TypeNameProvider;
//! use helios_docstore::DbContext;
//!
//! let context = DbContext::new(
//!     Arc::new(MemoryClient::new()),
//!     "clinic",
//!     Arc::new(TypeNameProvider::new()),
//! )
//! .unwrap();
//! assert_eq!(context.database_name(), "clinic");
//!
//! assert!(DbContext::new(
//!     Arc::new(MemoryClient::new()),
//!     "admin",
//!     Arc::new(TypeNameProvider::new()),
//! )
//! .is_err());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::collection::CollectionHandle;
use crate::config::{DocumentStoreConfig, validate_database_name};
use crate::core::{DocumentClient, DocumentDatabase};
use crate::entity::Entity;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::naming::{CollectionNameProvider, EntityType};
use crate::query_source::QuerySource;
use crate::session::Session;

/// Owner of the store connection.
pub struct DbContext {
    client: Arc<dyn DocumentClient>,
    database: Arc<dyn DocumentDatabase>,
    names: Arc<dyn CollectionNameProvider>,
}

impl DbContext {
    /// Creates a context over `database_name`.
    ///
    /// The name is validated before the client is asked for the database, so
    /// an empty or reserved name fails without touching the store.
    pub fn new(
        client: Arc<dyn DocumentClient>,
        database_name: &str,
        names: Arc<dyn CollectionNameProvider>,
    ) -> StorageResult<Self> {
        validate_database_name(database_name)?;
        let database = client.database(database_name);
        debug!(
            database = database_name,
            backend = %client.kind(),
            "Database context created"
        );
        Ok(Self {
            client,
            database,
            names,
        })
    }

    /// Creates a context over the database named in `config`.
    pub fn from_config(
        client: Arc<dyn DocumentClient>,
        config: &DocumentStoreConfig,
        names: Arc<dyn CollectionNameProvider>,
    ) -> StorageResult<Self> {
        Self::new(client, &config.database, names)
    }

    /// Returns the client.
    pub fn client(&self) -> &Arc<dyn DocumentClient> {
        &self.client
    }

    /// Returns the database handle.
    pub fn database(&self) -> &Arc<dyn DocumentDatabase> {
        &self.database
    }

    /// Returns the database name.
    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Returns the collection name provider.
    pub fn names(&self) -> &Arc<dyn CollectionNameProvider> {
        &self.names
    }

    /// Returns the collection name for `T`.
    pub fn collection_name<T: 'static>(&self) -> String {
        self.names.collection_name(&EntityType::of::<T>())
    }

    /// Returns a handle to the collection of `T`.
    ///
    /// The collection does not have to exist yet.
    pub fn collection<T: Entity>(&self) -> CollectionHandle<T> {
        CollectionHandle::new(self.database.collection(&self.collection_name::<T>()))
    }

    /// Returns a composable query over the collection of `T`.
    pub fn queryable<T: Entity>(&self) -> QuerySource<T> {
        QuerySource::new(self.collection::<T>())
    }

    /// Starts a new session on the client.
    pub async fn start_session(&self) -> StorageResult<Session> {
        self.client.start_session().await
    }

    /// Creates every collection in `names` that does not exist yet and returns
    /// the names it created.
    ///
    /// Running it again with the same names creates nothing. On failure the
    /// collections created so far stay; rerun to finish.
    #[instrument(skip(self, names), fields(database = %self.database_name()))]
    pub async fn initialize<I, S>(&self, names: I) -> StorageResult<Vec<String>>
    where
        I: IntoIterator<Item = S> + Send,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let requested: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|name| seen.insert(name.clone()))
            .collect();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let existing: HashSet<String> = self
            .database
            .list_collection_names()
            .await?
            .into_iter()
            .collect();

        let mut created = Vec::new();
        for name in requested.into_iter().filter(|n| !existing.contains(n)) {
            match self.database.create_collection(&name).await {
                Ok(()) => {
                    info!(collection = %name, "Created collection");
                    created.push(name);
                }
                Err(StorageError::Backend(BackendError::NamespaceExists { .. })) => {
                    debug!(collection = %name, "Collection appeared concurrently");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("backend", &self.client.kind())
            .field("database", &self.database_name())
            .field("names", &self.names)
            .finish()
    }
}
