//! Driver traits.
//!
//! These traits are the only surface the context and repository use to reach
//! a document store. A backend implements all three; everything above them is
//! backend independent.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{BackendCapability, BackendKind};
use crate::error::StorageResult;
use crate::query::{Filter, Projection, Sort, UpdateSpec};
use crate::session::Session;

/// A stored document.
pub type Document = Map<String, Value>;

/// A connected document store client.
#[async_trait]
pub trait DocumentClient: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns all capabilities supported by this backend.
    fn capabilities(&self) -> Vec<BackendCapability>;

    /// Checks if this backend supports the given capability.
    fn supports(&self, capability: BackendCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Returns a handle to the named database. Never fails; the database is
    /// created by the store on first write.
    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase>;

    /// Starts a new session.
    async fn start_session(&self) -> StorageResult<Session>;
}

/// A database inside a store.
#[async_trait]
pub trait DocumentDatabase: Send + Sync + Debug {
    /// Returns the database name.
    fn name(&self) -> &str;

    /// Returns a handle to the named collection, whether it exists or not.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;

    /// Lists the names of existing collections.
    async fn list_collection_names(&self) -> StorageResult<Vec<String>>;

    /// Creates a collection. Fails with
    /// [`BackendError::NamespaceExists`](crate::error::BackendError::NamespaceExists)
    /// if it already exists.
    async fn create_collection(&self, name: &str) -> StorageResult<()>;
}

/// A collection of documents.
///
/// Every operation takes an optional session; without one, the operation runs
/// on its own.
#[async_trait]
pub trait DocumentCollection: Send + Sync + Debug {
    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Returns the documents matching `query`.
    async fn find(
        &self,
        query: &FindQuery,
        session: Option<&mut Session>,
    ) -> StorageResult<Vec<Document>>;

    /// Inserts a document. Fails on a duplicate `_id`.
    async fn insert_one(
        &self,
        document: Document,
        session: Option<&mut Session>,
    ) -> StorageResult<()>;

    /// Inserts several documents. Returns the number inserted.
    async fn insert_many(
        &self,
        documents: Vec<Document>,
        session: Option<&mut Session>,
    ) -> StorageResult<u64>;

    /// Replaces the first document matching `filter`.
    async fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`.
    async fn delete_one(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome>;

    /// Deletes every document matching `filter`.
    async fn delete_many(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome>;

    /// Counts the documents matching `filter`.
    async fn count_documents(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<u64>;
}

/// Parameters of a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Documents to match.
    pub filter: Filter,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Fields to return.
    pub projection: Option<Projection>,
    /// Result order. Without one, documents come back in store order.
    pub sort: Option<Sort>,
}

impl FindQuery {
    /// Creates a query matching `filter`.
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Sets the number of documents to skip.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the projection.
    pub fn with_projection(mut self, projection: Option<Projection>) -> Self {
        self.projection = projection;
        self
    }

    /// Sets the sort order.
    pub fn with_sort(mut self, sort: Option<Sort>) -> Self {
        self.sort = sort.filter(|s| !s.is_empty());
        self
    }
}

/// Result of a replace or partial update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Documents removed.
    pub deleted: u64,
}
