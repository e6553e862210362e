//! Typed collection handles.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{DeleteOutcome, Document, DocumentCollection, FindQuery, UpdateOutcome};
use crate::entity::{Entity, EntityKey, ID_FIELD};
use crate::error::{StorageResult, ValidationError};
use crate::query::{Filter, Projection, Sort, UpdateSpec};
use crate::session::Session;

/// A handle to the collection holding entities of type `T`.
///
/// Handles are cheap, resolved per call by
/// [`DbContext::collection`](crate::DbContext::collection), and carry no
/// caller state. They convert between entities and documents and forward to
/// the backend collection.
pub struct CollectionHandle<T> {
    inner: Arc<dyn DocumentCollection>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CollectionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for CollectionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.inner.name())
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Entity> CollectionHandle<T> {
    pub(crate) fn new(inner: Arc<dyn DocumentCollection>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped backend collection.
    pub fn raw(&self) -> &Arc<dyn DocumentCollection> {
        &self.inner
    }

    /// Serializes an entity into a document.
    ///
    /// The entity must serialize to a JSON object carrying `_id`.
    pub fn to_document(entity: &T) -> StorageResult<Document> {
        match serde_json::to_value(entity)? {
            Value::Object(map) if map.contains_key(ID_FIELD) => Ok(map),
            Value::Object(_) => Err(ValidationError::MissingId {
                entity_type: std::any::type_name::<T>(),
            }
            .into()),
            other => Err(ValidationError::NotADocument {
                entity_type: std::any::type_name::<T>(),
                message: format!("serialized to {}", json_kind(&other)),
            }
            .into()),
        }
    }

    /// Deserializes a stored document into `D`.
    pub fn from_document<D: DeserializeOwned>(document: Document) -> StorageResult<D> {
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    /// Returns the filter matching the entity with identifier `id`.
    pub fn id_filter(id: &T::Key) -> StorageResult<Filter> {
        Ok(Filter::id_eq(id.to_value()?))
    }

    /// Returns the entities matching `query`.
    pub async fn find(
        &self,
        query: &FindQuery,
        session: Option<&mut Session>,
    ) -> StorageResult<Vec<T>> {
        self.find_as(query, session).await
    }

    /// Returns the documents matching `query` deserialized into `D`.
    pub async fn find_as<D: DeserializeOwned>(
        &self,
        query: &FindQuery,
        session: Option<&mut Session>,
    ) -> StorageResult<Vec<D>> {
        self.inner
            .find(query, session)
            .await?
            .into_iter()
            .map(Self::from_document)
            .collect()
    }

    /// Returns the first entity matching `filter`.
    pub async fn find_one(
        &self,
        filter: Filter,
        projection: Option<Projection>,
        sort: Option<Sort>,
        session: Option<&mut Session>,
    ) -> StorageResult<Option<T>> {
        let query = FindQuery::new(filter)
            .with_limit(1)
            .with_projection(projection)
            .with_sort(sort);
        Ok(self.find(&query, session).await?.into_iter().next())
    }

    /// Inserts one entity.
    pub async fn insert_one(&self, entity: &T, session: Option<&mut Session>) -> StorageResult<()> {
        self.inner
            .insert_one(Self::to_document(entity)?, session)
            .await
    }

    /// Inserts several entities. Returns the number inserted.
    pub async fn insert_many(
        &self,
        entities: &[T],
        session: Option<&mut Session>,
    ) -> StorageResult<u64> {
        let documents = entities
            .iter()
            .map(Self::to_document)
            .collect::<StorageResult<Vec<_>>>()?;
        self.inner.insert_many(documents, session).await
    }

    /// Replaces the stored document with the same identifier as `entity`.
    pub async fn replace_one(
        &self,
        entity: &T,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        let filter = Self::id_filter(entity.id())?;
        self.inner
            .replace_one(&filter, Self::to_document(entity)?, session)
            .await
    }

    /// Applies `update` to the first document matching `filter`.
    pub async fn update_one(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        self.inner.update_one(filter, update, session).await
    }

    /// Applies `update` to every document matching `filter`.
    pub async fn update_many(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        self.inner.update_many(filter, update, session).await
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome> {
        self.inner.delete_one(filter, session).await
    }

    /// Deletes every document matching `filter`.
    pub async fn delete_many(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome> {
        self.inner.delete_many(filter, session).await
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: &Filter, session: Option<&mut Session>) -> StorageResult<u64> {
        self.inner.count_documents(filter, session).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
