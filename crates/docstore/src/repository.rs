//! Generic repository.
//!
//! [`Repository`] is the persistence API application code talks to. One
//! instance serves every entity type: each method is generic over
//! `T: Entity` and resolves the collection of `T` through the
//! [`DbContext`] on every call. The repository holds no mutable state, so a
//! single clone can be shared by any number of concurrent tasks.
//!
//! # Sessions
//!
//! Every mutating operation has a `*_with` form taking [`WriteOptions`]; reads
//! take their session through [`ListOptions`] / [`FindOneOptions`]. The
//! session is borrowed for the duration of the call and never retained:
//! starting, committing and aborting transactions is the caller's business.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use helios_docstore::backends::memory::MemoryClient;
//! use helios_docstore::entity::{Entity, EntityKey, ObjectId};
//! use helios_docstore::naming::TypeNameProvider;
//! use helios_docstore::{DbContext, ListOptions, Repository, WriteOptions};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Ward {
//!     #[serde(rename = "_id")]
//!     id: ObjectId,
//!     name: String,
//! }
//!
//! impl Entity for Ward {
//!     type Key = ObjectId;
//!     fn id(&self) -> &ObjectId {
//!         &self.id
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let context = DbContext::new(
//!     Arc::new(MemoryClient::new()),
//!     "clinic",
//!     Arc::new(TypeNameProvider::new()),
//! )?;
//! let repo = Repository::new(Arc::new(context));
//!
//! let ward = Ward { id: ObjectId::generate(), name: "North".into() };
//! let mut session = repo.start_session().await?;
//! session.start_transaction().await?;
//! repo.add_with(&ward, WriteOptions::in_session(&mut session)).await?;
//! session.commit_transaction().await?;
//!
//! assert_eq!(repo.get::<Ward>(&ward.id).await?, Some(ward));
//! assert_eq!(repo.list::<Ward>(ListOptions::new()).await?.len(), 1);
//! # Ok::<(), helios_docstore::StorageError>(())
//! # }).unwrap();
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::collection::CollectionHandle;
use crate::context::DbContext;
use crate::core::{DeleteOutcome, FindQuery, UpdateOutcome};
use crate::entity::{Entity, EntityKey};
use crate::error::StorageResult;
use crate::query::{Field, Filter, Projection, Sort, UpdateSpec};
use crate::query_source::QuerySource;
use crate::session::Session;

/// Options for a single-document write, or a count.
#[derive(Debug, Default)]
pub struct WriteOptions<'s> {
    /// Session to run the operation in.
    pub session: Option<&'s mut Session>,
}

impl<'s> WriteOptions<'s> {
    /// No session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the operation inside `session`.
    pub fn in_session(session: &'s mut Session) -> Self {
        Self {
            session: Some(session),
        }
    }
}

/// Options for [`Repository::list`].
///
/// Paging applies only when both `skip` and `take` are set; either one on its
/// own is ignored. A `take` of zero means no limit.
#[derive(Debug, Default)]
pub struct ListOptions<'s> {
    /// Number of matches to skip.
    pub skip: Option<u64>,
    /// Maximum number of matches to return.
    pub take: Option<u64>,
    /// Predicate; `None` matches everything.
    pub filter: Option<Filter>,
    /// Fields to materialize; `None` materializes whole documents.
    pub projection: Option<Projection>,
    /// Result order; `None` keeps the store's natural order.
    pub sort: Option<Sort>,
    /// Session to run the query in.
    pub session: Option<&'s mut Session>,
}

impl<'s> ListOptions<'s> {
    /// Lists everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips `n` matches.
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` matches.
    pub fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }

    /// Shorthand for `skip(skip).take(take)`.
    pub fn page(self, skip: u64, take: u64) -> Self {
        self.skip(skip).take(take)
    }

    /// Restricts the result to matches of `filter`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Restricts the materialized fields.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Orders the result.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Runs the query inside `session`.
    pub fn session(mut self, session: &'s mut Session) -> Self {
        self.session = Some(session);
        self
    }

    fn into_query(self) -> (FindQuery, Option<&'s mut Session>) {
        let mut query = FindQuery::new(self.filter.unwrap_or_default())
            .with_projection(self.projection)
            .with_sort(self.sort);
        if let (Some(skip), Some(take)) = (self.skip, self.take) {
            query = query.with_skip(skip).with_limit(take);
        }
        (query, self.session)
    }
}

/// Options for [`Repository::find_one`].
#[derive(Debug, Default)]
pub struct FindOneOptions<'s> {
    /// Predicate; `None` matches everything.
    pub filter: Option<Filter>,
    /// Fields to materialize.
    pub projection: Option<Projection>,
    /// Order deciding which match comes first.
    pub sort: Option<Sort>,
    /// Session to run the query in.
    pub session: Option<&'s mut Session>,
}

impl<'s> FindOneOptions<'s> {
    /// Matches anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the match to `filter`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Restricts the materialized fields.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Picks the first match in this order.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Runs the query inside `session`.
    pub fn session(mut self, session: &'s mut Session) -> Self {
        self.session = Some(session);
        self
    }
}

/// CRUD facade over a [`DbContext`].
#[derive(Debug, Clone)]
pub struct Repository {
    context: Arc<DbContext>,
}

impl From<DbContext> for Repository {
    fn from(context: DbContext) -> Self {
        Self::new(Arc::new(context))
    }
}

impl Repository {
    /// Creates a repository over `context`.
    pub fn new(context: Arc<DbContext>) -> Self {
        Self { context }
    }

    /// Returns the database context.
    pub fn context(&self) -> &Arc<DbContext> {
        &self.context
    }

    fn collection<T: Entity>(&self) -> CollectionHandle<T> {
        self.context.collection::<T>()
    }

    /// Returns a composable query over the collection of `T`.
    pub fn query<T: Entity>(&self) -> QuerySource<T> {
        self.context.queryable::<T>()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns the entity with identifier `id`, or `None`.
    pub async fn get<T: Entity>(&self, id: &T::Key) -> StorageResult<Option<T>> {
        let collection = self.collection::<T>();
        debug!(collection = collection.name(), id = %id, "get");
        collection
            .find_one(CollectionHandle::<T>::id_filter(id)?, None, None, None)
            .await
    }

    /// Returns the entity whose identifier has the textual form `id`.
    ///
    /// Fails with a validation error if `id` is not a valid `T::Key`.
    pub async fn get_by_str<T: Entity>(&self, id: &str) -> StorageResult<Option<T>> {
        let key = T::Key::parse_key(id)?;
        self.get::<T>(&key).await
    }

    /// Returns the first entity matching the options' filter, or `None`.
    pub async fn find_one<T: Entity>(
        &self,
        options: FindOneOptions<'_>,
    ) -> StorageResult<Option<T>> {
        let collection = self.collection::<T>();
        debug!(collection = collection.name(), "find_one");
        collection
            .find_one(
                options.filter.unwrap_or_default(),
                options.projection,
                options.sort,
                options.session,
            )
            .await
    }

    /// Returns the entities selected by `options`.
    pub async fn list<T: Entity>(&self, options: ListOptions<'_>) -> StorageResult<Vec<T>> {
        self.list_as::<T, T>(options).await
    }

    /// Returns the documents selected by `options` deserialized into `P`.
    ///
    /// Use this with a projection whose result no longer fits `T`.
    pub async fn list_as<T: Entity, P: DeserializeOwned>(
        &self,
        options: ListOptions<'_>,
    ) -> StorageResult<Vec<P>> {
        let collection = self.collection::<T>();
        let (query, session) = options.into_query();
        let found = collection.find_as::<P>(&query, session).await?;
        debug!(
            collection = collection.name(),
            skip = ?query.skip,
            limit = ?query.limit,
            found = found.len(),
            "list"
        );
        Ok(found)
    }

    /// Counts the entities matching `filter`; `None` counts all.
    pub async fn count<T: Entity>(&self, filter: Option<Filter>) -> StorageResult<u64> {
        self.count_with::<T>(filter, WriteOptions::new()).await
    }

    /// [`count`](Self::count) with options.
    pub async fn count_with<T: Entity>(
        &self,
        filter: Option<Filter>,
        options: WriteOptions<'_>,
    ) -> StorageResult<u64> {
        let collection = self.collection::<T>();
        let count = collection
            .count(&filter.unwrap_or_default(), options.session)
            .await?;
        debug!(collection = collection.name(), count, "count");
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    /// Inserts `entity`. Fails if its identifier is already stored.
    pub async fn add<T: Entity>(&self, entity: &T) -> StorageResult<()> {
        self.add_with(entity, WriteOptions::new()).await
    }

    /// [`add`](Self::add) with options.
    pub async fn add_with<T: Entity>(
        &self,
        entity: &T,
        options: WriteOptions<'_>,
    ) -> StorageResult<()> {
        let collection = self.collection::<T>();
        collection.insert_one(entity, options.session).await?;
        debug!(collection = collection.name(), id = %entity.id(), "add");
        Ok(())
    }

    /// Inserts `entities` and returns how many were stored.
    ///
    /// An empty slice is a no-op. Store errors are returned as-is.
    pub async fn add_many<T: Entity>(&self, entities: &[T]) -> StorageResult<u64> {
        self.add_many_with(entities, WriteOptions::new()).await
    }

    /// [`add_many`](Self::add_many) with options.
    pub async fn add_many_with<T: Entity>(
        &self,
        entities: &[T],
        options: WriteOptions<'_>,
    ) -> StorageResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }
        let collection = self.collection::<T>();
        let inserted = collection.insert_many(entities, options.session).await?;
        debug!(collection = collection.name(), inserted, "add_many");
        Ok(inserted)
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Replaces the stored document of `entity` with `entity`.
    ///
    /// Fields missing from `entity` disappear from the stored document. No
    /// match is not an error: the outcome reports `matched == 0`.
    pub async fn update<T: Entity>(&self, entity: &T) -> StorageResult<UpdateOutcome> {
        self.update_with(entity, WriteOptions::new()).await
    }

    /// [`update`](Self::update) with options.
    pub async fn update_with<T: Entity>(
        &self,
        entity: &T,
        options: WriteOptions<'_>,
    ) -> StorageResult<UpdateOutcome> {
        let collection = self.collection::<T>();
        let outcome = collection.replace_one(entity, options.session).await?;
        if outcome.matched == 0 {
            debug!(collection = collection.name(), id = %entity.id(), "update matched nothing");
        } else {
            debug!(collection = collection.name(), id = %entity.id(), "update");
        }
        Ok(outcome)
    }

    /// Applies `update` to the stored document of `entity`.
    pub async fn update_one<T: Entity>(
        &self,
        entity: &T,
        update: &UpdateSpec,
    ) -> StorageResult<UpdateOutcome> {
        self.update_one_with(entity, update, WriteOptions::new())
            .await
    }

    /// [`update_one`](Self::update_one) with options.
    pub async fn update_one_with<T: Entity>(
        &self,
        entity: &T,
        update: &UpdateSpec,
        options: WriteOptions<'_>,
    ) -> StorageResult<UpdateOutcome> {
        let collection = self.collection::<T>();
        let filter = CollectionHandle::<T>::id_filter(entity.id())?;
        let outcome = collection
            .update_one(&filter, update, options.session)
            .await?;
        debug!(
            collection = collection.name(),
            id = %entity.id(),
            matched = outcome.matched,
            modified = outcome.modified,
            "update_one"
        );
        Ok(outcome)
    }

    /// Sets one field of the stored document of `entity` to `value`.
    pub async fn update_one_field<T, V>(
        &self,
        entity: &T,
        field: Field<T, V>,
        value: &V,
    ) -> StorageResult<UpdateOutcome>
    where
        T: Entity,
        V: Serialize + Sync,
    {
        self.update_one_field_with(entity, field, value, WriteOptions::new())
            .await
    }

    /// [`update_one_field`](Self::update_one_field) with options.
    pub async fn update_one_field_with<T, V>(
        &self,
        entity: &T,
        field: Field<T, V>,
        value: &V,
        options: WriteOptions<'_>,
    ) -> StorageResult<UpdateOutcome>
    where
        T: Entity,
        V: Serialize + Sync,
    {
        let update = field.set(value)?;
        self.update_one_with(entity, &update, options).await
    }

    /// Applies `update` to every document matching `filter`; `None` matches
    /// all.
    pub async fn update_many<T: Entity>(
        &self,
        filter: Option<Filter>,
        update: &UpdateSpec,
    ) -> StorageResult<UpdateOutcome> {
        self.update_many_with::<T>(filter, update, WriteOptions::new())
            .await
    }

    /// [`update_many`](Self::update_many) with options.
    pub async fn update_many_with<T: Entity>(
        &self,
        filter: Option<Filter>,
        update: &UpdateSpec,
        options: WriteOptions<'_>,
    ) -> StorageResult<UpdateOutcome> {
        let collection = self.collection::<T>();
        let outcome = collection
            .update_many(&filter.unwrap_or_default(), update, options.session)
            .await?;
        debug!(
            collection = collection.name(),
            matched = outcome.matched,
            modified = outcome.modified,
            "update_many"
        );
        Ok(outcome)
    }

    /// Sets one field of every document matching `filter` to `value`.
    pub async fn update_many_field<T, V>(
        &self,
        filter: Option<Filter>,
        field: Field<T, V>,
        value: &V,
    ) -> StorageResult<UpdateOutcome>
    where
        T: Entity,
        V: Serialize + Sync,
    {
        self.update_many_field_with(filter, field, value, WriteOptions::new())
            .await
    }

    /// [`update_many_field`](Self::update_many_field) with options.
    pub async fn update_many_field_with<T, V>(
        &self,
        filter: Option<Filter>,
        field: Field<T, V>,
        value: &V,
        options: WriteOptions<'_>,
    ) -> StorageResult<UpdateOutcome>
    where
        T: Entity,
        V: Serialize + Sync,
    {
        let update = field.set(value)?;
        self.update_many_with::<T>(filter, &update, options).await
    }

    // ------------------------------------------------------------------
    // Deletes
    // ------------------------------------------------------------------

    /// Deletes the stored document of `entity`. No match is not an error.
    pub async fn delete<T: Entity>(&self, entity: &T) -> StorageResult<DeleteOutcome> {
        self.delete_with(entity, WriteOptions::new()).await
    }

    /// [`delete`](Self::delete) with options.
    pub async fn delete_with<T: Entity>(
        &self,
        entity: &T,
        options: WriteOptions<'_>,
    ) -> StorageResult<DeleteOutcome> {
        let collection = self.collection::<T>();
        let filter = CollectionHandle::<T>::id_filter(entity.id())?;
        let outcome = collection.delete_one(&filter, options.session).await?;
        debug!(
            collection = collection.name(),
            id = %entity.id(),
            deleted = outcome.deleted,
            "delete"
        );
        Ok(outcome)
    }

    /// Deletes every document matching `filter`; `None` deletes all.
    pub async fn delete_many<T: Entity>(
        &self,
        filter: Option<Filter>,
    ) -> StorageResult<DeleteOutcome> {
        self.delete_many_with::<T>(filter, WriteOptions::new()).await
    }

    /// [`delete_many`](Self::delete_many) with options.
    pub async fn delete_many_with<T: Entity>(
        &self,
        filter: Option<Filter>,
        options: WriteOptions<'_>,
    ) -> StorageResult<DeleteOutcome> {
        let collection = self.collection::<T>();
        let outcome = collection
            .delete_many(&filter.unwrap_or_default(), options.session)
            .await?;
        debug!(
            collection = collection.name(),
            deleted = outcome.deleted,
            "delete_many"
        );
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Sessions and bootstrap
    // ------------------------------------------------------------------

    /// Starts a new session. The caller owns it.
    pub async fn start_session(&self) -> StorageResult<Session> {
        self.context.start_session().await
    }

    /// Creates the missing collections among `names`.
    ///
    /// See [`DbContext::initialize`].
    pub async fn initialize<I, S>(&self, names: I) -> StorageResult<Vec<String>>
    where
        I: IntoIterator<Item = S> + Send,
        S: Into<String>,
    {
        self.context.initialize(names).await
    }
}

/// Database-independent CRUD contract for one entity type.
///
/// [`Repository`] implements it for every entity, so services can depend on
/// `Arc<dyn DataRepository<User>>` and swap in a test double.
#[async_trait]
pub trait DataRepository<T: Entity>: Send + Sync {
    /// Returns the entity with identifier `id`.
    async fn get(&self, id: &T::Key) -> StorageResult<Option<T>>;

    /// Returns the entities selected by `options`.
    async fn list(&self, options: ListOptions<'_>) -> StorageResult<Vec<T>>;

    /// Inserts `entity`.
    async fn add(&self, entity: &T) -> StorageResult<()>;

    /// Inserts `entities`.
    async fn add_many(&self, entities: &[T]) -> StorageResult<u64>;

    /// Replaces the stored document of `entity`.
    async fn update(&self, entity: &T) -> StorageResult<UpdateOutcome>;

    /// Deletes the stored document of `entity`.
    async fn delete(&self, entity: &T) -> StorageResult<DeleteOutcome>;

    /// Deletes every document matching `filter`.
    async fn delete_many(&self, filter: Option<Filter>) -> StorageResult<DeleteOutcome>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: Option<Filter>) -> StorageResult<u64>;
}

#[async_trait]
impl<T: Entity> DataRepository<T> for Repository {
    async fn get(&self, id: &T::Key) -> StorageResult<Option<T>> {
        Repository::get::<T>(self, id).await
    }

    async fn list(&self, options: ListOptions<'_>) -> StorageResult<Vec<T>> {
        Repository::list::<T>(self, options).await
    }

    async fn add(&self, entity: &T) -> StorageResult<()> {
        Repository::add(self, entity).await
    }

    async fn add_many(&self, entities: &[T]) -> StorageResult<u64> {
        Repository::add_many(self, entities).await
    }

    async fn update(&self, entity: &T) -> StorageResult<UpdateOutcome> {
        Repository::update(self, entity).await
    }

    async fn delete(&self, entity: &T) -> StorageResult<DeleteOutcome> {
        Repository::delete(self, entity).await
    }

    async fn delete_many(&self, filter: Option<Filter>) -> StorageResult<DeleteOutcome> {
        Repository::delete_many::<T>(self, filter).await
    }

    async fn count(&self, filter: Option<Filter>) -> StorageResult<u64> {
        Repository::count::<T>(self, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryClient;
    use crate::entity::ObjectId;
    use crate::naming::TypeNameProvider;
    use crate::query::field;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Bed {
        #[serde(rename = "_id")]
        id: ObjectId,
        ward: String,
        number: u32,
    }

    impl Entity for Bed {
        type Key = ObjectId;

        fn id(&self) -> &ObjectId {
            &self.id
        }
    }

    fn bed(ward: &str, number: u32) -> Bed {
        Bed {
            id: ObjectId::generate(),
            ward: ward.to_string(),
            number,
        }
    }

    fn repo() -> Repository {
        DbContext::new(
            Arc::new(MemoryClient::new()),
            "clinic",
            Arc::new(TypeNameProvider::new()),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_list_options_page_only_with_both_bounds() {
        let (query, _) = ListOptions::new().skip(1).into_query();
        assert_eq!((query.skip, query.limit), (None, None));

        let (query, _) = ListOptions::new().take(1).into_query();
        assert_eq!((query.skip, query.limit), (None, None));

        let (query, _) = ListOptions::new().page(1, 2).into_query();
        assert_eq!((query.skip, query.limit), (Some(1), Some(2)));
    }

    #[tokio::test]
    async fn test_add_many_empty_is_noop() {
        let repo = repo();
        assert_eq!(repo.add_many::<Bed>(&[]).await.unwrap(), 0);
        assert!(
            repo.context()
                .database()
                .list_collection_names()
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_find_one_with_sort() {
        let repo = repo();
        repo.add_many(&[bed("north", 2), bed("north", 7), bed("south", 9)])
            .await
            .unwrap();

        let found: Bed = repo
            .find_one(
                FindOneOptions::new()
                    .filter(field("ward").eq("north"))
                    .sort(Sort::descending("number")),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.number, 7);
    }

    #[tokio::test]
    async fn test_get_by_str_rejects_malformed_id() {
        let repo = repo();
        let err = repo.get_by_str::<Bed>("not-an-object-id").await.unwrap_err();
        assert!(matches!(err, crate::StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_data_repository_object() {
        let repo: Arc<dyn DataRepository<Bed>> = Arc::new(repo());
        let b = bed("east", 1);
        repo.add(&b).await.unwrap();
        assert_eq!(repo.get(&b.id).await.unwrap(), Some(b.clone()));
        assert_eq!(repo.count(None).await.unwrap(), 1);
        assert_eq!(repo.delete(&b).await.unwrap().deleted, 1);
        assert_eq!(repo.count(None).await.unwrap(), 0);
    }
}
