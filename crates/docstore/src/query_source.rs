//! Composable query sources.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::collection::CollectionHandle;
use crate::core::FindQuery;
use crate::entity::Entity;
use crate::error::StorageResult;
use crate::query::{Filter, Projection, Sort};
use crate::session::Session;

/// A query over the collection of `T`, built up step by step and executed
/// with [`to_list`](QuerySource::to_list), [`first`](QuerySource::first) or
/// [`count`](QuerySource::count).
///
/// Each [`filter`](QuerySource::filter) call narrows the result further.
///
/// # Example
///
/// ```ignore
/// let oldest_smiths = context
///     .queryable::<Patient>()
///     .filter(field("name").eq("Smith"))
///     .filter(field("age").gte(65))
///     .sort(Sort::descending("age"))
///     .limit(10)
///     .to_list()
///     .await?;
/// ```
pub struct QuerySource<T> {
    collection: CollectionHandle<T>,
    query: FindQuery,
}

impl<T> Clone for QuerySource<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            query: self.query.clone(),
        }
    }
}

impl<T> fmt::Debug for QuerySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySource")
            .field("collection", &self.collection)
            .field("query", &self.query)
            .finish()
    }
}

impl<T: Entity> QuerySource<T> {
    pub(crate) fn new(collection: CollectionHandle<T>) -> Self {
        Self {
            collection,
            query: FindQuery::default(),
        }
    }

    /// Adds a predicate; all predicates must match.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filter = std::mem::take(&mut self.query.filter).and(filter);
        self
    }

    /// Sets the result order.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.query = self.query.with_sort(Some(sort));
        self
    }

    /// Skips the first `n` results.
    pub fn skip(mut self, n: u64) -> Self {
        self.query.skip = Some(n);
        self
    }

    /// Returns at most `n` results. Zero means no limit.
    pub fn limit(mut self, n: u64) -> Self {
        self.query.limit = Some(n);
        self
    }

    /// Restricts the materialized fields.
    pub fn project(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Returns the query built so far.
    pub fn query(&self) -> &FindQuery {
        &self.query
    }

    /// Returns the collection name.
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Runs the query.
    pub async fn to_list(&self) -> StorageResult<Vec<T>> {
        self.collection.find(&self.query, None).await
    }

    /// Runs the query inside `session`.
    pub async fn to_list_in(&self, session: &mut Session) -> StorageResult<Vec<T>> {
        self.collection.find(&self.query, Some(session)).await
    }

    /// Runs the query, deserializing each result into `D`.
    pub async fn to_list_as<D: DeserializeOwned>(&self) -> StorageResult<Vec<D>> {
        self.collection.find_as(&self.query, None).await
    }

    /// Returns the first result.
    pub async fn first(&self) -> StorageResult<Option<T>> {
        self.first_with(None).await
    }

    /// Returns the first result inside `session`.
    pub async fn first_in(&self, session: &mut Session) -> StorageResult<Option<T>> {
        self.first_with(Some(session)).await
    }

    async fn first_with(&self, session: Option<&mut Session>) -> StorageResult<Option<T>> {
        let query = self.query.clone().with_limit(1);
        Ok(self.collection.find(&query, session).await?.into_iter().next())
    }

    /// Counts the results, honoring skip and limit.
    pub async fn count(&self) -> StorageResult<u64> {
        self.count_with(None).await
    }

    /// Counts the results inside `session`.
    pub async fn count_in(&self, session: &mut Session) -> StorageResult<u64> {
        self.count_with(Some(session)).await
    }

    async fn count_with(&self, session: Option<&mut Session>) -> StorageResult<u64> {
        let total = self.collection.count(&self.query.filter, session).await?;
        let remaining = total.saturating_sub(self.query.skip.unwrap_or(0));
        Ok(match self.query.limit {
            Some(limit) if limit > 0 => remaining.min(limit),
            _ => remaining,
        })
    }
}
