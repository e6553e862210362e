//! Memory backend client, database and collection handles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value, json};

use super::evaluator::{apply_update, matches, project, sort, values_equal};
use super::session::MemorySession;
use crate::config::DocumentStoreConfig;
use crate::core::{
    BackendCapability, BackendKind, DeleteOutcome, Document, DocumentClient, DocumentCollection,
    DocumentDatabase, FindQuery, UpdateOutcome,
};
use crate::entity::{ID_FIELD, ObjectId};
use crate::error::{BackendError, SessionError, StorageResult, ValidationError};
use crate::logging::log_command;
use crate::query::{Filter, UpdateSpec};
use crate::session::{Session, SessionHandle};

const BACKEND_NAME: &str = "memory";

/// `(database, collection)`.
pub(crate) type CollectionKey = (String, String);

type Collections = HashMap<String, Vec<Document>>;

/// Shared state behind every handle of one client.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    databases: RwLock<HashMap<String, Collections>>,
    next_session: AtomicU64,
}

impl MemoryStore {
    /// Puts snapshotted collections back. `None` removes the collection.
    pub(crate) fn restore(&self, snapshots: HashMap<CollectionKey, Option<Vec<Document>>>) {
        let mut databases = self.databases.write();
        for ((database, collection), docs) in snapshots {
            let collections = databases.entry(database).or_default();
            match docs {
                Some(docs) => {
                    collections.insert(collection, docs);
                }
                None => {
                    collections.remove(&collection);
                }
            }
        }
    }
}

/// An in-process document store.
///
/// Cloning the client shares the underlying data. Documents keep insertion
/// order, which is the order reads return them in when no sort is given.
///
/// # Example
///
/// ```
/// use helios_docstore::backends::memory::MemoryClient;
/// use helios_docstore::core::DocumentClient;
///
/// # tokio_test::block_on(async {
/// let client = MemoryClient::new();
/// let db = client.database("clinic");
/// db.create_collection("patients").await.unwrap();
/// assert_eq!(db.list_collection_names().await.unwrap(), vec!["patients"]);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    store: Arc<MemoryStore>,
    log_commands: bool,
}

impl MemoryClient {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store honoring the configuration's command logging.
    pub fn from_config(config: &DocumentStoreConfig) -> Self {
        Self::new().with_command_logging(config.log_commands)
    }

    /// Enables or disables the command log.
    pub fn with_command_logging(mut self, enabled: bool) -> Self {
        self.log_commands = enabled;
        self
    }
}

#[async_trait]
impl DocumentClient for MemoryClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn capabilities(&self) -> Vec<BackendCapability> {
        vec![
            BackendCapability::Crud,
            BackendCapability::Sessions,
            BackendCapability::Transactions,
            BackendCapability::Projection,
            BackendCapability::Sorting,
            BackendCapability::CommandLogging,
        ]
    }

    fn database(&self, name: &str) -> Arc<dyn DocumentDatabase> {
        Arc::new(MemoryDatabase {
            store: Arc::clone(&self.store),
            name: name.to_string(),
            log_commands: self.log_commands,
        })
    }

    async fn start_session(&self) -> StorageResult<Session> {
        let n = self.store.next_session.fetch_add(1, Ordering::Relaxed);
        let id = format!("memory-session-{}", n);
        tracing::debug!(session = %id, "memory session started");
        Ok(Session::new(MemorySession::new(id, Arc::clone(&self.store))))
    }
}

/// A database of a [`MemoryClient`].
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    store: Arc<MemoryStore>,
    name: String,
    log_commands: bool,
}

impl MemoryDatabase {
    fn log(&self, command: &str, body: Value) {
        if self.log_commands {
            log_command(command, &self.name, None, &body);
        }
    }
}

#[async_trait]
impl DocumentDatabase for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(MemoryCollection {
            store: Arc::clone(&self.store),
            database: self.name.clone(),
            name: name.to_string(),
            log_commands: self.log_commands,
        })
    }

    async fn list_collection_names(&self) -> StorageResult<Vec<String>> {
        self.log("listCollections", json!({ "nameOnly": true }));
        let databases = self.store.databases.read();
        let mut names: Vec<String> = databases
            .get(&self.name)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, name: &str) -> StorageResult<()> {
        self.log("create", json!({ "create": name }));
        let mut databases = self.store.databases.write();
        let collections = databases.entry(self.name.clone()).or_default();
        if collections.contains_key(name) {
            return Err(BackendError::NamespaceExists {
                collection: format!("{}.{}", self.name, name),
            }
            .into());
        }
        collections.insert(name.to_string(), Vec::new());
        Ok(())
    }
}

/// A collection of a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    store: Arc<MemoryStore>,
    database: String,
    name: String,
    log_commands: bool,
}

impl MemoryCollection {
    fn key(&self) -> CollectionKey {
        (self.database.clone(), self.name.clone())
    }

    fn log(&self, command: &str, body: impl FnOnce() -> StorageResult<Value>) -> StorageResult<()> {
        if self.log_commands {
            log_command(command, &self.database, Some(&self.name), &body()?);
        }
        Ok(())
    }

    fn memory_session<'a>(
        &self,
        session: Option<&'a mut Session>,
    ) -> StorageResult<Option<&'a mut MemorySession>> {
        let Some(session) = session else {
            return Ok(None);
        };
        let memory = session.downcast_mut::<MemorySession>(BACKEND_NAME)?;
        if !memory.belongs_to(&self.store) {
            return Err(SessionError::ForeignSession {
                session_id: memory.id().to_string(),
                backend_name: BACKEND_NAME.to_string(),
            }
            .into());
        }
        Ok(Some(memory))
    }

    /// Runs `f` against the collection under the write lock.
    ///
    /// With `create` unset, a missing collection is presented as empty and is
    /// not created.
    fn write<R>(
        &self,
        session: Option<&mut Session>,
        create: bool,
        f: impl FnOnce(&mut Vec<Document>) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let session = self.memory_session(session)?;
        let mut databases = self.store.databases.write();

        if !create
            && !databases
                .get(&self.database)
                .is_some_and(|collections| collections.contains_key(&self.name))
        {
            return f(&mut Vec::new());
        }

        let collections = databases.entry(self.database.clone()).or_default();
        if let Some(session) = session {
            session.record(&self.key(), collections.get(&self.name));
        }
        let docs = collections.entry(self.name.clone()).or_default();
        f(docs)
    }

    fn duplicate(&self, id: &Value) -> crate::error::StorageError {
        BackendError::DuplicateKey {
            collection: self.name.clone(),
            key: id.to_string(),
        }
        .into()
    }
}

fn position(docs: &[Document], filter: &Filter) -> StorageResult<Option<usize>> {
    for (index, doc) in docs.iter().enumerate() {
        if matches(doc, filter)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn ensure_id(mut document: Document) -> StorageResult<(Value, Document)> {
    if let Some(id) = document.get(ID_FIELD) {
        return Ok((id.clone(), document));
    }
    let id = serde_json::to_value(ObjectId::new())?;
    let mut with_id = Map::with_capacity(document.len() + 1);
    with_id.insert(ID_FIELD.to_string(), id.clone());
    with_id.append(&mut document);
    Ok((id, with_id))
}

fn contains_id(docs: &[Document], id: &Value) -> bool {
    docs.iter()
        .any(|doc| doc.get(ID_FIELD).is_some_and(|existing| values_equal(existing, id)))
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(
        &self,
        query: &FindQuery,
        session: Option<&mut Session>,
    ) -> StorageResult<Vec<Document>> {
        query.filter.validate()?;
        if let Some(projection) = &query.projection {
            projection.validate()?;
        }
        self.memory_session(session)?;
        self.log("find", || {
            Ok(json!({
                "find": self.name,
                "filter": query.filter.to_document()?,
                "skip": query.skip,
                "limit": query.limit,
                "projection": query.projection.as_ref().map(|p| p.to_document()),
                "sort": query.sort.as_ref().map(|s| s.to_document()),
            }))
        })?;

        let mut matched = Vec::new();
        {
            let databases = self.store.databases.read();
            if let Some(docs) = databases
                .get(&self.database)
                .and_then(|collections| collections.get(&self.name))
            {
                for doc in docs {
                    if matches(doc, &query.filter)? {
                        matched.push(doc.clone());
                    }
                }
            }
        }

        if let Some(order) = &query.sort {
            sort(&mut matched, order);
        }
        let skipped = matched.into_iter().skip(to_usize(query.skip.unwrap_or(0)));
        // A limit of zero means no limit.
        let page: Vec<Document> = match query.limit {
            Some(limit) if limit > 0 => skipped.take(to_usize(limit)).collect(),
            _ => skipped.collect(),
        };

        Ok(match &query.projection {
            Some(projection) => page
                .iter()
                .map(|doc| project(doc, projection))
                .collect::<StorageResult<Vec<_>>>()?,
            None => page,
        })
    }

    async fn insert_one(
        &self,
        document: Document,
        session: Option<&mut Session>,
    ) -> StorageResult<()> {
        let (id, document) = ensure_id(document)?;
        self.log("insert", || {
            Ok(json!({ "insert": self.name, "documents": [document] }))
        })?;

        self.write(session, true, |docs| {
            if contains_id(docs, &id) {
                return Err(self.duplicate(&id));
            }
            docs.push(document);
            Ok(())
        })
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        session: Option<&mut Session>,
    ) -> StorageResult<u64> {
        let prepared = documents
            .into_iter()
            .map(ensure_id)
            .collect::<StorageResult<Vec<_>>>()?;
        self.log("insert", || {
            let docs: Vec<&Document> = prepared.iter().map(|(_, doc)| doc).collect();
            Ok(json!({ "insert": self.name, "documents": docs }))
        })?;

        self.write(session, true, |docs| {
            let mut batch_ids: HashSet<String> = HashSet::new();
            for (id, _) in &prepared {
                if contains_id(docs, id) || !batch_ids.insert(id.to_string()) {
                    return Err(self.duplicate(id));
                }
            }
            let count = prepared.len() as u64;
            docs.extend(prepared.into_iter().map(|(_, doc)| doc));
            Ok(count)
        })
    }

    async fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        filter.validate()?;
        self.log("update", || {
            Ok(json!({
                "update": self.name,
                "updates": [{ "q": filter.to_document()?, "u": replacement, "multi": false }],
            }))
        })?;

        self.write(session, false, |docs| {
            let Some(index) = position(docs, filter)? else {
                return Ok(UpdateOutcome::default());
            };
            let existing_id = docs[index].get(ID_FIELD).cloned();
            if let (Some(new_id), Some(old_id)) = (replacement.get(ID_FIELD), &existing_id) {
                if !values_equal(new_id, old_id) {
                    return Err(ValidationError::ImmutableField {
                        field: ID_FIELD.to_string(),
                    }
                    .into());
                }
            }

            let mut next = Map::with_capacity(replacement.len() + 1);
            if let Some(id) = existing_id {
                next.insert(ID_FIELD.to_string(), id);
            }
            next.extend(replacement.into_iter().filter(|(k, _)| k != ID_FIELD));

            let modified = docs[index] != next;
            docs[index] = next;
            Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(modified),
            })
        })
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        filter.validate()?;
        update.validate()?;
        self.log("update", || {
            Ok(json!({
                "update": self.name,
                "updates": [{ "q": filter.to_document()?, "u": update.to_document()?, "multi": false }],
            }))
        })?;

        self.write(session, false, |docs| {
            let Some(index) = position(docs, filter)? else {
                return Ok(UpdateOutcome::default());
            };
            let mut next = docs[index].clone();
            let modified = apply_update(&mut next, update)?;
            docs[index] = next;
            Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(modified),
            })
        })
    }

    async fn update_many(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        filter.validate()?;
        update.validate()?;
        self.log("update", || {
            Ok(json!({
                "update": self.name,
                "updates": [{ "q": filter.to_document()?, "u": update.to_document()?, "multi": true }],
            }))
        })?;

        self.write(session, false, |docs| {
            // Apply to copies first so a failing document leaves all unchanged.
            let mut staged = Vec::new();
            for (index, doc) in docs.iter().enumerate() {
                if matches(doc, filter)? {
                    let mut next = doc.clone();
                    let modified = apply_update(&mut next, update)?;
                    staged.push((index, next, modified));
                }
            }

            let mut outcome = UpdateOutcome::default();
            for (index, next, modified) in staged {
                outcome.matched += 1;
                outcome.modified += u64::from(modified);
                docs[index] = next;
            }
            Ok(outcome)
        })
    }

    async fn delete_one(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome> {
        filter.validate()?;
        self.log("delete", || {
            Ok(json!({
                "delete": self.name,
                "deletes": [{ "q": filter.to_document()?, "limit": 1 }],
            }))
        })?;

        self.write(session, false, |docs| {
            Ok(match position(docs, filter)? {
                Some(index) => {
                    docs.remove(index);
                    DeleteOutcome { deleted: 1 }
                }
                None => DeleteOutcome::default(),
            })
        })
    }

    async fn delete_many(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome> {
        filter.validate()?;
        self.log("delete", || {
            Ok(json!({
                "delete": self.name,
                "deletes": [{ "q": filter.to_document()?, "limit": 0 }],
            }))
        })?;

        self.write(session, false, |docs| {
            let doomed = docs
                .iter()
                .map(|doc| matches(doc, filter))
                .collect::<StorageResult<Vec<bool>>>()?;
            let mut flags = doomed.iter();
            docs.retain(|_| !flags.next().copied().unwrap_or(false));
            Ok(DeleteOutcome {
                deleted: doomed.iter().filter(|d| **d).count() as u64,
            })
        })
    }

    async fn count_documents(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<u64> {
        filter.validate()?;
        self.memory_session(session)?;
        self.log("count", || {
            Ok(json!({ "count": self.name, "query": filter.to_document()? }))
        })?;

        let databases = self.store.databases.read();
        let Some(docs) = databases
            .get(&self.database)
            .and_then(|collections| collections.get(&self.name))
        else {
            return Ok(0);
        };
        let mut count = 0;
        for doc in docs {
            if matches(doc, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }
}
