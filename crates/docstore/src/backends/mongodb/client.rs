//! MongoDB client, database and collection handles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::Document as BsonDocument;
use mongodb::event::EventHandler;
use mongodb::event::command::CommandEvent;
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession, Collection, Database};

use super::convert::{filter_to_bson, from_bson, to_bson, value_to_bson};
use super::session::MongoSession;
use crate::config::DocumentStoreConfig;
use crate::core::{
    BackendCapability, BackendKind, DeleteOutcome, Document, DocumentClient, DocumentCollection,
    DocumentDatabase, FindQuery, UpdateOutcome,
};
use crate::error::{BackendError, ConfigurationError, StorageError, StorageResult};
use crate::logging::log_command;
use crate::query::{Filter, UpdateSpec};
use crate::session::Session;

const BACKEND_NAME: &str = "mongodb";

/// A connected MongoDB client.
///
/// The driver pools connections internally; clone this handle rather than
/// connecting again.
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
}

impl MongoClient {
    /// Connects using `config`.
    ///
    /// The configuration is validated before anything touches the network.
    /// The driver connects lazily, so an unreachable server surfaces on the
    /// first operation rather than here.
    pub async fn connect(config: &DocumentStoreConfig) -> StorageResult<Self> {
        config.validate()?;

        let mut options = ClientOptions::parse(&config.connection_string)
            .await
            .map_err(|e| ConfigurationError::InvalidConnectionString {
                message: e.to_string(),
            })?;
        options.app_name = Some(config.app_name.clone());
        options.max_pool_size = Some(config.max_pool_size);
        options.connect_timeout = Some(Duration::from_millis(config.connect_timeout_ms));
        options.server_selection_timeout =
            Some(Duration::from_millis(config.server_selection_timeout_ms));
        if config.log_commands {
            options.command_event_handler = Some(EventHandler::callback(|event: CommandEvent| {
                if let CommandEvent::Started(started) = event {
                    let body = mongodb::bson::Bson::Document(started.command).into_relaxed_extjson();
                    log_command(&started.command_name, &started.db, None, &body);
                }
            }));
        }

        let client = Client::with_options(options).map_err(|e| BackendError::ConnectionFailed {
            backend_name: BACKEND_NAME.to_string(),
            message: e.to_string(),
        })?;

        tracing::info!(
            app_name = %config.app_name,
            max_pool_size = config.max_pool_size,
            log_commands = config.log_commands,
            "MongoDB client created"
        );
        Ok(Self { client })
    }

    /// Wraps an existing driver client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns the driver client.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl DocumentClient for MongoClient {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDB
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
        Arc::new(MongoDatabase {
            database: self.client.database(name),
        })
    }

    async fn start_session(&self) -> StorageResult<Session> {
        let session = self.client.start_session().await?;
        Ok(Session::new(MongoSession::new(session)))
    }
}

/// A MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoDatabase {
    database: Database,
}

#[async_trait]
impl DocumentDatabase for MongoDatabase {
    fn name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(MongoCollection {
            collection: self.database.collection::<BsonDocument>(name),
        })
    }

    async fn list_collection_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.database.list_collection_names().await?)
    }

    async fn create_collection(&self, name: &str) -> StorageResult<()> {
        self.database
            .create_collection(name)
            .await
            .map_err(|e| match StorageError::from(e) {
                StorageError::Backend(BackendError::NamespaceExists { .. }) => {
                    BackendError::NamespaceExists {
                        collection: format!("{}.{}", self.database.name(), name),
                    }
                    .into()
                }
                other => other,
            })
    }
}

/// A MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    collection: Collection<BsonDocument>,
}

impl MongoCollection {
    /// Fills in the collection name the driver error does not carry.
    fn tag(&self, err: mongodb::error::Error) -> StorageError {
        match StorageError::from(err) {
            StorageError::Backend(BackendError::DuplicateKey { key, .. }) => {
                BackendError::DuplicateKey {
                    collection: self.collection.name().to_string(),
                    key,
                }
                .into()
            }
            other => other,
        }
    }
}

fn client_session(session: Option<&mut Session>) -> StorageResult<Option<&mut ClientSession>> {
    match session {
        Some(session) => Ok(Some(
            session
                .downcast_mut::<MongoSession>(BACKEND_NAME)?
                .client_session_mut(),
        )),
        None => Ok(None),
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn find(
        &self,
        query: &FindQuery,
        session: Option<&mut Session>,
    ) -> StorageResult<Vec<Document>> {
        let mut action = self.collection.find(filter_to_bson(&query.filter)?);
        if let Some(skip) = query.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = query.limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(projection) = &query.projection {
            projection.validate()?;
            action = action.projection(value_to_bson(projection.to_document())?);
        }
        if let Some(sort) = &query.sort {
            action = action.sort(value_to_bson(sort.to_document())?);
        }

        let mut documents = Vec::new();
        match client_session(session)? {
            Some(session) => {
                let mut cursor = action.session(&mut *session).await?;
                while cursor.advance(&mut *session).await? {
                    documents.push(from_bson(cursor.deserialize_current()?)?);
                }
            }
            None => {
                let mut cursor = action.await?;
                while cursor.advance().await? {
                    documents.push(from_bson(cursor.deserialize_current()?)?);
                }
            }
        }
        Ok(documents)
    }

    async fn insert_one(
        &self,
        document: Document,
        session: Option<&mut Session>,
    ) -> StorageResult<()> {
        let document = to_bson(document)?;
        let action = self.collection.insert_one(document);
        let _inserted = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(|e| self.tag(e))?;
        Ok(())
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        session: Option<&mut Session>,
    ) -> StorageResult<u64> {
        let documents = documents
            .into_iter()
            .map(to_bson)
            .collect::<StorageResult<Vec<_>>>()?;
        let action = self.collection.insert_many(documents);
        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(|e| self.tag(e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        let action = self
            .collection
            .replace_one(filter_to_bson(filter)?, to_bson(replacement)?);
        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(|e| self.tag(e))?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        let action = self.collection.update_one(
            filter_to_bson(filter)?,
            value_to_bson(update.to_document()?)?,
        );
        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(|e| self.tag(e))?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        filter: &Filter,
        update: &UpdateSpec,
        session: Option<&mut Session>,
    ) -> StorageResult<UpdateOutcome> {
        let action = self.collection.update_many(
            filter_to_bson(filter)?,
            value_to_bson(update.to_document()?)?,
        );
        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(|e| self.tag(e))?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome> {
        let action = self.collection.delete_one(filter_to_bson(filter)?);
        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }?;
        Ok(DeleteOutcome {
            deleted: result.deleted_count,
        })
    }

    async fn delete_many(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<DeleteOutcome> {
        let action = self.collection.delete_many(filter_to_bson(filter)?);
        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }?;
        Ok(DeleteOutcome {
            deleted: result.deleted_count,
        })
    }

    async fn count_documents(
        &self,
        filter: &Filter,
        session: Option<&mut Session>,
    ) -> StorageResult<u64> {
        let action = self.collection.count_documents(filter_to_bson(filter)?);
        Ok(match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }?)
    }
}
