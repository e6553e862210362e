//! Helios Document Store Repository Layer
//!
//! This crate provides a generic data-access layer over document-oriented
//! databases. Application code declares its entity types once and gets
//! uniform create/read/update/delete, filtering, projection and
//! session-scoped transactions through a single [`Repository`].
//!
//! # Features
//!
//! - **Generic over entities and keys**: one repository serves every
//!   [`Entity`](entity::Entity), keyed by [`ObjectId`](entity::ObjectId),
//!   [`uuid::Uuid`] or `String`
//! - **Filter DSL**: equality, ranges, membership, regex, `and`/`or`/`not`
//! - **Partial updates**: declarative [`UpdateSpec`] or a single typed
//!   [`Field`]
//! - **Sessions**: every write can run inside a caller-owned [`Session`]
//! - **Bootstrap**: idempotent collection creation with
//!   [`DbContext::initialize`]
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! helios-docstore = { version = "0.1", features = ["mongodb"] }
//! ```
//!
//! - `memory` (default) - in-process store for tests and embedded use
//! - `mongodb` - MongoDB through the official driver
//!
//! # Architecture
//!
//! - [`naming`] - entity type to collection name
//! - [`entity`] - identity model and timestamps
//! - [`query`] - filters, projections, sort orders, updates
//! - [`context`] - owner of the connection, collection resolution, bootstrap
//! - [`repository`] - the CRUD facade
//! - [`session`] - session and transaction handles
//! - [`core`] - driver traits implemented by [`backends`]
//! - [`config`], [`logging`], [`error`] - ambient wiring
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use helios_docstore::backends::memory::MemoryClient;
//! use helios_docstore::entity::{Entity, EntityKey, ObjectId, Timestamps};
//! use helios_docstore::naming::{NamingStyle, TypeNameProvider};
//! use helios_docstore::query::{Field, field};
//! use helios_docstore::{DbContext, DocumentStoreConfig, ListOptions, Repository};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Patient {
//!     #[serde(rename = "_id")]
//!     id: ObjectId,
//!     name: String,
//!     age: u32,
//!     #[serde(flatten)]
//!     timestamps: Timestamps,
//! }
//!
//! impl Patient {
//!     const AGE: Field<Patient, u32> = Field::new("age");
//!
//!     fn new(name: &str, age: u32) -> Self {
//!         Self {
//!             id: ObjectId::generate(),
//!             name: name.to_string(),
//!             age,
//!             timestamps: Timestamps::now(),
//!         }
//!     }
//! }
//!
//! impl Entity for Patient {
//!     type Key = ObjectId;
//!     fn id(&self) -> &ObjectId {
//!         &self.id
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let config = DocumentStoreConfig::new("clinic");
//! let context = DbContext::from_config(
//!     Arc::new(MemoryClient::from_config(&config)),
//!     &config,
//!     Arc::new(TypeNameProvider::new().with_style(NamingStyle::SnakeCase).pluralized()),
//! )?;
//! let repo = Repository::new(Arc::new(context));
//! repo.initialize(["patients"]).await?;
//!
//! let smith = Patient::new("Smith", 64);
//! repo.add(&smith).await?;
//! repo.update_one_field(&smith, Patient::AGE, &65).await?;
//!
//! let seniors: Vec<Patient> = repo
//!     .list(ListOptions::new().filter(Patient::AGE.gte(&65)))
//!     .await?;
//! assert_eq!(seniors.len(), 1);
//! assert_eq!(repo.count::<Patient>(Some(field("name").eq("Jones"))).await?, 0);
//! # Ok::<(), helios_docstore::StorageError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod collection;
pub mod config;
pub mod context;
pub mod core;
pub mod entity;
pub mod error;
pub mod logging;
pub mod naming;
pub mod query;
pub mod query_source;
pub mod repository;
pub mod session;

// Re-export commonly used types at crate root
pub use collection::CollectionHandle;
pub use config::DocumentStoreConfig;
pub use context::DbContext;
pub use error::{StorageError, StorageResult};
pub use query::{Field, Filter, Projection, Sort, SortOrder, UpdateSpec};
pub use query_source::QuerySource;
pub use repository::{DataRepository, FindOneOptions, ListOptions, Repository, WriteOptions};
pub use session::Session;

// Re-export core traits
pub use core::{
    BackendCapability, BackendKind, DeleteOutcome, Document, DocumentClient, DocumentCollection,
    DocumentDatabase, UpdateOutcome,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
