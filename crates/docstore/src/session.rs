//! Sessions and transactions.
//!
//! A [`Session`] is an opaque handle binding several operations to one causal
//! chain or transaction. The caller obtains it from
//! [`Repository::start_session`](crate::Repository::start_session), passes it
//! by `&mut` to every operation that should run inside it, and decides when to
//! commit or abort. The repository never stores a session.
//!
//! Because every session-scoped operation borrows the session mutably, one
//! session can never be used by two in-flight operations at the same time.
//!
//! # Example
//!
//! ```
//! use helios_docstore::backends::memory::MemoryClient;
//! use helios_docstore::core::DocumentClient;
//!
//! # tokio_test::block_on(async {
//! let client = MemoryClient::new();
//! let mut session = client.start_session().await.unwrap();
//!
//! session.start_transaction().await.unwrap();
//! assert!(session.in_transaction());
//! session.abort_transaction().await.unwrap();
//! assert!(!session.in_transaction());
//! # });
//! ```

use std::any::Any;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::core::BackendKind;
use crate::error::{SessionError, StorageResult};

/// Backend side of a [`Session`].
///
/// Each backend implements this for its own session type and recovers the
/// concrete type from a [`Session`] with [`Session::downcast_mut`].
#[async_trait]
pub trait SessionHandle: Send + Debug + 'static {
    /// Returns an identifier for diagnostics.
    fn id(&self) -> &str;

    /// Returns the backend that created the session.
    fn backend(&self) -> BackendKind;

    /// Returns `true` while a transaction is running.
    fn in_transaction(&self) -> bool;

    /// Starts a transaction.
    async fn start_transaction(&mut self) -> StorageResult<()>;

    /// Commits the running transaction.
    async fn commit_transaction(&mut self) -> StorageResult<()>;

    /// Aborts the running transaction, discarding its writes.
    async fn abort_transaction(&mut self) -> StorageResult<()>;

    /// Returns `self` as [`Any`] for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A caller-owned session.
#[derive(Debug)]
pub struct Session {
    inner: Box<dyn SessionHandle>,
}

impl Session {
    /// Wraps a backend session.
    pub fn new(handle: impl SessionHandle) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    /// Returns the session identifier.
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Returns the backend that created the session.
    pub fn backend(&self) -> BackendKind {
        self.inner.backend()
    }

    /// Returns `true` while a transaction is running.
    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    /// Starts a transaction. Fails if one is already running.
    pub async fn start_transaction(&mut self) -> StorageResult<()> {
        self.inner.start_transaction().await
    }

    /// Commits the running transaction.
    pub async fn commit_transaction(&mut self) -> StorageResult<()> {
        self.inner.commit_transaction().await
    }

    /// Aborts the running transaction.
    pub async fn abort_transaction(&mut self) -> StorageResult<()> {
        self.inner.abort_transaction().await
    }

    /// Returns the concrete backend session.
    ///
    /// Fails with [`SessionError::ForeignSession`] if the session was created
    /// by a different backend than the one asking.
    pub fn downcast_mut<S: SessionHandle>(
        &mut self,
        backend_name: &str,
    ) -> Result<&mut S, SessionError> {
        let session_id = self.inner.id().to_string();
        self.inner
            .as_any_mut()
            .downcast_mut::<S>()
            .ok_or_else(|| SessionError::ForeignSession {
                session_id,
                backend_name: backend_name.to_string(),
            })
    }
}
