//! Memory backend sessions.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::client::{CollectionKey, MemoryStore};
use crate::core::{BackendKind, Document};
use crate::error::{SessionError, StorageResult};
use crate::session::SessionHandle;

/// A session on a [`MemoryClient`](super::MemoryClient).
///
/// Transactions are atomic but not isolated: the first write to a collection
/// inside a transaction snapshots that collection, and an abort restores every
/// snapshot. Other callers see uncommitted writes.
#[derive(Debug)]
pub struct MemorySession {
    id: String,
    store: Arc<MemoryStore>,
    transaction: Option<Snapshots>,
}

/// Pre-transaction state of each touched collection (`None` if it did not exist).
type Snapshots = HashMap<CollectionKey, Option<Vec<Document>>>;

impl MemorySession {
    pub(crate) fn new(id: String, store: Arc<MemoryStore>) -> Self {
        Self {
            id,
            store,
            transaction: None,
        }
    }

    pub(crate) fn belongs_to(&self, store: &Arc<MemoryStore>) -> bool {
        Arc::ptr_eq(&self.store, store)
    }

    /// Records the state of a collection before its first write in the
    /// running transaction. No-op outside a transaction.
    pub(crate) fn record(&mut self, key: &CollectionKey, current: Option<&Vec<Document>>) {
        if let Some(snapshots) = self.transaction.as_mut() {
            snapshots
                .entry(key.clone())
                .or_insert_with(|| current.cloned());
        }
    }
}

#[async_trait]
impl SessionHandle for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    async fn start_transaction(&mut self) -> StorageResult<()> {
        if self.transaction.is_some() {
            return Err(SessionError::TransactionInProgress {
                session_id: self.id.clone(),
            }
            .into());
        }
        self.transaction = Some(HashMap::new());
        tracing::debug!(session = %self.id, "memory transaction started");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> StorageResult<()> {
        let snapshots = self
            .transaction
            .take()
            .ok_or_else(|| SessionError::NoTransaction {
                session_id: self.id.clone(),
            })?;
        tracing::debug!(
            session = %self.id,
            collections = snapshots.len(),
            "memory transaction committed"
        );
        Ok(())
    }

    async fn abort_transaction(&mut self) -> StorageResult<()> {
        let snapshots = self
            .transaction
            .take()
            .ok_or_else(|| SessionError::NoTransaction {
                session_id: self.id.clone(),
            })?;
        let restored = snapshots.len();
        self.store.restore(snapshots);
        tracing::debug!(
            session = %self.id,
            collections = restored,
            "memory transaction aborted"
        );
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
