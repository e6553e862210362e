//! MongoDB sessions.

use std::any::Any;

use async_trait::async_trait;
use mongodb::ClientSession;

use crate::core::BackendKind;
use crate::error::{SessionError, StorageResult};
use crate::session::SessionHandle;

/// A [`ClientSession`] behind a [`Session`](crate::Session).
#[derive(Debug)]
pub struct MongoSession {
    id: String,
    session: ClientSession,
    in_transaction: bool,
}

impl MongoSession {
    pub(crate) fn new(session: ClientSession) -> Self {
        Self {
            id: session.id().to_string(),
            session,
            in_transaction: false,
        }
    }

    /// Returns the driver session.
    pub fn client_session_mut(&mut self) -> &mut ClientSession {
        &mut self.session
    }
}

#[async_trait]
impl SessionHandle for MongoSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn backend(&self) -> BackendKind {
        BackendKind::MongoDB
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn start_transaction(&mut self) -> StorageResult<()> {
        if self.in_transaction {
            return Err(SessionError::TransactionInProgress {
                session_id: self.id.clone(),
            }
            .into());
        }
        self.session.start_transaction().await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Err(SessionError::NoTransaction {
                session_id: self.id.clone(),
            }
            .into());
        }
        self.session.commit_transaction().await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn abort_transaction(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Err(SessionError::NoTransaction {
                session_id: self.id.clone(),
            }
            .into());
        }
        // The server discards the transaction even if the abort command fails.
        self.in_transaction = false;
        self.session.abort_transaction().await?;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
