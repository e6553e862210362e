//! Core driver abstractions.
//!
//! The context and repository talk to a store only through three traits:
//!
//! ```text
//! DocumentClient          one per process, starts sessions
//!     └── DocumentDatabase    lists and creates collections
//!             └── DocumentCollection    find / insert / replace / update / delete / count
//! ```
//!
//! Not every backend supports every feature. Use
//! [`DocumentClient::supports`] to check at runtime:
//!
//! ```
//! use helios_docstore::backends::memory::MemoryClient;
//! use helios_docstore::core::{BackendCapability, DocumentClient};
//!
//! let client = MemoryClient::new();
//! assert!(client.supports(BackendCapability::Transactions));
//! ```

pub mod backend;
pub mod store;

pub use backend::{BackendCapability, BackendKind};
pub use store::{
    DeleteOutcome, Document, DocumentClient, DocumentCollection, DocumentDatabase, FindQuery,
    UpdateOutcome,
};
