//! MongoDB backend.
//!
//! Implements the driver traits on top of the official `mongodb` crate.
//! Filters, projections, sort orders and updates are rendered with their
//! `to_document` methods; documents are exchanged as extended JSON, so object
//! ids round-trip as native BSON object ids.
//!
//! When [`DocumentStoreConfig::log_commands`](crate::config::DocumentStoreConfig::log_commands)
//! is set, a command event handler forwards every started command to the
//! command log.

mod client;
mod convert;
mod session;

pub use client::{MongoClient, MongoCollection, MongoDatabase};
pub use session::MongoSession;
