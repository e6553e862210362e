//! In-memory backend.
//!
//! A complete implementation of the driver traits that keeps everything in
//! process memory. It is the default backend and what the test suite runs
//! against.
//!
//! # Features
//!
//! - Databases and ordered collections behind a `parking_lot::RwLock`
//! - Unique `_id` per collection, all-or-nothing batch inserts
//! - Full filter, projection, sort and update evaluation over dotted paths
//! - Sessions with atomic (snapshot/restore) transactions
//! - Optional command log
//!
//! Collections are created implicitly by the first insert, as in MongoDB.

mod client;
mod evaluator;
mod session;

pub use client::{MemoryClient, MemoryCollection, MemoryDatabase};
pub use session::MemorySession;
