//! Document store backends.
//!
//! Each backend implements the [`core`](crate::core) driver traits and is
//! gated behind a feature flag.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | `memory` | In-process store, great for tests and development |
//! | MongoDB | `mongodb` | The official MongoDB driver |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "mongodb")]
//! use helios_docstore::backends::mongodb::MongoClient;
//! use helios_docstore::config::DocumentStoreConfig;
//!
//! # #[cfg(feature = "mongodb")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DocumentStoreConfig::from_connection_string("mongodb://localhost:27017/clinic")?;
//! let client = MongoClient::connect(&config).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;
