//! Entity identity model.
//!
//! Every persisted record implements [`Entity`]: it owns exactly one
//! identifier of an [`EntityKey`] type, serialized under the `_id` field.
//! Identifiers are generated when the entity is constructed and are never
//! reassigned by the repository; changing identity means deleting and
//! re-adding.
//!
//! Entities that want creation/update times embed [`Timestamps`] and
//! implement [`Timestamped`]. Refreshing `updated_at` is the caller's job.
//!
//! # Example
//!
//! ```
//! use helios_docstore::entity::{Entity, EntityKey, ObjectId, Timestamps};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Patient {
//!     #[serde(rename = "_id")]
//!     id: ObjectId,
//!     name: String,
//!     #[serde(flatten)]
//!     timestamps: Timestamps,
//! }
//!
//! impl Patient {
//!     fn new(name: &str) -> Self {
//!         Self {
//!             id: ObjectId::generate(),
//!             name: name.to_string(),
//!             timestamps: Timestamps::now(),
//!         }
//!     }
//! }
//!
//! impl Entity for Patient {
//!     type Key = ObjectId;
//!
//!     fn id(&self) -> &ObjectId {
//!         &self.id
//!     }
//! }
//!
//! let patient = Patient::new("Smith");
//! assert_eq!(patient.timestamps.created_at, patient.timestamps.updated_at);
//! ```

mod key;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use bson::oid::ObjectId;
pub use key::EntityKey;

/// Name of the document field holding the identifier.
pub const ID_FIELD: &str = "_id";

/// A persisted record with a unique identifier.
///
/// Implementations must serialize the identifier under [`ID_FIELD`]
/// (`#[serde(rename = "_id")]`).
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The identifier type.
    type Key: EntityKey;

    /// Returns the identifier.
    fn id(&self) -> &Self::Key;
}

/// Creation and last-update times.
///
/// Both fields are set to the same instant on construction and serialize as
/// `createdAt` / `updatedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// When the entity was constructed.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// When the entity was last modified by its owner.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    /// Returns timestamps set to the current time.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets `updated_at` to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::now()
    }
}

/// An entity carrying [`Timestamps`].
pub trait Timestamped {
    /// Returns the timestamps.
    fn timestamps(&self) -> &Timestamps;

    /// Returns the timestamps mutably.
    fn timestamps_mut(&mut self) -> &mut Timestamps;

    /// Returns the creation time.
    fn created_at(&self) -> DateTime<Utc> {
        self.timestamps().created_at
    }

    /// Returns the last update time.
    fn updated_at(&self) -> DateTime<Utc> {
        self.timestamps().updated_at
    }

    /// Marks the entity as modified now.
    fn touch(&mut self) {
        self.timestamps_mut().touch();
    }
}
