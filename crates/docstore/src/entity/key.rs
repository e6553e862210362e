//! Identifier types accepted by the repository.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ObjectId;
use crate::error::{StorageResult, ValidationError};

/// An identifier type an entity can be keyed by.
///
/// Identifier comparison and generation are the same operations whichever
/// representation an entity picks, so the repository only ever talks to this
/// trait. The only place where the stored representation matters is
/// [`to_value`](EntityKey::to_value), which produces the value an `_id`
/// filter matches against.
///
/// Implemented for [`ObjectId`], [`uuid::Uuid`] and [`String`].
pub trait EntityKey:
    Clone + Eq + Hash + Debug + Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Returns a fresh, globally unique identifier.
    fn generate() -> Self;

    /// Converts the textual form of an identifier into this key type.
    fn parse_key(s: &str) -> Result<Self, ValidationError>;

    /// Returns the stored representation of this identifier.
    fn to_value(&self) -> StorageResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl EntityKey for ObjectId {
    fn generate() -> Self {
        ObjectId::new()
    }

    fn parse_key(s: &str) -> Result<Self, ValidationError> {
        ObjectId::parse_str(s).map_err(|e| ValidationError::InvalidId {
            id: s.to_string(),
            key_type: "ObjectId",
            message: e.to_string(),
        })
    }
}

impl EntityKey for uuid::Uuid {
    fn generate() -> Self {
        uuid::Uuid::new_v4()
    }

    fn parse_key(s: &str) -> Result<Self, ValidationError> {
        uuid::Uuid::parse_str(s).map_err(|e| ValidationError::InvalidId {
            id: s.to_string(),
            key_type: "Uuid",
            message: e.to_string(),
        })
    }
}

/// String keys are opaque: generated keys are object id hex strings, and any
/// non-empty string is accepted when parsing.
impl EntityKey for String {
    fn generate() -> Self {
        ObjectId::new().to_hex()
    }

    fn parse_key(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::InvalidId {
                id: String::new(),
                key_type: "String",
                message: "identifier is empty".to_string(),
            });
        }
        Ok(s.to_string())
    }
}
