//! Conversions between JSON documents and BSON.
//!
//! Documents cross the boundary as MongoDB extended JSON: `{"$oid": ...}`
//! becomes a native object id on the way in and is rendered back in relaxed
//! form on the way out.

use mongodb::bson::{Bson, Document as BsonDocument};
use serde_json::Value;

use crate::core::Document;
use crate::error::{BackendError, StorageResult};
use crate::query::Filter;

fn serialization_error(message: impl Into<String>) -> crate::error::StorageError {
    BackendError::SerializationError {
        message: message.into(),
    }
    .into()
}

/// Converts a stored document to BSON.
pub(crate) fn to_bson(document: Document) -> StorageResult<BsonDocument> {
    BsonDocument::try_from(document).map_err(|e| serialization_error(e.to_string()))
}

/// Converts a JSON object (a rendered filter, projection, sort or update) to BSON.
pub(crate) fn value_to_bson(value: Value) -> StorageResult<BsonDocument> {
    match value {
        Value::Object(map) => to_bson(map),
        other => Err(serialization_error(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Renders and converts a filter.
pub(crate) fn filter_to_bson(filter: &Filter) -> StorageResult<BsonDocument> {
    value_to_bson(filter.to_document()?)
}

/// Converts a BSON document back to JSON.
pub(crate) fn from_bson(document: BsonDocument) -> StorageResult<Document> {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(serialization_error(format!(
            "expected a document, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectId;
    use crate::query::field;
    use serde_json::json;

    #[test]
    fn test_object_id_becomes_native() {
        let id = ObjectId::new();
        let doc = match json!({"_id": id, "name": "Smith"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let bson = to_bson(doc.clone()).unwrap();
        assert!(matches!(bson.get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(from_bson(bson).unwrap(), doc);
    }

    #[test]
    fn test_filter_conversion() {
        let bson = filter_to_bson(&field("age").gte(18)).unwrap();
        assert!(matches!(
            bson.get_document("age").unwrap().get("$gte"),
            Some(Bson::Int32(18)) | Some(Bson::Int64(18))
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(value_to_bson(json!([1, 2])).is_err());
    }
}
