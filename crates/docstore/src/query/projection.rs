//! Projections and sort orders for reads.

use serde_json::{Map, Value};

use super::paths_conflict;
use crate::entity::ID_FIELD;
use crate::error::ValidationError;

/// Restricts which fields a read materializes.
///
/// With [`Projection::Include`], `_id` is always returned. With
/// [`Projection::Exclude`], `_id` can be excluded like any other field.
/// Entities read through a projection need `#[serde(default)]` on the fields
/// the projection drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only these fields (plus `_id`).
    Include(Vec<String>),
    /// Every field except these.
    Exclude(Vec<String>),
}

impl Projection {
    /// Keeps only `fields` (plus `_id`).
    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Drops `fields`.
    pub fn exclude<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Returns the listed fields.
    pub fn fields(&self) -> &[String] {
        match self {
            Projection::Include(fields) | Projection::Exclude(fields) => fields,
        }
    }

    /// Checks that every listed path can be projected.
    ///
    /// Paths must be dotted field names: empty segments and array indexes
    /// (`tags.0`) are rejected, as are two paths where one contains the
    /// other.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = self.fields();
        for (i, field) in fields.iter().enumerate() {
            let invalid = |message: String| ValidationError::InvalidProjection {
                field: field.clone(),
                message,
            };
            if field.split('.').any(str::is_empty) {
                return Err(invalid("path has an empty segment".to_string()));
            }
            if let Some(segment) = field
                .split('.')
                .find(|s| s.bytes().all(|b| b.is_ascii_digit()))
            {
                return Err(invalid(format!(
                    "array index '{}' cannot be projected",
                    segment
                )));
            }
            if let Some(other) = fields[..i].iter().find(|other| paths_conflict(other, field)) {
                return Err(invalid(format!("path collides with '{}'", other)));
            }
        }
        Ok(())
    }

    /// Renders the projection as a MongoDB projection document.
    pub fn to_document(&self) -> Value {
        let mut map = Map::new();
        match self {
            Projection::Include(fields) => {
                for field in fields.iter().filter(|f| f.as_str() != ID_FIELD) {
                    map.insert(field.clone(), Value::from(1));
                }
                if map.is_empty() {
                    map.insert(ID_FIELD.to_string(), Value::from(1));
                }
            }
            Projection::Exclude(fields) => {
                for field in fields {
                    map.insert(field.clone(), Value::from(0));
                }
            }
        }
        Value::Object(map)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortOrder {
    /// Returns `1` or `-1`.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// An ordered list of sort keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sort {
    keys: Vec<(String, SortOrder)>,
}

impl Sort {
    /// Sorts by `field` ascending.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self::default().then_ascending(field)
    }

    /// Sorts by `field` descending.
    pub fn descending(field: impl Into<String>) -> Self {
        Self::default().then_descending(field)
    }

    /// Adds an ascending tie-breaker.
    pub fn then_ascending(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), SortOrder::Ascending));
        self
    }

    /// Adds a descending tie-breaker.
    pub fn then_descending(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), SortOrder::Descending));
        self
    }

    /// Returns the sort keys in priority order.
    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    /// Returns `true` if no keys were added.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Renders the sort as a MongoDB sort document (key order preserved).
    pub fn to_document(&self) -> Value {
        let mut map = Map::new();
        for (field, order) in &self.keys {
            map.insert(field.clone(), Value::from(order.as_i32()));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_include_projection_document() {
        let p = Projection::include(["name", "age"]);
        assert_eq!(p.to_document(), json!({"name": 1, "age": 1}));
        assert_eq!(Projection::include(["_id"]).to_document(), json!({"_id": 1}));
    }

    #[test]
    fn test_exclude_projection_document() {
        let p = Projection::exclude(["secret", "_id"]);
        assert_eq!(p.to_document(), json!({"secret": 0, "_id": 0}));
        assert_eq!(p.fields().len(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(Projection::include(["name", "address.city"]).validate().is_ok());
        assert!(Projection::exclude(["_id"]).validate().is_ok());

        for bad in [
            Projection::include(["tags.0"]),
            Projection::exclude(["visits.1.ward"]),
            Projection::include(["a..b"]),
            Projection::include([""]),
            Projection::include(["address", "address.city"]),
        ] {
            assert!(
                matches!(bad.validate(), Err(ValidationError::InvalidProjection { .. })),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_sort_preserves_key_order() {
        let sort = Sort::descending("score").then_ascending("name");
        let rendered = serde_json::to_string(&sort.to_document()).unwrap();
        assert_eq!(rendered, r#"{"score":-1,"name":1}"#);
    }
}
