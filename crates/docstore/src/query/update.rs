//! Partial update specifications.
//!
//! An [`UpdateSpec`] is a composable list of field-level mutations applied to
//! the documents a filter selects. It never replaces a whole document; use
//! `Repository::update` for that.

use serde_json::{Map, Value};

use super::paths_conflict;
use crate::entity::ID_FIELD;
use crate::error::{StorageResult, ValidationError};

/// A single field mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Sets the field to a value, creating it if needed.
    Set {
        /// Dotted field path.
        field: String,
        /// New value.
        value: Value,
    },
    /// Removes the field.
    Unset {
        /// Dotted field path.
        field: String,
    },
    /// Adds a number to the field (a missing field counts as zero).
    Inc {
        /// Dotted field path.
        field: String,
        /// Amount to add.
        by: Value,
    },
    /// Appends a value to an array field.
    Push {
        /// Dotted path of the array.
        field: String,
        /// Element to append.
        value: Value,
    },
    /// Removes every occurrence of a value from an array field.
    Pull {
        /// Dotted path of the array.
        field: String,
        /// Element to remove.
        value: Value,
    },
    /// Appends a value to an array field unless already present.
    AddToSet {
        /// Dotted path of the array.
        field: String,
        /// Element to add.
        value: Value,
    },
}

impl UpdateOp {
    /// Returns the targeted field path.
    pub fn field(&self) -> &str {
        match self {
            UpdateOp::Set { field, .. }
            | UpdateOp::Unset { field }
            | UpdateOp::Inc { field, .. }
            | UpdateOp::Push { field, .. }
            | UpdateOp::Pull { field, .. }
            | UpdateOp::AddToSet { field, .. } => field,
        }
    }

    /// Returns the update operator name (`$set`, `$inc`, ...).
    pub fn operator(&self) -> &'static str {
        match self {
            UpdateOp::Set { .. } => "$set",
            UpdateOp::Unset { .. } => "$unset",
            UpdateOp::Inc { .. } => "$inc",
            UpdateOp::Push { .. } => "$push",
            UpdateOp::Pull { .. } => "$pull",
            UpdateOp::AddToSet { .. } => "$addToSet",
        }
    }

    fn argument(&self) -> Value {
        match self {
            UpdateOp::Set { value, .. }
            | UpdateOp::Push { value, .. }
            | UpdateOp::Pull { value, .. }
            | UpdateOp::AddToSet { value, .. } => value.clone(),
            UpdateOp::Unset { .. } => Value::String(String::new()),
            UpdateOp::Inc { by, .. } => by.clone(),
        }
    }
}

/// A set of field-level mutations.
///
/// # Examples
///
/// ```
/// use helios_docstore::query::UpdateSpec;
///
/// let update = UpdateSpec::new()
///     .set("status", "active")
///     .inc("logins", 1)
///     .unset("lockedUntil");
/// assert_eq!(update.ops().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateSpec {
    ops: Vec<UpdateOp>,
}

impl UpdateSpec {
    /// Creates an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value`.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Removes `field`.
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset {
            field: field.into(),
        });
        self
    }

    /// Increments `field` by `by`.
    pub fn inc(mut self, field: impl Into<String>, by: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Inc {
            field: field.into(),
            by: by.into(),
        });
        self
    }

    /// Appends `value` to the array `field`.
    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Removes `value` from the array `field`.
    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Appends `value` to the array `field` if missing.
    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::AddToSet {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Appends all mutations of `other`.
    pub fn combine(mut self, other: UpdateSpec) -> Self {
        self.ops.extend(other.ops);
        self
    }

    /// Returns the mutations in order.
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Returns `true` if there are no mutations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks that the specification can be applied.
    ///
    /// Rejects empty specifications, any mutation of `_id`, and non-numeric
    /// increments. Two mutations conflict when they target the same path or
    /// when one path is a parent of the other (`address` and
    /// `address.city`).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ops.is_empty() {
            return Err(ValidationError::InvalidUpdate {
                message: "update specification is empty".to_string(),
            });
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let field = op.field();
            if field.is_empty() {
                return Err(ValidationError::InvalidUpdate {
                    message: "field path is empty".to_string(),
                });
            }
            if field == ID_FIELD || field.starts_with("_id.") {
                return Err(ValidationError::ImmutableField {
                    field: field.to_string(),
                });
            }
            if let UpdateOp::Inc { by, .. } = op {
                if !by.is_number() {
                    return Err(ValidationError::InvalidUpdate {
                        message: format!("increment of '{}' is not a number: {}", field, by),
                    });
                }
            }
            if let Some(other) = seen.iter().find(|other| paths_conflict(other, field)) {
                let message = if *other == field {
                    format!("field '{}' is updated more than once", field)
                } else {
                    format!("updating '{}' conflicts with updating '{}'", field, other)
                };
                return Err(ValidationError::InvalidUpdate { message });
            }
            seen.push(field);
        }
        Ok(())
    }

    /// Renders the specification as a MongoDB update document.
    pub fn to_document(&self) -> StorageResult<Value> {
        self.validate()?;

        let mut root = Map::new();
        for op in &self.ops {
            let entry = root
                .entry(op.operator().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(fields) = entry {
                fields.insert(op.field().to_string(), op.argument());
            }
        }
        Ok(Value::Object(root))
    }
}
