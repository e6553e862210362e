//! Typed field selectors.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use super::{ComparisonOp, Filter, UpdateSpec};
use crate::error::{StorageResult, ValidationError};

/// A typed path into the documents of entity `T`, holding values of type `V`.
///
/// Declaring fields as constants keeps field names in one place and makes the
/// compiler check the type of every value compared against or written to them.
///
/// # Examples
///
/// ```
/// use helios_docstore::query::Field;
///
/// struct Patient;
///
/// impl Patient {
///     const AGE: Field<Patient, u32> = Field::new("age");
/// }
///
/// let adults = Patient::AGE.gte(&18);
/// assert_eq!(Patient::AGE.path(), "age");
/// # let _ = adults;
/// ```
pub struct Field<T, V> {
    path: &'static str,
    _marker: PhantomData<fn(&T) -> V>,
}

impl<T, V> Field<T, V> {
    /// Creates a selector for `path` (a dotted document path).
    pub const fn new(path: &'static str) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Returns the document path.
    pub fn path(&self) -> &'static str {
        self.path
    }
}

impl<T, V: Serialize> Field<T, V> {
    fn compare(&self, op: ComparisonOp, value: &V) -> Filter {
        match serde_json::to_value(value) {
            Ok(value) => Filter::Compare {
                field: self.path.to_string(),
                op,
                value,
            },
            Err(e) => self.unrepresentable(e),
        }
    }

    fn unrepresentable(&self, err: serde_json::Error) -> Filter {
        Filter::Unrepresentable {
            field: self.path.to_string(),
            message: err.to_string(),
        }
    }

    /// The field equals `value`.
    pub fn eq(&self, value: &V) -> Filter {
        self.compare(ComparisonOp::Eq, value)
    }

    /// The field does not equal `value`.
    pub fn ne(&self, value: &V) -> Filter {
        self.compare(ComparisonOp::Ne, value)
    }

    /// The field is greater than `value`.
    pub fn gt(&self, value: &V) -> Filter {
        self.compare(ComparisonOp::Gt, value)
    }

    /// The field is greater than or equal to `value`.
    pub fn gte(&self, value: &V) -> Filter {
        self.compare(ComparisonOp::Gte, value)
    }

    /// The field is less than `value`.
    pub fn lt(&self, value: &V) -> Filter {
        self.compare(ComparisonOp::Lt, value)
    }

    /// The field is less than or equal to `value`.
    pub fn lte(&self, value: &V) -> Filter {
        self.compare(ComparisonOp::Lte, value)
    }

    /// The field equals one of `values`.
    pub fn is_in<'a>(&self, values: impl IntoIterator<Item = &'a V>) -> Filter
    where
        V: 'a,
    {
        let converted: Result<Vec<Value>, _> =
            values.into_iter().map(serde_json::to_value).collect();
        match converted {
            Ok(values) => Filter::In {
                field: self.path.to_string(),
                values,
            },
            Err(e) => self.unrepresentable(e),
        }
    }

    /// Returns an update setting this field to `value`.
    pub fn set(&self, value: &V) -> StorageResult<UpdateSpec> {
        let value = serde_json::to_value(value).map_err(|e| ValidationError::InvalidUpdate {
            message: format!("cannot serialize value for '{}': {}", self.path, e),
        })?;
        Ok(UpdateSpec::new().set(self.path, value))
    }
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.path).finish()
    }
}
