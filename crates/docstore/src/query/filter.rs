//! Filter predicates.
//!
//! A [`Filter`] is a side-effect-free predicate over documents. Filters are
//! plain values: they are built with [`field`] or [`Field`](super::Field),
//! combined with [`Filter::and`], [`Filter::or`] and [`Filter::not`], and
//! handed to a backend, which either evaluates them directly (memory) or
//! translates them with [`Filter::to_document`] (MongoDB).
//!
//! An absent filter (`None`) and [`Filter::All`] both match every document.

use regex::RegexBuilder;
use serde_json::{Map, Value, json};

use crate::entity::ID_FIELD;
use crate::error::{StorageResult, ValidationError};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl ComparisonOp {
    /// Returns the query operator name (`$eq`, `$gt`, ...).
    pub fn operator(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "$eq",
            ComparisonOp::Ne => "$ne",
            ComparisonOp::Gt => "$gt",
            ComparisonOp::Gte => "$gte",
            ComparisonOp::Lt => "$lt",
            ComparisonOp::Lte => "$lte",
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.operator())
    }
}

/// A predicate over documents.
///
/// Field names are dotted paths (`address.city`). When a path resolves to an
/// array, a comparison matches if any element matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,

    /// Compares a field against a value.
    Compare {
        /// Dotted field path.
        field: String,
        /// Comparison operator.
        op: ComparisonOp,
        /// Value compared against.
        value: Value,
    },

    /// The field equals one of the values.
    In {
        /// Dotted field path.
        field: String,
        /// Candidate values.
        values: Vec<Value>,
    },

    /// The field equals none of the values.
    NotIn {
        /// Dotted field path.
        field: String,
        /// Candidate values.
        values: Vec<Value>,
    },

    /// The field is present (or absent).
    Exists {
        /// Dotted field path.
        field: String,
        /// `true` to require presence, `false` to require absence.
        exists: bool,
    },

    /// The field is a string matching a regular expression.
    Regex {
        /// Dotted field path.
        field: String,
        /// Regular expression source.
        pattern: String,
        /// Match without regard to case.
        case_insensitive: bool,
    },

    /// Every inner filter matches. An empty list matches everything.
    And(Vec<Filter>),

    /// At least one inner filter matches. An empty list matches nothing.
    Or(Vec<Filter>),

    /// The inner filter does not match.
    Not(Box<Filter>),

    /// A typed value that could not be converted to a document value.
    ///
    /// Building filters never fails; this variant carries the conversion
    /// error until the filter is executed, where it becomes a
    /// [`ValidationError::InvalidFilter`].
    Unrepresentable {
        /// Dotted field path.
        field: String,
        /// Details from the underlying check.
        message: String,
    },
}

impl Filter {
    /// Returns a filter matching every document.
    pub fn all() -> Self {
        Filter::All
    }

    /// Returns a filter matching documents whose `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field: field.into(),
            op: ComparisonOp::Eq,
            value: value.into(),
        }
    }

    /// Returns a filter matching the document whose identifier is `value`.
    ///
    /// `value` must already be in its stored representation
    /// (see [`EntityKey::to_value`](crate::entity::EntityKey::to_value)).
    pub fn id_eq(value: Value) -> Self {
        Filter::eq(ID_FIELD, value)
    }

    /// Returns a filter matching when every filter matches.
    pub fn all_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        filters.into_iter().fold(Filter::All, Filter::and)
    }

    /// Returns a filter matching when any filter matches.
    pub fn any_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<Filter> = filters.into_iter().collect();
        if filters.iter().any(Filter::is_all) {
            return Filter::All;
        }
        Filter::Or(filters)
    }

    /// Conjunction. `All` is the identity and nested conjunctions are flattened.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Disjunction. Nested disjunctions are flattened.
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, _) | (_, Filter::All) => Filter::All,
            (Filter::Or(mut a), Filter::Or(b)) => {
                a.extend(b);
                Filter::Or(a)
            }
            (Filter::Or(mut a), f) => {
                a.push(f);
                Filter::Or(a)
            }
            (f, Filter::Or(mut b)) => {
                b.insert(0, f);
                Filter::Or(b)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            Filter::Not(inner) => *inner,
            f => Filter::Not(Box::new(f)),
        }
    }

    /// Returns `true` if this filter trivially matches everything.
    pub fn is_all(&self) -> bool {
        match self {
            Filter::All => true,
            Filter::And(filters) => filters.iter().all(Filter::is_all),
            _ => false,
        }
    }

    /// Checks that the filter can be executed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Filter::Unrepresentable { field, message } => Err(ValidationError::InvalidFilter {
                field: field.clone(),
                message: message.clone(),
            }),
            Filter::Regex {
                field,
                pattern,
                case_insensitive,
            } => RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
                .map(|_| ())
                .map_err(|e| ValidationError::InvalidFilter {
                    field: field.clone(),
                    message: e.to_string(),
                }),
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().try_for_each(Filter::validate)
            }
            Filter::Not(inner) => inner.validate(),
            _ => Ok(()),
        }
    }

    /// Renders the filter as a MongoDB query document.
    pub fn to_document(&self) -> StorageResult<Value> {
        self.validate()?;
        Ok(self.render())
    }

    fn render(&self) -> Value {
        match self {
            Filter::All => json!({}),
            Filter::Compare { field, op, value } => {
                single(field, single(op.operator(), value.clone()))
            }
            Filter::In { field, values } => single(field, json!({ "$in": values })),
            Filter::NotIn { field, values } => single(field, json!({ "$nin": values })),
            Filter::Exists { field, exists } => single(field, json!({ "$exists": exists })),
            Filter::Regex {
                field,
                pattern,
                case_insensitive,
            } => {
                let options = if *case_insensitive { "i" } else { "" };
                single(field, json!({ "$regex": pattern, "$options": options }))
            }
            Filter::And(filters) if filters.is_empty() => json!({}),
            Filter::And(filters) => {
                json!({ "$and": filters.iter().map(Filter::render).collect::<Vec<_>>() })
            }
            // `$or` rejects an empty array; `$nor` over match-all matches nothing.
            Filter::Or(filters) if filters.is_empty() => json!({ "$nor": [{}] }),
            Filter::Or(filters) => {
                json!({ "$or": filters.iter().map(Filter::render).collect::<Vec<_>>() })
            }
            Filter::Not(inner) => json!({ "$nor": [inner.render()] }),
            Filter::Unrepresentable { .. } => json!({}),
        }
    }
}

fn single(field: &str, condition: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), condition);
    Value::Object(map)
}

/// Starts a fluent filter on `name`.
///
/// # Examples
///
/// ```
/// use helios_docstore::query::{field, Filter};
///
/// let adults = field("age").gte(18).and(field("active").eq(true));
/// assert!(matches!(adults, Filter::And(ref f) if f.len() == 2));
/// ```
pub fn field(name: impl Into<String>) -> FieldFilter {
    FieldFilter { field: name.into() }
}

/// Fluent builder for filters on one field.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    field: String,
}

impl FieldFilter {
    fn compare(self, op: ComparisonOp, value: Value) -> Filter {
        Filter::Compare {
            field: self.field,
            op,
            value,
        }
    }

    /// The field equals `value`.
    pub fn eq(self, value: impl Into<Value>) -> Filter {
        self.compare(ComparisonOp::Eq, value.into())
    }

    /// The field does not equal `value`.
    pub fn ne(self, value: impl Into<Value>) -> Filter {
        self.compare(ComparisonOp::Ne, value.into())
    }

    /// The field is greater than `value`.
    pub fn gt(self, value: impl Into<Value>) -> Filter {
        self.compare(ComparisonOp::Gt, value.into())
    }

    /// The field is greater than or equal to `value`.
    pub fn gte(self, value: impl Into<Value>) -> Filter {
        self.compare(ComparisonOp::Gte, value.into())
    }

    /// The field is less than `value`.
    pub fn lt(self, value: impl Into<Value>) -> Filter {
        self.compare(ComparisonOp::Lt, value.into())
    }

    /// The field is less than or equal to `value`.
    pub fn lte(self, value: impl Into<Value>) -> Filter {
        self.compare(ComparisonOp::Lte, value.into())
    }

    /// The field lies within `[low, high]`.
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Filter {
        let name = self.field;
        field(name.clone()).gte(low).and(field(name).lte(high))
    }

    /// The field equals one of `values`.
    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        Filter::In {
            field: self.field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The field equals none of `values`.
    pub fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        Filter::NotIn {
            field: self.field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The field is present.
    pub fn exists(self) -> Filter {
        Filter::Exists {
            field: self.field,
            exists: true,
        }
    }

    /// The field is absent.
    pub fn missing(self) -> Filter {
        Filter::Exists {
            field: self.field,
            exists: false,
        }
    }

    /// The field is a string matching `pattern`.
    pub fn regex(self, pattern: impl Into<String>) -> Filter {
        Filter::Regex {
            field: self.field,
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    /// The field is a string matching `pattern`, ignoring case.
    pub fn regex_ci(self, pattern: impl Into<String>) -> Filter {
        Filter::Regex {
            field: self.field,
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }
}
