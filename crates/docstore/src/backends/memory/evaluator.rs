//! Filter, projection, sort and update evaluation over JSON documents.
//!
//! Paths are dotted (`address.city`). A numeric segment indexes into an
//! array; any other segment applied to an array descends into every element,
//! so `tags.name` over `[{"name": "a"}, {"name": "b"}]` yields both names.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Number, Value};

use crate::core::Document;
use crate::entity::ID_FIELD;
use crate::error::{BackendError, StorageResult, ValidationError};
use crate::query::{ComparisonOp, Filter, Projection, Sort, SortOrder, UpdateOp, UpdateSpec};

/// Returns `true` if `doc` matches `filter`.
pub(crate) fn matches(doc: &Document, filter: &Filter) -> StorageResult<bool> {
    Ok(match filter {
        Filter::All => true,
        Filter::Compare { field, op, value } => {
            let values = lookup(doc, field);
            match op {
                ComparisonOp::Eq => equals_any(&values, value),
                ComparisonOp::Ne => !equals_any(&values, value),
                _ => candidates(&values).into_iter().any(|candidate| {
                    compare_same_type(candidate, value).is_some_and(|ord| match op {
                        ComparisonOp::Gt => ord == Ordering::Greater,
                        ComparisonOp::Gte => ord != Ordering::Less,
                        ComparisonOp::Lt => ord == Ordering::Less,
                        ComparisonOp::Lte => ord != Ordering::Greater,
                        ComparisonOp::Eq | ComparisonOp::Ne => false,
                    })
                }),
            }
        }
        Filter::In { field, values } => {
            let found = lookup(doc, field);
            values.iter().any(|v| equals_any(&found, v))
        }
        Filter::NotIn { field, values } => {
            let found = lookup(doc, field);
            !values.iter().any(|v| equals_any(&found, v))
        }
        Filter::Exists { field, exists } => !lookup(doc, field).is_empty() == *exists,
        Filter::Regex {
            field,
            pattern,
            case_insensitive,
        } => {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
                .map_err(|e| ValidationError::InvalidFilter {
                    field: field.clone(),
                    message: e.to_string(),
                })?;
            let values = lookup(doc, field);
            candidates(&values)
                .into_iter()
                .any(|v| v.as_str().is_some_and(|s| regex.is_match(s)))
        }
        Filter::And(filters) => {
            for f in filters {
                if !matches(doc, f)? {
                    return Ok(false);
                }
            }
            true
        }
        Filter::Or(filters) => {
            for f in filters {
                if matches(doc, f)? {
                    return Ok(true);
                }
            }
            false
        }
        Filter::Not(inner) => !matches(doc, inner)?,
        Filter::Unrepresentable { field, message } => {
            return Err(ValidationError::InvalidFilter {
                field: field.clone(),
                message: message.clone(),
            }
            .into());
        }
    })
}

/// Applies `projection` to a copy of `doc`.
///
/// The projection must already have passed [`Projection::validate`].
pub(crate) fn project(doc: &Document, projection: &Projection) -> StorageResult<Document> {
    Ok(match projection {
        Projection::Include(fields) => {
            let mut out = Map::new();
            if let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD.to_string(), id.clone());
            }
            for field in fields {
                if let Some(value) = get_path(doc, field) {
                    set_path(&mut out, field, value.clone())?;
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for field in fields {
                remove_path(&mut out, field);
            }
            out
        }
    })
}

/// Sorts `docs` in place. Ties keep their current order.
pub(crate) fn sort(docs: &mut [Document], sort: &Sort) {
    docs.sort_by(|a, b| {
        for (field, order) in sort.keys() {
            let ord = total_order(get_path(a, field), get_path(b, field));
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Applies `update` to `doc`. Returns `true` if the document changed.
pub(crate) fn apply_update(doc: &mut Document, update: &UpdateSpec) -> StorageResult<bool> {
    update.validate()?;
    let before = doc.clone();
    for op in update.ops() {
        apply_op(doc, op)?;
    }
    Ok(*doc != before)
}

/// Returns `true` if two values are equal, treating `1` and `1.0` as equal.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

fn apply_op(doc: &mut Document, op: &UpdateOp) -> StorageResult<()> {
    match op {
        UpdateOp::Set { field, value } => set_path(doc, field, value.clone()),
        UpdateOp::Unset { field } => {
            remove_path(doc, field);
            Ok(())
        }
        UpdateOp::Inc { field, by } => {
            let next = match get_path(doc, field) {
                None => by.clone(),
                Some(Value::Number(current)) => add_numbers(current, by, field)?,
                Some(other) => {
                    return Err(update_error(format!(
                        "cannot increment non-numeric field '{}' ({})",
                        field, other
                    )));
                }
            };
            set_path(doc, field, next)
        }
        UpdateOp::Push { field, value } => {
            with_array(doc, field, |items| items.push(value.clone()))
        }
        UpdateOp::AddToSet { field, value } => with_array(doc, field, |items| {
            if !items.iter().any(|item| values_equal(item, value)) {
                items.push(value.clone());
            }
        }),
        UpdateOp::Pull { field, value } => match get_path_mut(doc, field) {
            None => Ok(()),
            Some(Value::Array(items)) => {
                items.retain(|item| !values_equal(item, value));
                Ok(())
            }
            Some(_) => Err(update_error(format!(
                "cannot pull from non-array field '{}'",
                field
            ))),
        },
    }
}

fn with_array(
    doc: &mut Document,
    field: &str,
    f: impl FnOnce(&mut Vec<Value>),
) -> StorageResult<()> {
    if get_path(doc, field).is_none() {
        set_path(doc, field, Value::Array(Vec::new()))?;
    }
    match get_path_mut(doc, field) {
        Some(Value::Array(items)) => {
            f(items);
            Ok(())
        }
        _ => Err(update_error(format!(
            "field '{}' is not an array",
            field
        ))),
    }
}

fn add_numbers(current: &Number, by: &Value, field: &str) -> StorageResult<Value> {
    let by = match by {
        Value::Number(n) => n,
        other => {
            return Err(update_error(format!(
                "increment of '{}' is not a number: {}",
                field, other
            )));
        }
    };
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Value::from(sum));
        }
    }
    let sum = current.as_f64().unwrap_or_default() + by.as_f64().unwrap_or_default();
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| update_error(format!("increment of '{}' is not finite", field)))
}

fn update_error(message: String) -> crate::error::StorageError {
    BackendError::QueryError { message }.into()
}

/// Collects the values a dotted path resolves to.
fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*first) {
            descend(value, rest, &mut out);
        }
    }
    out
}

fn descend<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*segment) {
                descend(next, rest, out);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = items.get(index) {
                    descend(next, rest, out);
                }
            }
            Err(_) => {
                for item in items {
                    descend(item, segments, out);
                }
            }
        },
        _ => {}
    }
}

/// Expands arrays into their elements, keeping the array itself too.
fn candidates<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn equals_any(values: &[&Value], target: &Value) -> bool {
    // A missing field compares equal to null.
    if target.is_null() && values.is_empty() {
        return true;
    }
    candidates(values)
        .into_iter()
        .any(|candidate| values_equal(candidate, target))
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Orders two values of the same kind. Mixed kinds are incomparable.
fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        // Extended JSON scalars such as {"$oid": "..."} or {"$date": "..."}.
        (Value::Object(x), Value::Object(y)) if x.len() == 1 && y.len() == 1 => {
            let (kx, vx) = x.iter().next()?;
            let (ky, vy) = y.iter().next()?;
            if kx == ky && kx.starts_with('$') {
                compare_same_type(vx, vy)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn total_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn get_path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let mut current = doc.get_mut(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn set_path(doc: &mut Document, path: &str, value: Value) -> StorageResult<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut current = doc;
    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match next {
            Value::Object(map) => map,
            other => {
                return Err(update_error(format!(
                    "cannot create field '{}' inside {} at '{}'",
                    last, other, path
                )));
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.rsplit_once('.') {
        None => {
            doc.shift_remove(path);
        }
        Some((parent, last)) => {
            if let Some(Value::Object(map)) = get_path_mut(doc, parent) {
                map.shift_remove(last);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::field;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn patient() -> Document {
        doc(json!({
            "_id": "p1",
            "name": "Smith",
            "age": 42,
            "tags": ["vip", "new"],
            "address": {"city": "Oslo", "zip": "0150"},
            "visits": [{"ward": "A"}, {"ward": "B"}]
        }))
    }

    #[test]
    fn test_comparisons() {
        let d = patient();
        assert!(matches(&d, &field("age").eq(42)).unwrap());
        assert!(matches(&d, &field("age").eq(42.0)).unwrap());
        assert!(matches(&d, &field("age").gt(40)).unwrap());
        assert!(!matches(&d, &field("age").lt(40)).unwrap());
        assert!(matches(&d, &field("age").between(40, 42)).unwrap());
        assert!(!matches(&d, &field("name").gt(1)).unwrap());
        assert!(matches(&d, &field("name").ne("Jones")).unwrap());
    }

    #[test]
    fn test_nested_and_array_paths() {
        let d = patient();
        assert!(matches(&d, &field("address.city").eq("Oslo")).unwrap());
        assert!(matches(&d, &field("tags").eq("vip")).unwrap());
        assert!(matches(&d, &field("tags").eq(json!(["vip", "new"]))).unwrap());
        assert!(matches(&d, &field("visits.ward").eq("B")).unwrap());
        assert!(matches(&d, &field("visits.0.ward").eq("A")).unwrap());
        assert!(!matches(&d, &field("visits.1.ward").eq("A")).unwrap());
    }

    #[test]
    fn test_membership_and_existence() {
        let d = patient();
        assert!(matches(&d, &field("name").is_in(["Smith", "Jones"])).unwrap());
        assert!(matches(&d, &field("name").not_in(["Jones"])).unwrap());
        assert!(matches(&d, &field("address.zip").exists()).unwrap());
        assert!(matches(&d, &field("phone").missing()).unwrap());
        assert!(matches(&d, &field("phone").eq(Value::Null)).unwrap());
    }

    #[test]
    fn test_logical_and_regex() {
        let d = patient();
        let f = field("name")
            .regex_ci("^sm")
            .and(field("age").gte(18).or(field("tags").eq("child")));
        assert!(matches(&d, &f).unwrap());
        assert!(!matches(&d, &f.not()).unwrap());
        assert!(!matches(&d, &Filter::Or(vec![])).unwrap());
        assert!(matches(&d, &Filter::And(vec![])).unwrap());
    }

    #[test]
    fn test_object_id_ordering() {
        let a = doc(json!({"_id": {"$oid": "000000000000000000000001"}}));
        let f = field("_id").gt(json!({"$oid": "000000000000000000000000"}));
        assert!(matches(&a, &f).unwrap());
    }

    #[test]
    fn test_projection() {
        let d = patient();
        let included = project(&d, &Projection::include(["name", "address.city"])).unwrap();
        assert_eq!(
            Value::Object(included),
            json!({"_id": "p1", "name": "Smith", "address": {"city": "Oslo"}})
        );

        let excluded =
            project(&d, &Projection::exclude(["tags", "visits", "address.zip", "_id"])).unwrap();
        assert_eq!(
            Value::Object(excluded),
            json!({"name": "Smith", "age": 42, "address": {"city": "Oslo"}})
        );
    }

    #[test]
    fn test_unset_keeps_field_order() {
        let mut d = doc(json!({"_id": 1, "a": 1, "b": 2, "c": 3, "d": {"x": 1, "y": 2, "z": 3}}));
        apply_update(&mut d, &UpdateSpec::new().unset("a").unset("d.x")).unwrap();
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["_id", "b", "c", "d"]);
        assert_eq!(
            serde_json::to_string(&d["d"]).unwrap(),
            r#"{"y":2,"z":3}"#
        );

        let excluded = project(&patient(), &Projection::exclude(["name"])).unwrap();
        assert_eq!(
            excluded.keys().collect::<Vec<_>>(),
            vec!["_id", "age", "tags", "address", "visits"]
        );
    }

    #[test]
    fn test_sort_is_stable_and_orders_missing_first() {
        let mut docs = vec![
            doc(json!({"n": 1, "k": "b"})),
            doc(json!({"n": 2})),
            doc(json!({"n": 3, "k": "a"})),
            doc(json!({"n": 4, "k": "a"})),
        ];
        sort(&mut docs, &Sort::ascending("k"));
        let order: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![2, 3, 4, 1]);

        sort(&mut docs, &Sort::descending("k").then_descending("n"));
        let order: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![1, 4, 3, 2]);
    }

    #[test]
    fn test_apply_update() {
        let mut d = patient();
        let update = UpdateSpec::new()
            .set("address.city", "Bergen")
            .set("contact.email", "s@example.com")
            .inc("age", 1)
            .inc("logins", 2)
            .unset("address.zip")
            .push("visits", json!({"ward": "C"}))
            .add_to_set("tags", "vip")
            .pull("flags", "x");
        assert!(apply_update(&mut d, &update).unwrap());

        assert_eq!(d["address"], json!({"city": "Bergen"}));
        assert_eq!(d["contact"], json!({"email": "s@example.com"}));
        assert_eq!(d["age"], json!(43));
        assert_eq!(d["logins"], json!(2));
        assert_eq!(d["visits"].as_array().unwrap().len(), 3);
        assert_eq!(d["tags"], json!(["vip", "new"]));
        assert!(d.get("flags").is_none());
    }

    #[test]
    fn test_update_reports_no_change() {
        let mut d = patient();
        let changed = apply_update(&mut d, &UpdateSpec::new().set("name", "Smith")).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_update_type_errors() {
        let mut d = patient();
        assert!(apply_update(&mut d, &UpdateSpec::new().inc("name", 1)).is_err());
        assert!(apply_update(&mut d, &UpdateSpec::new().push("name", 1)).is_err());
        assert!(apply_update(&mut d, &UpdateSpec::new().set("name.first", "J")).is_err());
    }

    #[test]
    fn test_float_increment() {
        let mut d = doc(json!({"score": 1.5}));
        apply_update(&mut d, &UpdateSpec::new().inc("score", 1)).unwrap();
        assert_eq!(d["score"], json!(2.5));
    }
}
