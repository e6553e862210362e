//! Query building blocks: filters, projections, sort orders, update
//! specifications and typed field selectors.

mod field;
mod filter;
mod projection;
mod update;

pub use field::Field;
pub use filter::{ComparisonOp, FieldFilter, Filter, field};
pub use projection::{Projection, Sort, SortOrder};
pub use update::{UpdateOp, UpdateSpec};

/// `true` when the paths are equal or one is a dotted prefix of the other.
pub(crate) fn paths_conflict(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    match long.strip_prefix(short) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}
