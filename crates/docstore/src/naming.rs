//! Collection naming.
//!
//! The repository never hard-codes where an entity type lives. Every operation
//! asks a [`CollectionNameProvider`] for the collection name of its entity
//! type, so the naming strategy can change without touching repository code.
//! Providers must be deterministic: the same type always yields the same name.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Identity of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Returns the identity of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`].
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path or generic arguments.
    pub fn short_name(&self) -> &'static str {
        let without_generics = self.name.split('<').next().unwrap_or(self.name);
        without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics)
    }
}

/// Resolves the storage collection for an entity type.
pub trait CollectionNameProvider: Send + Sync + Debug {
    /// Returns the collection name for `entity`.
    fn collection_name(&self, entity: &EntityType) -> String;
}

/// Case style applied by [`TypeNameProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStyle {
    /// Use the type name unchanged (`PatientRecord`).
    #[default]
    AsIs,
    /// Lower camel case (`patientRecord`).
    CamelCase,
    /// Snake case (`patient_record`).
    SnakeCase,
}

/// Derives collection names from the entity's type name.
///
/// # Examples
///
/// ```
/// use helios_docstore::naming::{CollectionNameProvider, EntityType, NamingStyle, TypeNameProvider};
///
/// struct PatientRecord;
///
/// let provider = TypeNameProvider::new()
///     .with_style(NamingStyle::SnakeCase)
///     .pluralized();
/// assert_eq!(
///     provider.collection_name(&EntityType::of::<PatientRecord>()),
///     "patient_records"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeNameProvider {
    style: NamingStyle,
    pluralize: bool,
}

impl TypeNameProvider {
    /// Creates a provider that returns the bare type name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the case style.
    pub fn with_style(mut self, style: NamingStyle) -> Self {
        self.style = style;
        self
    }

    /// Appends a plural suffix to every name.
    pub fn pluralized(mut self) -> Self {
        self.pluralize = true;
        self
    }
}

impl CollectionNameProvider for TypeNameProvider {
    fn collection_name(&self, entity: &EntityType) -> String {
        let base = entity.short_name();
        let styled = match self.style {
            NamingStyle::AsIs => base.to_string(),
            NamingStyle::CamelCase => to_camel_case(base),
            NamingStyle::SnakeCase => to_snake_case(base),
        };
        if self.pluralize {
            pluralize(&styled)
        } else {
            styled
        }
    }
}

/// An explicit type-to-name table with a fallback for unregistered types.
#[derive(Debug, Clone)]
pub struct StaticNameProvider {
    names: HashMap<TypeId, String>,
    fallback: Arc<dyn CollectionNameProvider>,
}

impl StaticNameProvider {
    /// Creates an empty table that falls back to [`TypeNameProvider::new`].
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(TypeNameProvider::new()))
    }

    /// Creates an empty table with the given fallback.
    pub fn with_fallback(fallback: Arc<dyn CollectionNameProvider>) -> Self {
        Self {
            names: HashMap::new(),
            fallback,
        }
    }

    /// Maps `T` to `name`.
    pub fn register<T: 'static>(mut self, name: impl Into<String>) -> Self {
        self.names.insert(TypeId::of::<T>(), name.into());
        self
    }

    /// Returns all explicitly registered names.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.values().cloned().collect();
        names.sort();
        names
    }
}

impl Default for StaticNameProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionNameProvider for StaticNameProvider {
    fn collection_name(&self, entity: &EntityType) -> String {
        match self.names.get(&entity.type_id()) {
            Some(name) => name.clone(),
            None => self.fallback.collection_name(entity),
        }
    }
}

fn to_camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && !chars[i - 1].is_uppercase() && chars[i - 1] != '_';
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn pluralize(name: &str) -> String {
    if name.ends_with('s') || name.ends_with('x') || name.ends_with("ch") || name.ends_with("sh")
    {
        format!("{}es", name)
    } else if let Some(stem) = name.strip_suffix('y') {
        match stem.chars().last() {
            Some(c) if !"aeiou".contains(c) => format!("{}ies", stem),
            _ => format!("{}s", name),
        }
    } else {
        format!("{}s", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PatientRecord;
    struct Category;
    struct Address;
    struct HTTPLog;
    struct Wrapper<T>(T);

    #[test]
    fn test_short_name() {
        assert_eq!(EntityType::of::<PatientRecord>().short_name(), "PatientRecord");
        assert_eq!(EntityType::of::<Wrapper<u8>>().short_name(), "Wrapper");
    }

    #[test]
    fn test_type_name_provider_styles() {
        let ty = EntityType::of::<PatientRecord>();
        assert_eq!(TypeNameProvider::new().collection_name(&ty), "PatientRecord");
        assert_eq!(
            TypeNameProvider::new()
                .with_style(NamingStyle::CamelCase)
                .collection_name(&ty),
            "patientRecord"
        );
        assert_eq!(
            TypeNameProvider::new()
                .with_style(NamingStyle::SnakeCase)
                .collection_name(&ty),
            "patient_record"
        );
        assert_eq!(
            TypeNameProvider::new()
                .with_style(NamingStyle::SnakeCase)
                .collection_name(&EntityType::of::<HTTPLog>()),
            "http_log"
        );
    }

    #[test]
    fn test_pluralization() {
        let provider = TypeNameProvider::new()
            .with_style(NamingStyle::CamelCase)
            .pluralized();
        assert_eq!(provider.collection_name(&EntityType::of::<Category>()), "categories");
        assert_eq!(provider.collection_name(&EntityType::of::<Address>()), "addresses");
        assert_eq!(
            provider.collection_name(&EntityType::of::<PatientRecord>()),
            "patientRecords"
        );
    }

    #[test]
    fn test_static_provider_with_fallback() {
        let provider = StaticNameProvider::new().register::<PatientRecord>("records");
        assert_eq!(
            provider.collection_name(&EntityType::of::<PatientRecord>()),
            "records"
        );
        assert_eq!(provider.collection_name(&EntityType::of::<Category>()), "Category");
        assert_eq!(provider.registered_names(), vec!["records".to_string()]);
    }

    #[test]
    fn test_provider_is_deterministic() {
        let provider = TypeNameProvider::new().pluralized();
        let ty = EntityType::of::<Category>();
        assert_eq!(provider.collection_name(&ty), provider.collection_name(&ty));
    }
}
