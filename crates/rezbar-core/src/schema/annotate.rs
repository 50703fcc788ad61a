//! Display annotations layered over a schema.
//!
//! Annotations carry presentation concerns (display names, docs, colors)
//! keyed by the same opaque IDs the schema uses for definitions, fields
//! and variants. Keeping them out of [`super::Schema`] lets a schema be
//! serialized and compared without display noise.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Presentation metadata for one schema element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Display name
    pub name: String,
    /// Documentation string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Display color hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Display icon hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Annotation {
    /// Creates an annotation carrying only a display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Annotations keyed by schema element ID.
///
/// Keys are type IDs (`"pkg.Message"`) or field/variant IDs
/// (`"pkg.Message.field"`), matching the IDs used in the schema itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSet {
    entries: IndexMap<String, Annotation>,
}

impl AnnotationSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the annotation for an element
    pub fn insert(&mut self, id: impl Into<String>, annotation: Annotation) {
        self.entries.insert(id.into(), annotation);
    }

    /// Looks up the annotation for an element
    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.entries.get(id)
    }

    /// Returns the display name for an element, if annotated
    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|a| a.name.as_str())
    }

    /// Merges another set into this one; `other` wins on key conflicts
    pub fn merge(&mut self, other: AnnotationSet) {
        for (id, annotation) in other.entries {
            self.entries.insert(id, annotation);
        }
    }

    /// Number of annotated elements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no element is annotated
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_and_lookup() {
        let mut set = AnnotationSet::new();
        set.insert("pkg.User", Annotation::named("User"));
        set.insert(
            "pkg.User.id",
            Annotation {
                name: "id".into(),
                doc: Some("stable identifier".into()),
                ..Annotation::default()
            },
        );

        assert_eq!(set.display_name("pkg.User"), Some("User"));
        assert_eq!(
            set.get("pkg.User.id").unwrap().doc.as_deref(),
            Some("stable identifier")
        );
        assert!(set.get("pkg.Unknown").is_none());
    }

    #[test]
    fn test_merge_prefers_incoming() {
        let mut base = AnnotationSet::new();
        base.insert("pkg.User", Annotation::named("User"));

        let mut overlay = AnnotationSet::new();
        overlay.insert("pkg.User", Annotation::named("Account"));

        base.merge(overlay);
        assert_eq!(base.display_name("pkg.User"), Some("Account"));
        assert_eq!(base.len(), 1);
    }
}
