//! Structural paths into the value tree, and the comment store keyed by
//! them.
//!
//! A [`FieldPath`] addresses one node by field number and repeated-element
//! index per level. Paths are plain values: they are recomputed per lookup
//! and never hold references into the tree, which is what lets comments
//! survive a full re-decode of the same buffer.

use crate::error::{Error, Result};
use crate::value::{MessageValue, StructuralValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step into the tree: a field number plus an occurrence index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    /// Wire field number at this level
    pub field: u32,
    /// Index into the field's occurrence list
    pub index: usize,
}

impl PathSegment {
    /// Creates a segment
    pub fn new(field: u32, index: usize) -> Self {
        Self { field, index }
    }
}

/// An ordered sequence of segments from the tree root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(pub Vec<PathSegment>);

impl FieldPath {
    /// The empty path (the root itself)
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from `(field, index)` pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, usize)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(field, index)| PathSegment::new(field, index))
                .collect(),
        )
    }

    /// The segments in order
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path without its last segment, and that segment
    pub fn split_last(&self) -> Option<(FieldPath, PathSegment)> {
        let (last, parent) = self.0.split_last()?;
        Some((FieldPath(parent.to_vec()), *last))
    }

    /// True if `self` starts with every segment of `prefix`
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}[{}]", seg.field, seg.index)?;
        }
        Ok(())
    }
}

/// Walks the tree by successive segments.
///
/// Fails with a path error when a segment indexes past the end of a
/// repeated field's list, into a field that is not present, or through a
/// leaf that is not a message.
pub fn address_of<'a>(root: &'a MessageValue, path: &FieldPath) -> Result<&'a StructuralValue> {
    let mut segments = path.segments().iter();

    let Some(first) = segments.next() else {
        return Err(Error::path("empty path does not address a node"));
    };

    let mut current = lookup(root, first, path)?;
    for segment in segments {
        let message = current.as_message().ok_or_else(|| {
            Error::path(format!(
                "path '{}' descends through a non-message node at field {}",
                path, segment.field
            ))
        })?;
        current = lookup(message, segment, path)?;
    }

    Ok(current)
}

/// Walks to the message containing the node a path's children address.
/// The empty path yields the root itself.
pub(crate) fn message_at_mut<'a>(
    root: &'a mut MessageValue,
    path: &FieldPath,
) -> Result<&'a mut MessageValue> {
    let mut current = root;
    for segment in path.segments() {
        current = current
            .get_index_mut(segment.field, segment.index)
            .ok_or_else(|| {
                Error::path(format!(
                    "path '{}': field {} has no element at index {}",
                    path, segment.field, segment.index
                ))
            })?
            .as_message_mut()
            .ok_or_else(|| {
                Error::path(format!(
                    "path '{}' descends through a non-message node at field {}",
                    path, segment.field
                ))
            })?;
    }
    Ok(current)
}

fn lookup<'a>(
    msg: &'a MessageValue,
    segment: &PathSegment,
    path: &FieldPath,
) -> Result<&'a StructuralValue> {
    msg.get_index(segment.field, segment.index).ok_or_else(|| {
        Error::path(format!(
            "path '{}': field {} has no element at index {}",
            path, segment.field, segment.index
        ))
    })
}

/// A user comment attached to one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// The addressed node
    pub path: FieldPath,
    /// Comment body
    pub text: String,
    /// Optional author tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Presentation-data document shape: path-keyed comments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PresentationData {
    #[serde(default)]
    comments: Vec<Comment>,
}

/// Comments keyed by path value, independent of the value tree.
///
/// Deletion policy for repeated elements: removing element `k` renumbers
/// comments at indices above `k` downward by one and drops comments at
/// exactly `k`. Comments on unrelated paths are never touched.
#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    comments: IndexMap<FieldPath, Vec<Comment>>,
}

impl CommentStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a presentation-data JSON document into a store
    pub fn from_presentation(data: &[u8]) -> Result<Self> {
        let doc: PresentationData = serde_json::from_slice(data)?;
        let mut store = Self::new();
        for comment in doc.comments {
            store
                .comments
                .entry(comment.path.clone())
                .or_default()
                .push(comment);
        }
        Ok(store)
    }

    /// Serializes the store back to a presentation-data JSON document
    pub fn to_presentation(&self) -> Result<Vec<u8>> {
        let doc = PresentationData {
            comments: self.comments.values().flatten().cloned().collect(),
        };
        Ok(serde_json::to_vec_pretty(&doc)?)
    }

    /// Replaces the comments at a path; an empty list clears the entry
    pub fn set_comments(&mut self, path: FieldPath, comments: Vec<Comment>) {
        if comments.is_empty() {
            self.comments.shift_remove(&path);
        } else {
            self.comments.insert(path, comments);
        }
    }

    /// The comments at a path, empty if none
    pub fn get_comments(&self, path: &FieldPath) -> &[Comment] {
        self.comments
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of paths carrying comments
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// True when no comments are stored
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Iterates `(path, comments)` entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &[Comment])> {
        self.comments.iter().map(|(p, c)| (p, c.as_slice()))
    }

    /// Applies the deletion policy after element `removed_index` of
    /// `field` under `parent` was removed: drop comments on the removed
    /// element, renumber higher indices downward.
    pub fn remap_removed(&mut self, parent: &FieldPath, field: u32, removed_index: usize) {
        let depth = parent.len();
        let mut remapped: IndexMap<FieldPath, Vec<Comment>> =
            IndexMap::with_capacity(self.comments.len());

        for (mut path, mut comments) in std::mem::take(&mut self.comments) {
            let affected = path.starts_with(parent)
                && path.segments().get(depth).map(|s| s.field) == Some(field);

            if affected {
                let index = path.0[depth].index;
                if index == removed_index {
                    continue;
                }
                if index > removed_index {
                    path.0[depth].index = index - 1;
                    for comment in &mut comments {
                        comment.path = path.clone();
                    }
                }
            }
            remapped.entry(path).or_default().extend(comments);
        }

        self.comments = remapped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;
    use pretty_assertions::assert_eq;

    fn tree() -> MessageValue {
        let mut inner = MessageValue::new("test.Inner");
        inner.push_value(1, StructuralValue::scalar(Scalar::String("a".into())));

        let mut msg = MessageValue::new("test.Outer");
        msg.push_value(3, StructuralValue::scalar(Scalar::Int32(1)));
        msg.push_value(3, StructuralValue::scalar(Scalar::Int32(2)));
        msg.push_value(4, StructuralValue::Message(inner));
        msg
    }

    fn comment(path: &FieldPath, text: &str) -> Comment {
        Comment {
            path: path.clone(),
            text: text.into(),
            author: None,
        }
    }

    #[test]
    fn test_address_of_repeated_element() {
        let msg = tree();
        let path = FieldPath::from_pairs([(3, 1)]);
        let value = address_of(&msg, &path).unwrap();
        assert_eq!(value, &StructuralValue::scalar(Scalar::Int32(2)));
    }

    #[test]
    fn test_address_of_nested() {
        let msg = tree();
        let path = FieldPath::from_pairs([(4, 0), (1, 0)]);
        let value = address_of(&msg, &path).unwrap();
        assert_eq!(value, &StructuralValue::scalar(Scalar::String("a".into())));
    }

    #[test]
    fn test_address_of_failures() {
        let msg = tree();
        // index past the end
        assert!(address_of(&msg, &FieldPath::from_pairs([(3, 2)])).is_err());
        // absent field
        assert!(address_of(&msg, &FieldPath::from_pairs([(9, 0)])).is_err());
        // descending through a scalar
        assert!(address_of(&msg, &FieldPath::from_pairs([(3, 0), (1, 0)])).is_err());
        // empty path
        assert!(address_of(&msg, &FieldPath::root()).is_err());
    }

    #[test]
    fn test_comments_round_trip() {
        let mut store = CommentStore::new();
        let path = FieldPath::from_pairs([(3, 1)]);
        store.set_comments(path.clone(), vec![comment(&path, "check this")]);

        assert_eq!(store.get_comments(&path).len(), 1);
        assert!(store
            .get_comments(&FieldPath::from_pairs([(3, 0)]))
            .is_empty());

        let bytes = store.to_presentation().unwrap();
        let reloaded = CommentStore::from_presentation(&bytes).unwrap();
        assert_eq!(reloaded.get_comments(&path), store.get_comments(&path));
    }

    #[test]
    fn test_remap_drops_deleted_and_renumbers() {
        let mut store = CommentStore::new();
        let p0 = FieldPath::from_pairs([(3, 0)]);
        let p1 = FieldPath::from_pairs([(3, 1)]);
        let p2 = FieldPath::from_pairs([(3, 2)]);
        let unrelated = FieldPath::from_pairs([(4, 0), (1, 0)]);
        store.set_comments(p0.clone(), vec![comment(&p0, "zero")]);
        store.set_comments(p1.clone(), vec![comment(&p1, "one")]);
        store.set_comments(p2.clone(), vec![comment(&p2, "two")]);
        store.set_comments(unrelated.clone(), vec![comment(&unrelated, "keep")]);

        store.remap_removed(&FieldPath::root(), 3, 1);

        assert_eq!(store.get_comments(&p0)[0].text, "zero");
        // the comment formerly at index 2 moved down to index 1
        assert_eq!(store.get_comments(&p1)[0].text, "two");
        assert_eq!(store.get_comments(&p1)[0].path, p1);
        assert!(store.get_comments(&p2).is_empty());
        assert_eq!(store.get_comments(&unrelated)[0].text, "keep");
    }

    #[test]
    fn test_remap_only_touches_matching_parent() {
        let mut store = CommentStore::new();
        let nested = FieldPath::from_pairs([(4, 0), (3, 1)]);
        store.set_comments(nested.clone(), vec![comment(&nested, "nested")]);

        // removal at the root of field 3 must not shift the nested path
        store.remap_removed(&FieldPath::root(), 3, 0);
        assert_eq!(store.get_comments(&nested).len(), 1);

        // removal under [(4,0)] does shift it
        store.remap_removed(&FieldPath::from_pairs([(4, 0)]), 3, 0);
        let moved = FieldPath::from_pairs([(4, 0), (3, 0)]);
        assert_eq!(store.get_comments(&moved)[0].text, "nested");
    }

    #[test]
    fn test_path_display() {
        let path = FieldPath::from_pairs([(4, 0), (1, 2)]);
        assert_eq!(path.to_string(), "4[0].1[2]");
    }
}
