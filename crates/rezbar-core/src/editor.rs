//! The editor state machine.
//!
//! An [`Editor`] owns everything one loaded document needs: the type
//! registry built from its descriptor, the decoded tree, the original and
//! current byte buffers, the comment store, and the observer list. There
//! is no process-wide state; two editors never share anything.
//!
//! State moves `Empty → Decoded → (Mutated ⇄ Decoded)`; a decode failure
//! at load time lands in `Errored`. All operations are synchronous and run
//! to completion; callers serialize access to one instance. Observers are
//! invoked in registration order, only after the editor is internally
//! consistent again.
//!
//! Failure policy: a decode or encode failure inside a mutating operation
//! leaves the previous tree and buffers untouched and is surfaced both as
//! a returned error and an `error` event. Path errors from the comment
//! surface are plain return values, never events.

use crate::descriptor::TypeRegistry;
use crate::error::{Error, Result};
use crate::path::{address_of, message_at_mut, Comment, CommentStore, FieldPath};
use crate::value::MessageValue;
use crate::wire::{decode_message, encode_message};
use bytes::Bytes;
use std::fmt;
use std::fmt::Write as FmtWrite;
use tracing::debug;

/// Lifecycle state of an editor instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// No document loaded
    Empty,
    /// Tree and current bytes agree with the loaded buffer
    Decoded,
    /// Tree has been edited; current bytes diverge from the original
    Mutated,
    /// The last load failed to decode; terminal until the next load
    Errored,
}

/// Notification dispatched to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// A mutating operation completed; observers re-read state through
    /// accessors
    Change,
    /// An operation failed
    Error {
        /// Human-readable failure description
        message: String,
    },
}

/// Which of the two buffers a query addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOrigin {
    /// The re-encoded current bytes
    Encoded,
    /// The bytes the document was loaded from
    Original,
}

/// Everything `initialize` needs for one load
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// The wire data to decode
    pub data: &'a [u8],
    /// A compiled `FileDescriptorSet`
    pub descriptor: &'a [u8],
    /// Root message type; defaults to the last message type in the
    /// descriptor when absent
    pub type_name: Option<&'a str>,
    /// Presentation-data JSON seeding the comment store
    pub presentation: Option<&'a [u8]>,
}

impl<'a> LoadRequest<'a> {
    /// Creates a request with data and descriptor only
    pub fn new(data: &'a [u8], descriptor: &'a [u8]) -> Self {
        Self {
            data,
            descriptor,
            type_name: None,
            presentation: None,
        }
    }

    /// Selects the root message type
    pub fn type_name(mut self, name: &'a str) -> Self {
        self.type_name = Some(name);
        self
    }

    /// Seeds the comment store from presentation data
    pub fn presentation(mut self, data: &'a [u8]) -> Self {
        self.presentation = Some(data);
        self
    }
}

type Listener = Box<dyn FnMut(&EditorEvent)>;

/// A single-document structural editor over protobuf wire data
pub struct Editor {
    registry: Option<TypeRegistry>,
    state: EditorState,
    original: Bytes,
    current: Bytes,
    tree: Option<MessageValue>,
    root_type: Option<String>,
    current_type: Option<String>,
    comments: CommentStore,
    listeners: Vec<Listener>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.state)
            .field("current_type", &self.current_type)
            .field("original_len", &self.original.len())
            .field("current_len", &self.current.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// Creates an empty editor
    pub fn new() -> Self {
        Self {
            registry: None,
            state: EditorState::Empty,
            original: Bytes::new(),
            current: Bytes::new(),
            tree: None,
            root_type: None,
            current_type: None,
            comments: CommentStore::new(),
            listeners: Vec::new(),
        }
    }

    /// Registers an observer for `change`/`error` events.
    ///
    /// Dispatch is synchronous, in registration order, at the end of the
    /// triggering call.
    pub fn subscribe(&mut self, listener: impl FnMut(&EditorEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Loads a document: builds the registry, decodes, seeds comments.
    ///
    /// Descriptor and presentation problems abort the load with a plain
    /// error, leaving any previously loaded state intact. A decode failure
    /// is terminal for this load: the editor transitions to
    /// [`EditorState::Errored`] and emits an `error` event.
    pub fn initialize(&mut self, req: LoadRequest<'_>) -> Result<()> {
        let registry = TypeRegistry::from_descriptor(req.descriptor, req.type_name)?;
        let comments = match req.presentation {
            Some(data) => CommentStore::from_presentation(data)?,
            None => CommentStore::new(),
        };
        let root = registry.default_root().to_string();

        match decode_message(req.data, &registry, &root) {
            Ok(tree) => {
                debug!(root = %root, len = req.data.len(), "document loaded");
                self.registry = Some(registry);
                self.tree = Some(tree);
                self.original = Bytes::copy_from_slice(req.data);
                self.current = self.original.clone();
                self.root_type = Some(root.clone());
                self.current_type = Some(root);
                self.comments = comments;
                self.state = EditorState::Decoded;
                Ok(())
            }
            Err(err) => {
                // Keep the registry so type listing still works; everything
                // document-shaped is gone until the next load.
                self.registry = Some(registry);
                self.tree = None;
                self.original = Bytes::new();
                self.current = Bytes::new();
                self.root_type = None;
                self.current_type = None;
                self.comments = CommentStore::new();
                self.state = EditorState::Errored;
                self.emit(&EditorEvent::Error {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Replaces the document bytes, re-decoding under the current type.
    ///
    /// Used to pick up external changes to the underlying data. Resets
    /// both buffers to the new data. On failure nothing changes.
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        let (registry, type_name) = match (&self.registry, &self.current_type) {
            (Some(r), Some(t)) => (r, t.as_str()),
            _ => return Err(Error::schema("no document loaded")),
        };

        match decode_message(data, registry, type_name) {
            Ok(tree) => {
                self.tree = Some(tree);
                self.original = Bytes::copy_from_slice(data);
                self.current = self.original.clone();
                self.state = EditorState::Decoded;
                self.emit(&EditorEvent::Change);
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// Re-decodes the current bytes under a different root type.
    ///
    /// Canonical buffer choice: the *current* bytes — a type switch
    /// reinterprets what the user is looking at, edits included. The
    /// descriptor is not reloaded. An unknown type name aborts with a
    /// schema error and no state change.
    pub fn set_current_type(&mut self, name: &str) -> Result<()> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| Error::schema("no document loaded"))?;
        if !registry.contains_message(name) {
            return Err(Error::schema(format!(
                "message type '{}' not found in descriptor",
                name
            )));
        }
        if self.tree.is_none() {
            return Err(Error::schema("no decoded document to reinterpret"));
        }

        match decode_message(&self.current, registry, name) {
            Ok(tree) => {
                debug!(from = ?self.current_type, to = %name, "type switched");
                self.tree = Some(tree);
                self.current_type = Some(name.to_string());
                self.state = if self.current == self.original {
                    EditorState::Decoded
                } else {
                    EditorState::Mutated
                };
                self.emit(&EditorEvent::Change);
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// Replaces the decoded tree and re-encodes it into the current bytes.
    ///
    /// Oneof groups are normalized first: when more than one member of a
    /// group is set, the one whose record appears last wins and its
    /// siblings are cleared. The `change` event fires only after the
    /// current bytes are fully recomputed; on failure the previous tree
    /// and buffers stay untouched.
    pub fn update_decoded_data(&mut self, tree: MessageValue) -> Result<()> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| Error::schema("no document loaded"))?;
        if self.tree.is_none() {
            return Err(Error::schema("no decoded document to update"));
        }

        let mut draft = tree;
        normalize_oneofs(registry, &mut draft);

        match encode_message(&draft) {
            Ok(bytes) => {
                self.tree = Some(draft);
                self.current = Bytes::from(bytes);
                self.state = EditorState::Mutated;
                self.emit(&EditorEvent::Change);
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// Removes one repeated-field element addressed by `path`.
    ///
    /// Comments below the removed slot follow the documented policy:
    /// dropped on the removed index, renumbered downward above it.
    pub fn remove_element(&mut self, path: &FieldPath) -> Result<()> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::schema("no decoded document to update"))?;
        let (parent, segment) = path
            .split_last()
            .ok_or_else(|| Error::path("cannot remove the tree root"))?;

        let mut draft = tree.clone();
        message_at_mut(&mut draft, &parent)?.remove_value(segment.field, segment.index)?;

        match encode_message(&draft) {
            Ok(bytes) => {
                self.tree = Some(draft);
                self.current = Bytes::from(bytes);
                self.comments.remap_removed(&parent, segment.field, segment.index);
                self.state = EditorState::Mutated;
                self.emit(&EditorEvent::Change);
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// The current lifecycle state
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Read-only view of the decoded tree
    pub fn decoded_data(&self) -> Option<&MessageValue> {
        self.tree.as_ref()
    }

    /// The root type the document was loaded with
    pub fn root_message_type(&self) -> Option<&str> {
        self.root_type.as_deref()
    }

    /// The type the document is currently decoded as
    pub fn current_type(&self) -> Option<&str> {
        self.current_type.as_deref()
    }

    /// Every message type in the loaded descriptor
    pub fn available_types(&self) -> &[String] {
        self.registry
            .as_ref()
            .map(|r| r.message_names())
            .unwrap_or(&[])
    }

    /// The registry built from the loaded descriptor
    pub fn registry(&self) -> Option<&TypeRegistry> {
        self.registry.as_ref()
    }

    /// The re-encoded current bytes
    pub fn encoded_bytes(&self) -> Bytes {
        self.current.clone()
    }

    /// The bytes the document was loaded from
    pub fn original_bytes(&self) -> Bytes {
        self.original.clone()
    }

    /// Renders one buffer as offset/hex/ASCII rows. Purely derived.
    pub fn hex_view(&self, origin: BufferOrigin) -> String {
        let bytes = match origin {
            BufferOrigin::Encoded => &self.current,
            BufferOrigin::Original => &self.original,
        };
        render_hex(bytes)
    }

    /// Enum value name lookup by enum type name and numeric value
    pub fn enum_name(&self, enum_type: &str, number: i32) -> Option<&str> {
        self.registry
            .as_ref()
            .and_then(|r| r.enum_name(enum_type, number))
    }

    /// Comments at a path; the path must address an existing node.
    ///
    /// Path problems are local errors returned to the caller — they never
    /// emit events and never invalidate the editor.
    pub fn get_comments(&self, path: &FieldPath) -> Result<&[Comment]> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::path("no decoded document"))?;
        address_of(tree, path)?;
        Ok(self.comments.get_comments(path))
    }

    /// Replaces the comments at a path; the path must address an existing
    /// node
    pub fn set_comments(&mut self, path: FieldPath, comments: Vec<Comment>) -> Result<()> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| Error::path("no decoded document"))?;
        address_of(tree, &path)?;
        self.comments.set_comments(path, comments);
        Ok(())
    }

    /// The full comment store, for renderers
    pub fn comment_store(&self) -> &CommentStore {
        &self.comments
    }

    /// Emit an error event and propagate the error
    fn fail(&mut self, err: Error) -> Result<()> {
        self.emit(&EditorEvent::Error {
            message: err.to_string(),
        });
        Err(err)
    }

    fn emit(&mut self, event: &EditorEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

/// Enforce at-most-one-set per oneof group, recursively.
/// The member whose record appears last in the layout wins.
fn normalize_oneofs(registry: &TypeRegistry, msg: &mut MessageValue) {
    if let Some(layout) = registry.message(&msg.type_name) {
        let mut losers = Vec::new();
        for (_, members) in layout.oneofs() {
            let present: Vec<u32> = members
                .iter()
                .copied()
                .filter(|n| !msg.get_all(*n).is_empty())
                .collect();
            if present.len() > 1 {
                let winner = present
                    .iter()
                    .copied()
                    .max_by_key(|n| msg.last_record_position(*n))
                    .expect("present is non-empty");
                losers.extend(present.into_iter().filter(|n| *n != winner));
            }
        }
        for field in losers {
            msg.clear_field(field);
        }
    }

    for (_, values) in msg.fields_mut() {
        for value in values {
            if let Some(nested) = value.as_message_mut() {
                normalize_oneofs(registry, nested);
            }
        }
    }
}

/// Render bytes as classic 16-per-row hex dump rows
fn render_hex(bytes: &[u8]) -> String {
    let mut out = String::new();

    for (row, chunk) in bytes.chunks(16).enumerate() {
        write!(out, "{:08x}  ", row * 16).expect("String write cannot fail");

        for i in 0..16 {
            match chunk.get(i) {
                Some(byte) => write!(out, "{:02x} ", byte).expect("String write cannot fail"),
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }

        out.push_str(" |");
        for &byte in chunk {
            out.push(if (0x20..0x7F).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::descriptor_set;
    use crate::value::{Scalar, StructuralValue};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    const JOHN: [u8; 8] = [0x0A, 0x04, 0x4A, 0x6F, 0x68, 0x6E, 0x10, 0x7B];

    fn loaded_editor() -> Editor {
        let descriptor = descriptor_set();
        let mut editor = Editor::new();
        editor
            .initialize(LoadRequest::new(&JOHN, &descriptor).type_name("test.Person"))
            .unwrap();
        editor
    }

    /// Collects event names so dispatch order can be asserted
    fn record_events(editor: &mut Editor) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        editor.subscribe(move |event| {
            sink.borrow_mut().push(match event {
                EditorEvent::Change => "change".to_string(),
                EditorEvent::Error { message } => format!("error: {}", message),
            });
        });
        log
    }

    #[test]
    fn test_initialize_decodes_and_stores_buffers() {
        let editor = loaded_editor();

        assert_eq!(editor.state(), EditorState::Decoded);
        assert_eq!(editor.current_type(), Some("test.Person"));
        assert_eq!(editor.root_message_type(), Some("test.Person"));
        assert_eq!(editor.original_bytes().as_ref(), &JOHN[..]);
        assert_eq!(editor.encoded_bytes().as_ref(), &JOHN[..]);

        let tree = editor.decoded_data().unwrap();
        assert_eq!(
            tree.get(1),
            Some(&StructuralValue::scalar(Scalar::String("John".into())))
        );
    }

    #[test]
    fn test_initialize_default_root_is_last_message_type() {
        let descriptor = descriptor_set();
        let mut editor = Editor::new();
        editor
            .initialize(LoadRequest::new(&JOHN, &descriptor))
            .unwrap();
        assert_eq!(editor.current_type(), Some("test.Probe"));
    }

    #[test]
    fn test_initialize_unknown_type_leaves_state_intact() {
        let descriptor = descriptor_set();
        let mut editor = Editor::new();
        let err = editor
            .initialize(LoadRequest::new(&JOHN, &descriptor).type_name("test.Ghost"))
            .unwrap_err();

        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(editor.state(), EditorState::Empty);
        assert!(editor.decoded_data().is_none());
    }

    #[test]
    fn test_initialize_decode_failure_enters_errored() {
        let descriptor = descriptor_set();
        let bad = [0x0A, 0x05, 0x41]; // length overruns buffer
        let mut editor = Editor::new();
        let log = record_events(&mut editor);

        let result = editor.initialize(
            LoadRequest::new(&bad, &descriptor).type_name("test.Person"),
        );

        assert!(result.is_err());
        assert_eq!(editor.state(), EditorState::Errored);
        assert!(editor.decoded_data().is_none());
        // descriptor itself loaded fine, so types remain listable
        assert!(!editor.available_types().is_empty());
        assert!(log.borrow()[0].starts_with("error:"));
    }

    #[test]
    fn test_available_types() {
        let editor = loaded_editor();
        assert_eq!(
            editor.available_types(),
            &["test.Person".to_string(), "test.Probe".to_string()]
        );
    }

    #[test]
    fn test_set_current_type_reinterprets_current_bytes() {
        let mut editor = loaded_editor();
        editor.set_current_type("test.Probe").unwrap();

        assert_eq!(editor.current_type(), Some("test.Probe"));
        assert_eq!(editor.state(), EditorState::Decoded);
        // shared field prefix decodes identically
        let tree = editor.decoded_data().unwrap();
        assert_eq!(tree.get(2), Some(&StructuralValue::scalar(Scalar::Int32(123))));
        // the load-time root is unchanged
        assert_eq!(editor.root_message_type(), Some("test.Person"));
    }

    #[test]
    fn test_set_current_type_unknown_name_fails_cleanly() {
        let mut editor = loaded_editor();
        let err = editor.set_current_type("test.Ghost").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(editor.current_type(), Some("test.Person"));
        assert_eq!(editor.state(), EditorState::Decoded);
    }

    #[test]
    fn test_update_recomputes_bytes_before_change_event() {
        let mut editor = loaded_editor();

        // observer reads the encoded bytes at dispatch time; they must
        // already be consistent
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            editor.subscribe(move |event| {
                if matches!(event, EditorEvent::Change) {
                    seen.borrow_mut().push(());
                }
            });
        }

        let mut tree = editor.decoded_data().unwrap().clone();
        tree.set_field(2, vec![StructuralValue::scalar(Scalar::Int32(999))]);
        editor.update_decoded_data(tree).unwrap();

        assert_eq!(editor.state(), EditorState::Mutated);
        // 999 = 0xE7 0x07
        assert_eq!(
            editor.encoded_bytes().as_ref(),
            &[0x0A, 0x04, 0x4A, 0x6F, 0x68, 0x6E, 0x10, 0xE7, 0x07]
        );
        assert_eq!(editor.original_bytes().as_ref(), &JOHN[..]);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_oneof_last_set_member_wins() {
        let mut editor = loaded_editor();

        let mut tree = editor.decoded_data().unwrap().clone();
        tree.push_value(6, StructuralValue::scalar(Scalar::String("a@b".into())));
        tree.push_value(7, StructuralValue::scalar(Scalar::Uint64(123456)));
        editor.update_decoded_data(tree).unwrap();

        let tree = editor.decoded_data().unwrap();
        assert!(tree.get(6).is_none(), "email cleared by later phone");
        assert!(tree.get(7).is_some());
    }

    #[test]
    fn test_set_data_resets_both_buffers() {
        let mut editor = loaded_editor();
        let log = record_events(&mut editor);

        let other = [0x10, 0x2A]; // id = 42
        editor.set_data(&other).unwrap();

        assert_eq!(editor.state(), EditorState::Decoded);
        assert_eq!(editor.original_bytes().as_ref(), &other[..]);
        assert_eq!(editor.encoded_bytes().as_ref(), &other[..]);
        assert_eq!(log.borrow().as_slice(), &["change".to_string()]);
    }

    #[test]
    fn test_set_data_failure_leaves_previous_document() {
        let mut editor = loaded_editor();
        let log = record_events(&mut editor);

        let bad = [0x0A, 0x7F]; // claims 127 bytes of name
        assert!(editor.set_data(&bad).is_err());

        assert_eq!(editor.state(), EditorState::Decoded);
        assert_eq!(editor.original_bytes().as_ref(), &JOHN[..]);
        assert!(editor.decoded_data().is_some());
        assert!(log.borrow()[0].starts_with("error:"));
    }

    #[test]
    fn test_comments_survive_unrelated_mutation() {
        let descriptor = descriptor_set();
        // scores = 3: packed [1, 300]
        let bytes = [0x1A, 0x03, 0x01, 0xAC, 0x02, 0x0A, 0x01, 0x4A];
        let mut editor = Editor::new();
        editor
            .initialize(LoadRequest::new(&bytes, &descriptor).type_name("test.Person"))
            .unwrap();

        let path = FieldPath::from_pairs([(3, 1)]);
        editor
            .set_comments(
                path.clone(),
                vec![Comment {
                    path: path.clone(),
                    text: "sentinel".into(),
                    author: None,
                }],
            )
            .unwrap();

        let mut tree = editor.decoded_data().unwrap().clone();
        tree.set_field(1, vec![StructuralValue::scalar(Scalar::String("K".into()))]);
        editor.update_decoded_data(tree).unwrap();

        assert_eq!(editor.get_comments(&path).unwrap()[0].text, "sentinel");
    }

    #[test]
    fn test_remove_element_renumbers_comments() {
        let descriptor = descriptor_set();
        let bytes = [0x1A, 0x03, 0x01, 0xAC, 0x02]; // scores [1, 300]
        let mut editor = Editor::new();
        editor
            .initialize(LoadRequest::new(&bytes, &descriptor).type_name("test.Person"))
            .unwrap();

        let second = FieldPath::from_pairs([(3, 1)]);
        editor
            .set_comments(
                second.clone(),
                vec![Comment {
                    path: second.clone(),
                    text: "was index 1".into(),
                    author: None,
                }],
            )
            .unwrap();

        editor
            .remove_element(&FieldPath::from_pairs([(3, 0)]))
            .unwrap();

        // the comment followed its element down to index 0
        let first = FieldPath::from_pairs([(3, 0)]);
        assert_eq!(editor.get_comments(&first).unwrap()[0].text, "was index 1");
        assert_eq!(editor.decoded_data().unwrap().get_all(3).len(), 1);
        // 300 = 0xAC 0x02, re-packed
        assert_eq!(editor.encoded_bytes().as_ref(), &[0x1A, 0x02, 0xAC, 0x02]);
    }

    #[test]
    fn test_comment_path_errors_are_local() {
        let mut editor = loaded_editor();
        let log = record_events(&mut editor);

        let bogus = FieldPath::from_pairs([(9, 0)]);
        assert!(matches!(editor.get_comments(&bogus), Err(Error::Path(_))));
        assert!(matches!(
            editor.set_comments(bogus, vec![]),
            Err(Error::Path(_))
        ));

        // local failures: no events, editor untouched
        assert!(log.borrow().is_empty());
        assert_eq!(editor.state(), EditorState::Decoded);
    }

    #[test]
    fn test_presentation_data_seeds_comments() {
        let descriptor = descriptor_set();
        let presentation = br#"{
            "comments": [
                {"path": [{"field": 1, "index": 0}], "text": "display name", "author": "rk"}
            ]
        }"#;
        let mut editor = Editor::new();
        editor
            .initialize(
                LoadRequest::new(&JOHN, &descriptor)
                    .type_name("test.Person")
                    .presentation(presentation),
            )
            .unwrap();

        let path = FieldPath::from_pairs([(1, 0)]);
        let comments = editor.get_comments(&path).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author.as_deref(), Some("rk"));
    }

    #[test]
    fn test_enum_name_lookup() {
        let editor = loaded_editor();
        assert_eq!(editor.enum_name("test.Color", 1), Some("RED"));
        assert_eq!(editor.enum_name("test.Color", 9), None);
        assert_eq!(editor.enum_name("test.Missing", 0), None);
    }

    #[test]
    fn test_listeners_dispatch_in_registration_order() {
        let mut editor = loaded_editor();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let sink = Rc::clone(&log);
            editor.subscribe(move |_| sink.borrow_mut().push(tag));
        }

        editor.set_data(&[0x10, 0x01]).unwrap();
        assert_eq!(log.borrow().as_slice(), &["first", "second", "third"]);
    }

    #[test]
    fn test_hex_view_layout() {
        let editor = loaded_editor();
        let view = editor.hex_view(BufferOrigin::Original);
        assert_eq!(
            view,
            "00000000  0a 04 4a 6f 68 6e 10 7b                           |..John.{|\n"
        );
        // unmodified document: both views agree
        assert_eq!(view, editor.hex_view(BufferOrigin::Encoded));
    }

    #[test]
    fn test_hex_view_multirow() {
        let descriptor = descriptor_set();
        let bytes: Vec<u8> = [0x0A, 0x12]
            .iter()
            .copied()
            .chain((b'a'..=b'r').collect::<Vec<u8>>())
            .collect();
        let mut editor = Editor::new();
        editor
            .initialize(LoadRequest::new(&bytes, &descriptor).type_name("test.Person"))
            .unwrap();

        let view = editor.hex_view(BufferOrigin::Original);
        let lines: Vec<&str> = view.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  "));
        assert!(lines[1].starts_with("00000010  "));
    }

    #[test]
    fn test_mutation_before_load_fails() {
        let mut editor = Editor::new();
        assert!(editor.set_data(&[]).is_err());
        assert!(editor.set_current_type("test.Person").is_err());
        assert!(editor
            .update_decoded_data(MessageValue::new("test.Person"))
            .is_err());
    }
}
