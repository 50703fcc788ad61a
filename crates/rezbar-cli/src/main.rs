//! rezbar - Inspect and edit Protocol Buffer wire data against a compiled
//! descriptor
//!
//! This tool decodes a wire-format data file with a compiled descriptor
//! set and renders the result as a field tree, a hex dump, the list of
//! decodable message types, or a round-trip diff summary.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rezbar_core::{
    encode_message, BufferOrigin, Comment, Editor, FieldPath, LoadRequest, MessageValue,
    StructuralValue,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;

/// Name of the config artifact searched for in parent directories
const CONFIG_FILE_NAME: &str = "rezbar.json";

/// Inspect and edit Protocol Buffer wire data against a compiled descriptor
#[derive(Parser, Debug)]
#[command(name = "rezbar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the wire-format data file
    #[arg(short, long)]
    file: PathBuf,

    /// Path to the compiled descriptor set (protoc --descriptor_set_out)
    #[arg(short, long)]
    descriptor: Option<PathBuf>,

    /// Root message type to decode as (defaults to the descriptor's last
    /// message type)
    #[arg(short = 't', long)]
    message_type: Option<String>,

    /// Path to a presentation-data file seeding comments
    #[arg(short, long)]
    presentation: Option<PathBuf>,

    /// What to render
    #[arg(long, value_enum, default_value = "tree")]
    show: ShowFormat,

    /// Which buffer hex output addresses
    #[arg(long, value_enum, default_value = "original")]
    origin: Origin,

    /// Skip config discovery in parent directories
    #[arg(long)]
    no_config: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShowFormat {
    /// Decoded field tree with comments
    Tree,
    /// Hex dump of one buffer
    Hex,
    /// Message types available for decoding
    Types,
    /// Round-trip summary: original vs re-encoded bytes
    Diff,
}

/// Buffer selector for hex output
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Origin {
    /// The bytes the document was loaded from
    Original,
    /// The re-encoded current bytes
    Encoded,
}

impl From<Origin> for BufferOrigin {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Original => BufferOrigin::Original,
            Origin::Encoded => BufferOrigin::Encoded,
        }
    }
}

/// One data-file entry in a discovered config artifact
#[derive(Debug, Clone, Deserialize)]
struct ConfigEntry {
    /// Descriptor path, relative to the config file's directory
    descriptor: String,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    presentation: Option<String>,
}

/// The config artifact: data file name -> load inputs
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    files: HashMap<String, ConfigEntry>,
}

/// Load inputs after flag/config resolution
#[derive(Debug)]
struct ResolvedInputs {
    descriptor: PathBuf,
    message_type: Option<String>,
    presentation: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    if !cli.file.is_file() {
        bail!("Input file does not exist: {}", cli.file.display());
    }

    let inputs = resolve_inputs(cli)?;

    trace!("Reading {}", cli.file.display());
    let data = fs::read(&cli.file)
        .with_context(|| format!("Failed to read data file: {}", cli.file.display()))?;
    let descriptor = fs::read(&inputs.descriptor).with_context(|| {
        format!("Failed to read descriptor: {}", inputs.descriptor.display())
    })?;
    let presentation = match &inputs.presentation {
        Some(path) => Some(fs::read(path).with_context(|| {
            format!("Failed to read presentation data: {}", path.display())
        })?),
        None => None,
    };

    let mut request = LoadRequest::new(&data, &descriptor);
    if let Some(name) = inputs.message_type.as_deref() {
        request = request.type_name(name);
    }
    if let Some(bytes) = presentation.as_deref() {
        request = request.presentation(bytes);
    }

    let mut editor = Editor::new();
    editor
        .initialize(request)
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;

    debug!(
        "Loaded {} bytes as {}",
        data.len(),
        editor.current_type().unwrap_or("?")
    );

    let output = match cli.show {
        ShowFormat::Tree => render_tree(&editor),
        ShowFormat::Hex => editor.hex_view(cli.origin.into()),
        ShowFormat::Types => render_types(&editor),
        ShowFormat::Diff => render_diff(&editor)?,
    };
    print!("{}", output);

    Ok(())
}

/// Resolve descriptor/type/presentation from flags, falling back to a
/// discovered config artifact. Explicit flags always win.
fn resolve_inputs(cli: &Cli) -> Result<ResolvedInputs> {
    let discovered = if cli.no_config {
        None
    } else {
        discover_config(&cli.file)
    };

    let (config_dir, entry) = match discovered {
        Some((path, entry)) => {
            info!("Using config {}", path.display());
            (Some(path.parent().expect("config file has a parent").to_path_buf()), Some(entry))
        }
        None => (None, None),
    };

    let resolve = |relative: &str| -> PathBuf {
        match &config_dir {
            Some(dir) => dir.join(relative),
            None => PathBuf::from(relative),
        }
    };

    let descriptor = match (&cli.descriptor, &entry) {
        (Some(path), _) => path.clone(),
        (None, Some(entry)) => resolve(&entry.descriptor),
        (None, None) => bail!(
            "No descriptor given: pass --descriptor or add '{}' to a parent directory of {}",
            CONFIG_FILE_NAME,
            cli.file.display()
        ),
    };

    let message_type = cli
        .message_type
        .clone()
        .or_else(|| entry.as_ref().and_then(|e| e.message_type.clone()));

    let presentation = cli.presentation.clone().or_else(|| {
        entry
            .as_ref()
            .and_then(|e| e.presentation.as_deref().map(resolve))
    });

    Ok(ResolvedInputs {
        descriptor,
        message_type,
        presentation,
    })
}

/// Search the data file's directory and its ancestors for a config
/// artifact carrying an entry for this file name
fn discover_config(data_file: &Path) -> Option<(PathBuf, ConfigEntry)> {
    let file_name = data_file.file_name()?.to_str()?.to_string();
    let start = data_file.parent()?;

    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if !candidate.is_file() {
            continue;
        }
        trace!("Inspecting config candidate {}", candidate.display());

        let config: ConfigFile = match fs::read(&candidate)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        {
            Some(config) => config,
            None => {
                debug!("Ignoring unreadable config {}", candidate.display());
                continue;
            }
        };

        if let Some(entry) = config.files.get(&file_name) {
            return Some((candidate, entry.clone()));
        }
        // A config without an entry for this file does not stop the search
    }

    None
}

/// Short content hash for labeling buffers (first 8 chars of blake3)
fn short_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex()[..8].to_string()
}

/// Render the decoded tree with field names, enum names and comments
fn render_tree(editor: &Editor) -> String {
    let mut out = String::new();
    let Some(tree) = editor.decoded_data() else {
        return out;
    };

    writeln!(out, "{}", tree.type_name).expect("String write cannot fail");
    render_message(editor, tree, &FieldPath::root(), 1, &mut out);
    out
}

fn render_message(
    editor: &Editor,
    msg: &MessageValue,
    path: &FieldPath,
    depth: usize,
    out: &mut String,
) {
    let layout = editor
        .registry()
        .and_then(|r| r.message(&msg.type_name));
    let indent = "  ".repeat(depth);

    for (number, values) in msg.fields() {
        let label = layout
            .and_then(|l| l.field(number))
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "?".to_string());

        for (index, value) in values.iter().enumerate() {
            let mut node_path = path.clone();
            node_path.0.push(rezbar_core::PathSegment::new(number, index));

            let slot = if values.len() > 1 {
                format!("{} ({})[{}]", label, number, index)
            } else {
                format!("{} ({})", label, number)
            };

            match value {
                StructuralValue::Primitive(p) => {
                    writeln!(out, "{}{}: {}", indent, slot, p.scalar)
                }
                StructuralValue::Enum(e) => {
                    let name = editor
                        .enum_name(&e.type_name, e.number)
                        .unwrap_or("<unknown value>");
                    writeln!(out, "{}{}: {} ({})", indent, slot, name, e.number)
                }
                StructuralValue::Bytes(b) => {
                    writeln!(out, "{}{}: {}", indent, slot, format_bytes(&b.data))
                }
                StructuralValue::Unknown(u) => writeln!(
                    out,
                    "{}{}: unknown {:?} {}",
                    indent,
                    slot,
                    u.wire_type,
                    format_bytes(&u.raw)
                ),
                StructuralValue::Message(nested) => {
                    writeln!(out, "{}{}: {}", indent, slot, nested.type_name)
                }
            }
            .expect("String write cannot fail");

            render_comments(editor, &node_path, depth + 1, out);
            if let StructuralValue::Message(nested) = value {
                render_message(editor, nested, &node_path, depth + 1, out);
            }
        }
    }
}

fn render_comments(editor: &Editor, path: &FieldPath, depth: usize, out: &mut String) {
    for Comment { text, author, .. } in editor.comment_store().get_comments(path) {
        let indent = "  ".repeat(depth);
        match author {
            Some(author) => writeln!(out, "{}# {} — {}", indent, text, author),
            None => writeln!(out, "{}# {}", indent, text),
        }
        .expect("String write cannot fail");
    }
}

/// Hex-format a byte string, truncated for display
fn format_bytes(data: &[u8]) -> String {
    let shown: Vec<String> = data.iter().take(16).map(|b| format!("{:02x}", b)).collect();
    if data.len() > 16 {
        format!("{}… ({} bytes)", shown.join(" "), data.len())
    } else {
        format!("{} ({} bytes)", shown.join(" "), data.len())
    }
}

/// Render the type list, marking the current decoding root
fn render_types(editor: &Editor) -> String {
    let mut out = String::new();
    let current = editor.current_type();

    for name in editor.available_types() {
        let marker = if Some(name.as_str()) == current {
            "* "
        } else {
            "  "
        };
        writeln!(out, "{}{}", marker, name).expect("String write cannot fail");
    }
    out
}

/// Render a round-trip summary of original vs re-encoded bytes
fn render_diff(editor: &Editor) -> Result<String> {
    let tree = editor
        .decoded_data()
        .context("No decoded tree to re-encode")?;
    let original = editor.original_bytes();
    let reencoded = encode_message(tree)?;

    let mut out = String::new();
    writeln!(
        out,
        "original:   {} bytes  blake3:{}",
        original.len(),
        short_hash(&original)
    )?;
    writeln!(
        out,
        "re-encoded: {} bytes  blake3:{}",
        reencoded.len(),
        short_hash(&reencoded)
    )?;
    writeln!(
        out,
        "byte-identical: {}",
        if original.as_ref() == reencoded.as_slice() {
            "yes"
        } else {
            "no"
        }
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) {
        fs::write(dir.join(CONFIG_FILE_NAME), body).unwrap();
    }

    #[test]
    fn test_discover_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("captures/session1");
        fs::create_dir_all(&nested).unwrap();

        write_config(
            temp.path(),
            r#"{"files": {"dump.bin": {"descriptor": "schemas/api.desc", "message_type": "api.Envelope"}}}"#,
        );
        let data_file = nested.join("dump.bin");
        fs::write(&data_file, b"").unwrap();

        let (config_path, entry) = discover_config(&data_file).unwrap();
        assert_eq!(config_path, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(entry.descriptor, "schemas/api.desc");
        assert_eq!(entry.message_type.as_deref(), Some("api.Envelope"));
        assert_eq!(entry.presentation, None);
    }

    #[test]
    fn test_discover_config_prefers_nearest_matching() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("inner");
        fs::create_dir_all(&nested).unwrap();

        // the nearer config has no entry for this file and must be skipped
        write_config(&nested, r#"{"files": {"other.bin": {"descriptor": "x.desc"}}}"#);
        write_config(
            temp.path(),
            r#"{"files": {"dump.bin": {"descriptor": "y.desc"}}}"#,
        );

        let data_file = nested.join("dump.bin");
        fs::write(&data_file, b"").unwrap();

        let (config_path, entry) = discover_config(&data_file).unwrap();
        assert_eq!(config_path, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(entry.descriptor, "y.desc");
    }

    #[test]
    fn test_discover_config_none_found() {
        let temp = TempDir::new().unwrap();
        let data_file = temp.path().join("dump.bin");
        fs::write(&data_file, b"").unwrap();
        // temp dirs live under the system temp root; no rezbar.json there
        assert!(discover_config(&data_file).is_none());
    }

    #[test]
    fn test_short_hash_is_stable() {
        let a = short_hash(b"hello");
        let b = short_hash(b"hello");
        let c = short_hash(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_format_bytes_truncates() {
        let short = format_bytes(&[0xDE, 0xAD]);
        assert_eq!(short, "de ad (2 bytes)");

        let long = format_bytes(&[0u8; 20]);
        assert!(long.contains("… (20 bytes)"));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
