//! Node file format
//!
//! Each node is persisted as a markdown file: a YAML front matter block
//! holding the node's fields, followed by the description as the body.
//!
//! ```text
//! ---
//! id: 6f1c...
//! title: Carbon capture
//! parentId: 0a3e...
//! childrenIds: []
//! setMetrics:
//!   readinessLevel: 5.0
//! calculatedMetrics:
//!   readinessLevel: 5.0
//! ---
//!
//! Long-form description.
//! ```
//!
//! The node type is not stored in the file; it is the name of the directory
//! the file lives in.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

use crate::metrics::{calculate_metrics, merge_metrics};
use crate::models::{Metadata, MetricMap, MetricsPatch, Node, NodeType};

const FRONT_MATTER_FENCE: &str = "---";
const MAX_FILE_NAME_LEN: usize = 64;
const FALLBACK_FILE_NAME: &str = "untitled";

// Characters kept in file names
const UNSAFE_CHARS_PATTERN: &str = r"[^A-Za-z0-9 _-]";
const WHITESPACE_PATTERN: &str = r"\s+";

/// Front matter as read from disk; every field is optional so that partial
/// records can be healed instead of rejected.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrontMatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,

    #[serde(default)]
    parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    children_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    set_metrics: MetricsPatch,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    calculated_metrics: Option<MetricMap>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: Metadata,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    draft: bool,
}

/// A node parsed from a file, with a flag telling whether anything had to be
/// repaired (and the file therefore needs rewriting)
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub node: Node,
    pub healed: bool,
}

/// Parse a node file
///
/// Never fails. Missing fields are filled in (`id` generated, `title` from
/// the file stem, `childrenIds` empty); a file whose front matter is missing
/// or unparseable becomes a fresh node whose description is the whole file.
pub fn parse_node_file(node_type: NodeType, file_stem: &str, content: &str) -> ParsedRecord {
    let Some((yaml, body)) = split_front_matter(content) else {
        warn!(file_stem, "node file has no front matter");
        return from_raw_text(node_type, file_stem, content);
    };

    let front: FrontMatter = match serde_yaml::from_str::<Option<FrontMatter>>(yaml) {
        Ok(front) => front.unwrap_or_default(),
        Err(err) => {
            warn!(file_stem, error = %err, "unparseable front matter");
            return from_raw_text(node_type, file_stem, content);
        }
    };

    let mut healed = false;
    let id = front.id.filter(|id| !id.is_empty()).unwrap_or_else(|| {
        healed = true;
        Uuid::new_v4().to_string()
    });
    let title = front.title.unwrap_or_else(|| {
        healed = true;
        file_stem.to_string()
    });
    let children_ids = front.children_ids.unwrap_or_else(|| {
        healed = true;
        Vec::new()
    });
    let set_metrics = merge_metrics(&MetricMap::new(), &front.set_metrics);
    if set_metrics.len() != front.set_metrics.len() {
        healed = true;
    }
    let calculated_metrics = front.calculated_metrics.unwrap_or_else(|| {
        healed = true;
        calculate_metrics(&set_metrics, std::iter::empty::<&MetricMap>())
    });

    let mut node = Node::new_with_id(id, node_type, title);
    node.description = (!body.is_empty()).then(|| body.to_string());
    node.parent_id = front.parent_id.filter(|parent_id| !parent_id.is_empty());
    node.children_ids = children_ids;
    node.set_metrics = set_metrics;
    node.calculated_metrics = calculated_metrics;
    node.metadata = front.metadata;
    node.draft = front.draft;

    if healed {
        warn!(node_id = %node.id, file_stem, "healed node record");
    }
    ParsedRecord { node, healed }
}

fn from_raw_text(node_type: NodeType, file_stem: &str, content: &str) -> ParsedRecord {
    let mut node = Node::new(node_type, file_stem.to_string());
    let text = content.trim();
    node.description = (!text.is_empty()).then(|| text.to_string());
    ParsedRecord { node, healed: true }
}

/// Split `content` into front matter YAML and body
///
/// The body starts after the closing fence; one blank separator line and one
/// trailing newline are stripped.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix(FRONT_MATTER_FENCE)?
        .strip_prefix('\n')
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let (yaml, after) = if let Some(after) = rest.strip_prefix(FRONT_MATTER_FENCE) {
        ("", after)
    } else {
        let end = rest.find("\n---")?;
        (&rest[..end + 1], &rest[end + 4..])
    };

    // The fence must end its line
    let body = match after.strip_prefix("\r\n").or_else(|| after.strip_prefix('\n')) {
        Some(body) => body,
        None if after.is_empty() => after,
        None => return None,
    };
    let body = body.strip_prefix('\n').unwrap_or(body);
    let body = body.strip_suffix('\n').unwrap_or(body);
    Some((yaml, body))
}

/// Render a node to its file contents
///
/// # Errors
///
/// Returns the YAML error if the front matter cannot be serialized.
pub fn render_node_file(node: &Node) -> Result<String, serde_yaml::Error> {
    let front = FrontMatter {
        id: Some(node.id.clone()),
        title: Some(node.title.clone()),
        parent_id: node.parent_id.clone(),
        children_ids: Some(node.children_ids.clone()),
        set_metrics: node
            .set_metrics
            .iter()
            .map(|(metric, value)| (*metric, Some(*value)))
            .collect(),
        calculated_metrics: Some(node.calculated_metrics.clone()),
        metadata: node.metadata.clone(),
        draft: node.draft,
    };

    let yaml = serde_yaml::to_string(&front)?;
    let mut out = format!("{FRONT_MATTER_FENCE}\n{yaml}{FRONT_MATTER_FENCE}\n");
    if let Some(description) = node.description.as_deref().filter(|d| !d.is_empty()) {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }
    Ok(out)
}

/// File name (without extension) derived from a node title
///
/// Keeps ASCII letters, digits, space, `_` and `-`, collapses whitespace and
/// caps the length. Titles with nothing usable fall back to `untitled`.
pub fn sanitize_title(title: &str) -> String {
    static UNSAFE_REGEX: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
    let unsafe_regex = UNSAFE_REGEX.get_or_init(|| Regex::new(UNSAFE_CHARS_PATTERN).unwrap());
    let whitespace_regex =
        WHITESPACE_REGEX.get_or_init(|| Regex::new(WHITESPACE_PATTERN).unwrap());

    let cleaned = unsafe_regex.replace_all(title, "");
    let collapsed = whitespace_regex.replace_all(&cleaned, " ");
    let mut name = collapsed.trim().to_string();
    name.truncate(MAX_FILE_NAME_LEN);
    let name = name.trim_end();

    if name.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}
