//! File-backed node store
//!
//! Layout: `<root>/<type>/<file name>.md`, one file per node. The file name is
//! the sanitized title; when another node already owns that name the first
//! eight characters of the id are appended. Renaming a node moves its file.
//!
//! The store keeps an id → path index, rebuilt by every `read_all`, so that
//! renames and deletes find the existing file.
//!
//! A rename writes the new file before removing the old one. If the process
//! stops in between, the next `read_all` finds two files with the same id and
//! keeps only the current copy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::node_store::NodeStore;
use super::record::{parse_node_file, render_node_file, sanitize_title, ParsedRecord};
use crate::models::{Node, NodeType};
use crate::tree::NodeCollection;

const FILE_EXTENSION: &str = "md";
const ID_SUFFIX_LEN: usize = 8;

/// Store persisting each node as a markdown file with YAML front matter
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    paths: RwLock<HashMap<String, PathBuf>>,
}

impl FileStore {
    /// Create a store rooted at `root`
    ///
    /// The directory is created lazily on the first write.
    ///
    /// # Errors
    ///
    /// `StoreError::InvalidPath` if `root` is empty or names an existing file.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if root.as_os_str().is_empty() || root.is_file() {
            return Err(StoreError::invalid_path(root));
        }
        Ok(Self {
            root,
            paths: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file currently holding `node_id`, if known
    pub fn path_of(&self, node_id: &str) -> Result<Option<PathBuf>, StoreError> {
        Ok(self.paths.read()?.get(node_id).cloned())
    }

    fn type_dir(&self, node_type: NodeType) -> PathBuf {
        self.root.join(node_type.as_str())
    }

    /// Pick the path `node` should be written to
    ///
    /// Returns the target path and the node's previous path, if any.
    fn claim_path(&self, node: &Node) -> Result<(PathBuf, Option<PathBuf>), StoreError> {
        let paths = self.paths.read()?;
        let previous = paths.get(&node.id).cloned();

        let is_taken = |path: &Path| {
            let owned_by_other = paths
                .iter()
                .any(|(id, owned)| id != &node.id && owned.as_path() == path);
            owned_by_other || (previous.as_deref() != Some(path) && path.exists())
        };

        let dir = self.type_dir(node.node_type);
        let base = sanitize_title(&node.title);
        let preferred = dir.join(format!("{base}.{FILE_EXTENSION}"));
        if !is_taken(&preferred) {
            return Ok((preferred, previous));
        }

        let short_id: String = node.id.chars().take(ID_SUFFIX_LEN).collect();
        let suffixed = dir.join(format!("{base}-{short_id}.{FILE_EXTENSION}"));
        Ok((suffixed, previous))
    }

    async fn write_file(path: &Path, node: &Node) -> Result<(), StoreError> {
        let content = render_node_file(node).map_err(|e| StoreError::yaml(&node.id, e))?;
        fs::write(path, content)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn list_node_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_file())
                .unwrap_or(false);
            if is_file && path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl NodeStore for FileStore {
    async fn read_all(&self) -> Result<NodeCollection, StoreError> {
        let mut loaded: HashMap<String, LoadedFile> = HashMap::new();
        let mut healed_count = 0usize;

        for node_type in NodeType::ALL {
            for path in Self::list_node_files(&self.type_dir(node_type)).await? {
                let bytes = fs::read(&path).await.map_err(|e| StoreError::io(&path, e))?;
                let content = String::from_utf8_lossy(&bytes);
                let file_stem = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or_default();

                let ParsedRecord { node, healed } = parse_node_file(node_type, file_stem, &content);
                let modified = fs::metadata(&path)
                    .await
                    .ok()
                    .and_then(|metadata| metadata.modified().ok());
                let file = LoadedFile {
                    node,
                    path,
                    healed,
                    modified,
                };

                let Some(existing) = loaded.remove(&file.node.id) else {
                    loaded.insert(file.node.id.clone(), file);
                    continue;
                };

                // Two files with one id are the old and new copy of an interrupted rename
                let (kept, stale) = if file.supersedes(&existing) {
                    (file, existing)
                } else {
                    (existing, file)
                };
                warn!(
                    node_id = %kept.node.id,
                    kept = %kept.path.display(),
                    removed = %stale.path.display(),
                    "duplicate node file, removing stale copy"
                );
                remove_if_exists(&stale.path).await?;
                loaded.insert(kept.node.id.clone(), kept);
            }
        }

        let mut collection = NodeCollection::new();
        let mut index = HashMap::new();
        for file in loaded.into_values() {
            if file.healed {
                Self::write_file(&file.path, &file.node).await?;
                healed_count += 1;
            }
            index.insert(file.node.id.clone(), file.path);
            collection.insert(file.node);
        }

        *self.paths.write()? = index;
        info!(
            root = %self.root.display(),
            nodes = collection.len(),
            healed = healed_count,
            "loaded node files"
        );
        Ok(collection)
    }

    async fn write_node(&self, node: &Node) -> Result<(), StoreError> {
        let (path, previous) = self.claim_path(node)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(dir, e))?;
        }
        Self::write_file(&path, node).await?;

        if let Some(previous) = previous.filter(|previous| *previous != path) {
            remove_if_exists(&previous).await?;
            debug!(node_id = %node.id, from = %previous.display(), to = %path.display(), "moved node file");
        }

        self.paths.write()?.insert(node.id.clone(), path);
        Ok(())
    }

    async fn delete_node(&self, node: &Node) -> Result<(), StoreError> {
        let removed = self.paths.write()?.remove(&node.id);
        let Some(path) = removed else {
            debug!(node_id = %node.id, "no file to delete");
            return Ok(());
        };

        remove_if_exists(&path).await
    }
}

/// A parsed node file awaiting duplicate resolution
struct LoadedFile {
    node: Node,
    path: PathBuf,
    healed: bool,
    modified: Option<SystemTime>,
}

impl LoadedFile {
    /// Whether the file name is the one `write_node` would give this record
    fn matches_title(&self) -> bool {
        let Some(stem) = self.path.file_stem().and_then(|stem| stem.to_str()) else {
            return false;
        };
        let base = sanitize_title(&self.node.title);
        let short_id: String = self.node.id.chars().take(ID_SUFFIX_LEN).collect();
        stem == base || stem == format!("{base}-{short_id}")
    }

    /// Whether this copy should win over `other`, which holds the same id
    ///
    /// A file named after its own title wins over one that is not; otherwise
    /// the most recently modified file wins, then the first in path order.
    fn supersedes(&self, other: &LoadedFile) -> bool {
        match (self.matches_title(), other.matches_title()) {
            (true, false) => true,
            (false, true) => false,
            _ => match (self.modified, other.modified) {
                (Some(mine), Some(theirs)) if mine != theirs => mine > theirs,
                _ => self.path < other.path,
            },
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
