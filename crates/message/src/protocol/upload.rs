//! Uploaded files and the tree builder that normalizes upload descriptions.
//!
//! An upload description is the loosely-shaped structure a server hands over
//! for `multipart/form-data` uploads. Under every key it holds one of:
//!
//! - a single file: `{"name": "a.png", "type": "image/png", "tmp_name": "/tmp/x", "error": 0, "size": 12}`
//! - a parallel-array batch: `{"name": ["a", "b"], "type": [..], "tmp_name": [..], ..}`
//! - a nested group of further keys, e.g. `{"user": {"avatar": {..single..}}}`
//!
//! [`UploadedFiles::parse`] classifies each entry once, then builds a tree of
//! [`UploadedFileNode`]s whose shape mirrors the input keys. Batches become
//! branches keyed by index.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{info, trace};

use crate::protocol::stream::Stream;
use crate::protocol::{InvalidInput, ResourceFault};

/// Status code reported for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadErrorCode {
    /// The file uploaded successfully.
    #[default]
    Ok,
    /// The file exceeds the server-side size limit.
    IniSize,
    /// The file exceeds the size limit given by the form.
    FormSize,
    /// The file was only partially uploaded.
    Partial,
    /// No file was uploaded.
    NoFile,
    /// Missing temporary folder.
    NoTmpDir,
    /// Failed to write the file to disk.
    CantWrite,
    /// An extension stopped the upload.
    Extension,
    Other(u16),
}

impl UploadErrorCode {
    pub fn code(self) -> u16 {
        match self {
            UploadErrorCode::Ok => 0,
            UploadErrorCode::IniSize => 1,
            UploadErrorCode::FormSize => 2,
            UploadErrorCode::Partial => 3,
            UploadErrorCode::NoFile => 4,
            UploadErrorCode::NoTmpDir => 6,
            UploadErrorCode::CantWrite => 7,
            UploadErrorCode::Extension => 8,
            UploadErrorCode::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == UploadErrorCode::Ok
    }
}

impl From<u16> for UploadErrorCode {
    fn from(code: u16) -> Self {
        match code {
            0 => UploadErrorCode::Ok,
            1 => UploadErrorCode::IniSize,
            2 => UploadErrorCode::FormSize,
            3 => UploadErrorCode::Partial,
            4 => UploadErrorCode::NoFile,
            6 => UploadErrorCode::NoTmpDir,
            7 => UploadErrorCode::CantWrite,
            8 => UploadErrorCode::Extension,
            other => UploadErrorCode::Other(other),
        }
    }
}

/// A single uploaded file.
///
/// Clones share the moved flag: once any clone has been moved, stream and
/// move access fail for all of them.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    client_filename: Option<String>,
    client_media_type: Option<String>,
    tmp_name: PathBuf,
    size: Option<u64>,
    error: UploadErrorCode,
    genuine: bool,
    moved: Arc<AtomicBool>,
}

impl UploadedFile {
    /// Creates a descriptor for a file that did not arrive through a request
    /// context. Such a descriptor can be streamed but not moved.
    pub fn new<P: Into<PathBuf>>(
        tmp_name: P,
        size: Option<u64>,
        error: UploadErrorCode,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Self {
        Self {
            client_filename,
            client_media_type,
            tmp_name: tmp_name.into(),
            size,
            error,
            genuine: false,
            moved: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn into_genuine(mut self) -> Self {
        self.genuine = true;
        self
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    pub fn tmp_name(&self) -> &Path {
        &self.tmp_name
    }

    /// Returns true if the descriptor was built from a request context.
    pub fn is_genuine_upload(&self) -> bool {
        self.genuine
    }

    pub fn is_moved(&self) -> bool {
        self.moved.load(Ordering::Acquire)
    }

    fn display_name(&self) -> String {
        match &self.client_filename {
            Some(name) => name.clone(),
            None => self.tmp_name.display().to_string(),
        }
    }

    /// Opens a read-only stream over the temporary file.
    pub fn stream(&self) -> Result<Stream, ResourceFault> {
        if self.is_moved() {
            return Err(ResourceFault::AlreadyMoved { name: self.display_name() });
        }

        let tmp_name = self.tmp_name.to_string_lossy();
        Stream::open(&tmp_name, "r")
    }

    /// Moves the temporary file to `target_path`. Succeeds at most once.
    pub fn move_to<P: AsRef<Path>>(&self, target_path: P) -> Result<(), ResourceFault> {
        let target = target_path.as_ref();
        let name = self.display_name();

        if !self.error.is_ok() {
            return Err(ResourceFault::UploadFailed { name, code: self.error.code() });
        }

        if self.is_moved() {
            return Err(ResourceFault::AlreadyMoved { name });
        }

        if !self.genuine || !self.tmp_name.is_file() {
            return Err(ResourceFault::NotUploaded { name });
        }

        if self.moved.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(ResourceFault::AlreadyMoved { name });
        }

        if let Err(e) = move_file(&self.tmp_name, target) {
            self.moved.store(false, Ordering::Release);
            return Err(ResourceFault::moving(name, target, e));
        }

        info!(file = %name, target = %target.display(), "moved uploaded file");
        Ok(())
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        result => result,
    }
}

/// A node of the uploaded-file tree.
#[derive(Debug, Clone)]
pub enum UploadedFileNode {
    File(UploadedFile),
    Branch(UploadedFiles),
}

impl UploadedFileNode {
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            UploadedFileNode::File(file) => Some(file),
            UploadedFileNode::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&UploadedFiles> {
        match self {
            UploadedFileNode::Branch(branch) => Some(branch),
            UploadedFileNode::File(_) => None,
        }
    }
}

/// Ordered tree of uploaded files keyed by form field name.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    nodes: IndexMap<String, UploadedFileNode>,
}

impl UploadedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the tree from an upload description. Descriptors built this way
    /// are not treated as genuine uploads.
    pub fn parse(description: &Value) -> Self {
        Self::build(description, false)
    }

    pub(crate) fn build(description: &Value, genuine: bool) -> Self {
        match description {
            Value::Object(items) => parse_group(items, genuine),
            Value::Null => Self::default(),
            other => {
                trace!(found = %other, "upload description is not a group, ignored");
                Self::default()
            }
        }
    }

    /// Converts a loosely-shaped entry tree, failing on the first leaf that is
    /// not an uploaded file. Leaves are visited depth-first.
    pub fn try_from_entries(entries: IndexMap<String, UploadEntry>) -> Result<Self, InvalidInput> {
        let mut path = Vec::new();
        convert_group(entries, &mut path)
    }

    pub fn get(&self, key: &str) -> Option<&UploadedFileNode> {
        self.nodes.get(key)
    }

    /// Follows `keys` from the root, e.g. `["form", "user", "files", "0"]`.
    pub fn get_path<S: AsRef<str>>(&self, keys: &[S]) -> Option<&UploadedFileNode> {
        let (first, rest) = keys.split_first()?;
        let mut node = self.nodes.get(first.as_ref())?;
        for key in rest {
            node = node.as_branch()?.nodes.get(key.as_ref())?;
        }
        Some(node)
    }

    /// Looks up the file at `keys`, if the path ends at a leaf.
    pub fn file<S: AsRef<str>>(&self, keys: &[S]) -> Option<&UploadedFile> {
        self.get_path(keys)?.as_file()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: UploadedFileNode) {
        self.nodes.insert(key.into(), node);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UploadedFileNode)> {
        self.nodes.iter()
    }

    /// Every file in the tree, depth-first in key order.
    pub fn leaves(&self) -> Vec<&UploadedFile> {
        let mut leaves = Vec::new();
        collect_leaves(self, &mut leaves);
        leaves
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn collect_leaves<'a>(files: &'a UploadedFiles, leaves: &mut Vec<&'a UploadedFile>) {
    for node in files.nodes.values() {
        match node {
            UploadedFileNode::File(file) => leaves.push(file),
            UploadedFileNode::Branch(branch) => collect_leaves(branch, leaves),
        }
    }
}

impl FromIterator<(String, UploadedFileNode)> for UploadedFiles {
    fn from_iter<T: IntoIterator<Item = (String, UploadedFileNode)>>(iter: T) -> Self {
        Self { nodes: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a UploadedFiles {
    type Item = (&'a String, &'a UploadedFileNode);
    type IntoIter = indexmap::map::Iter<'a, String, UploadedFileNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Shape of one entry of an upload description.
enum Shape<'a> {
    /// `name`, `type` and `tmp_name` are parallel composites with the same keys.
    Batch(BatchFields<'a>),
    /// `name`, `type` and `tmp_name` are all strings.
    Single(BatchFields<'a>),
    Nested,
}

#[derive(Clone, Copy)]
struct BatchFields<'a> {
    name: &'a Value,
    media_type: &'a Value,
    tmp_name: &'a Value,
    error: Option<&'a Value>,
    size: Option<&'a Value>,
}

impl<'a> BatchFields<'a> {
    fn from_item(item: &'a Map<String, Value>) -> Option<Self> {
        Some(Self {
            name: item.get("name")?,
            media_type: item.get("type")?,
            tmp_name: item.get("tmp_name")?,
            error: item.get("error"),
            size: item.get("size"),
        })
    }

    fn is_parallel(&self) -> bool {
        match (keys_of(self.name), keys_of(self.media_type), keys_of(self.tmp_name)) {
            (Some(names), Some(types), Some(tmp_names)) => same_keys(&names, &types) && same_keys(&names, &tmp_names),
            _ => false,
        }
    }

    fn is_single(&self) -> bool {
        self.name.is_string() && self.media_type.is_string() && self.tmp_name.is_string()
    }

    fn at(&self, index: &str) -> Option<Self> {
        Some(Self {
            name: child(self.name, index)?,
            media_type: child(self.media_type, index)?,
            tmp_name: child(self.tmp_name, index)?,
            error: self.error.and_then(|error| child(error, index)),
            size: self.size.and_then(|size| child(size, index)),
        })
    }

    fn to_file(self, genuine: bool) -> UploadedFile {
        let file = UploadedFile::new(
            self.tmp_name.as_str().unwrap_or_default(),
            self.size.and_then(as_u64),
            self.error.and_then(as_u64).and_then(|code| u16::try_from(code).ok()).map_or(UploadErrorCode::Ok, UploadErrorCode::from),
            self.name.as_str().map(str::to_owned),
            self.media_type.as_str().map(str::to_owned),
        );
        if genuine { file.into_genuine() } else { file }
    }
}

fn classify(item: &Map<String, Value>) -> Shape<'_> {
    match BatchFields::from_item(item) {
        Some(fields) if fields.is_parallel() => Shape::Batch(fields),
        Some(fields) if fields.is_single() => Shape::Single(fields),
        _ => Shape::Nested,
    }
}

fn parse_group(items: &Map<String, Value>, genuine: bool) -> UploadedFiles {
    let mut files = UploadedFiles::new();

    for (key, item) in items {
        let Value::Object(item) = item else {
            trace!(key = %key, "upload entry is not a group, skipped");
            continue;
        };

        let node = match classify(item) {
            Shape::Batch(fields) => UploadedFileNode::Branch(parse_batch(fields, genuine)),
            Shape::Single(fields) => UploadedFileNode::File(fields.to_file(genuine)),
            Shape::Nested => UploadedFileNode::Branch(parse_group(item, genuine)),
        };
        files.insert(key.clone(), node);
    }

    files
}

fn parse_batch(fields: BatchFields<'_>, genuine: bool) -> UploadedFiles {
    let mut files = UploadedFiles::new();

    for index in keys_of(fields.name).unwrap_or_default() {
        let Some(entry) = fields.at(&index) else {
            trace!(index = %index, "upload batch entry is incomplete, skipped");
            continue;
        };

        if entry.is_parallel() {
            files.insert(index, UploadedFileNode::Branch(parse_batch(entry, genuine)));
        } else if entry.is_single() {
            files.insert(index, UploadedFileNode::File(entry.to_file(genuine)));
        } else {
            trace!(index = %index, "upload batch entry has mixed shapes, skipped");
        }
    }

    files
}

fn keys_of(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Object(map) => Some(map.keys().cloned().collect()),
        Value::Array(items) => Some((0..items.len()).map(|index| index.to_string()).collect()),
        _ => None,
    }
}

fn same_keys(left: &[String], right: &[String]) -> bool {
    left.len() == right.len() && left.iter().all(|key| right.contains(key))
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Loosely-shaped input for replacing the uploaded-file tree of a request.
#[derive(Debug, Clone)]
pub enum UploadEntry {
    File(UploadedFile),
    Group(IndexMap<String, UploadEntry>),
    /// Anything else; composites are traversed, scalars are rejected.
    Value(Value),
}

impl From<UploadedFile> for UploadEntry {
    fn from(file: UploadedFile) -> Self {
        UploadEntry::File(file)
    }
}

impl From<Value> for UploadEntry {
    fn from(value: Value) -> Self {
        UploadEntry::Value(value)
    }
}

impl From<UploadedFiles> for UploadEntry {
    fn from(files: UploadedFiles) -> Self {
        UploadEntry::Group(
            files
                .nodes
                .into_iter()
                .map(|(key, node)| {
                    let entry = match node {
                        UploadedFileNode::File(file) => UploadEntry::File(file),
                        UploadedFileNode::Branch(branch) => UploadEntry::from(branch),
                    };
                    (key, entry)
                })
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, UploadEntry)> for UploadEntry {
    fn from_iter<T: IntoIterator<Item = (K, UploadEntry)>>(iter: T) -> Self {
        UploadEntry::Group(iter.into_iter().map(|(key, entry)| (key.into(), entry)).collect())
    }
}

struct KeyPath<'a>(&'a [String]);

impl fmt::Display for KeyPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((first, rest)) = self.0.split_first() else {
            return Ok(());
        };
        f.write_str(first)?;
        for key in rest {
            write!(f, "[{key}]")?;
        }
        Ok(())
    }
}

fn convert_group(entries: IndexMap<String, UploadEntry>, path: &mut Vec<String>) -> Result<UploadedFiles, InvalidInput> {
    let mut files = UploadedFiles::new();
    for (key, entry) in entries {
        path.push(key.clone());
        let node = convert_entry(entry, path)?;
        path.pop();
        files.insert(key, node);
    }
    Ok(files)
}

fn convert_entry(entry: UploadEntry, path: &mut Vec<String>) -> Result<UploadedFileNode, InvalidInput> {
    match entry {
        UploadEntry::File(file) => Ok(UploadedFileNode::File(file)),
        UploadEntry::Group(group) => convert_group(group, path).map(UploadedFileNode::Branch),
        UploadEntry::Value(value) => {
            let children: IndexMap<String, UploadEntry> = match value {
                Value::Object(map) => map.into_iter().map(|(key, value)| (key, UploadEntry::Value(value))).collect(),
                Value::Array(items) => {
                    items.into_iter().enumerate().map(|(index, value)| (index.to_string(), UploadEntry::Value(value))).collect()
                }
                _ => return Err(InvalidInput::invalid_upload_tree(KeyPath(path))),
            };
            convert_group(children, path).map(UploadedFileNode::Branch)
        }
    }
}
