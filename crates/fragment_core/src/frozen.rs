//! Frozen snapshots: immutable, content-addressed captures of fragments.
//!
//! [`freeze`] evaluates a live fragment once (description, payload, syntax
//! style, referenced files) and records the metadata needed to rebuild it.
//! Snapshots are interned: for any set of content-defining fields at most one
//! [`FrozenFragment`] exists per [`InternPool`].

use crate::error::{FragmentError, Result};
use crate::files::{ExternalFile, FileRef, ProjectFile};
use crate::fragment::{
    CallGraphFragment, ContextFragment, ExternalPathFragment, Fragment, FragmentKind, GitFileFragment,
    ImageFileFragment, ProjectPathFragment, SkeletonFragment, SummaryType, UsageFragment,
};
use crate::hasher::{HashFields, PayloadRef};
use crate::ids::{ContentHash, FragmentId};
use crate::services::ContextServices;
use crate::symbols::{CallDirection, CodeUnit};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Metadata keys recorded for reconstruction.
pub mod meta {
    pub const REPO_ROOT: &str = "repo_root";
    pub const REL_PATH: &str = "rel_path";
    pub const ABS_PATH: &str = "abs_path";
    pub const IS_PROJECT_FILE: &str = "is_project_file";
    pub const REVISION: &str = "revision";
    pub const TARGET_IDENTIFIERS: &str = "target_identifiers";
    pub const SUMMARY_TYPE: &str = "summary_type";
    pub const TARGET_IDENTIFIER: &str = "target_identifier";
    pub const METHOD_NAME: &str = "method_name";
    pub const DEPTH: &str = "depth";
    pub const IS_CALLEE_GRAPH: &str = "is_callee_graph";
}

/// Text shown for the content of a frozen image.
pub const FROZEN_IMAGE_TEXT: &str = "[Image content]";

/// Captured content of a snapshot.
#[derive(Clone, PartialEq, Eq)]
pub enum FrozenPayload {
    Text(String),
    Image(Vec<u8>),
}

impl fmt::Debug for FrozenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrozenPayload::Text(text) => write!(f, "Text({} bytes)", text.len()),
            FrozenPayload::Image(bytes) => write!(f, "Image({} bytes)", bytes.len()),
        }
    }
}

/// Everything a snapshot records, before hashing.
#[derive(Debug, Clone)]
pub struct FrozenParts {
    pub original_kind: FragmentKind,
    pub description: String,
    pub short_description: String,
    pub payload: FrozenPayload,
    pub syntax_style: String,
    pub files: BTreeSet<ProjectFile>,
    pub meta: BTreeMap<String, String>,
}

impl FrozenParts {
    /// Content hash over the content-defining fields.
    pub fn content_hash(&self) -> ContentHash {
        let payload = match &self.payload {
            FrozenPayload::Text(text) => PayloadRef::Text(Some(text.as_str())),
            FrozenPayload::Image(bytes) => PayloadRef::Image(bytes.as_slice()),
        };
        HashFields {
            kind: self.original_kind,
            description: Some(self.description.as_str()),
            short_description: Some(self.short_description.as_str()),
            syntax_style: Some(self.syntax_style.as_str()),
            payload,
        }
        .digest(
            self.files.iter().map(|f| f.abs_path()),
            self.meta.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }
}

/// An immutable capture of one fragment.
pub struct FrozenFragment {
    hash: ContentHash,
    parts: FrozenParts,
}

impl FrozenFragment {
    pub fn content_hash(&self) -> ContentHash {
        self.hash
    }

    pub fn original_kind(&self) -> FragmentKind {
        self.parts.original_kind
    }

    pub fn payload(&self) -> &FrozenPayload {
        &self.parts.payload
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.parts.meta
    }

    pub fn parts(&self) -> &FrozenParts {
        &self.parts
    }

    fn require(&self, key: &'static str) -> Result<&str> {
        self.parts
            .meta
            .get(key)
            .map(String::as_str)
            .ok_or(FragmentError::MissingMetadata {
                variant: self.parts.original_kind,
                key,
            })
    }

    fn invalid(&self, key: &'static str, value: &str) -> FragmentError {
        FragmentError::InvalidMetadata {
            variant: self.parts.original_kind,
            key,
            value: value.to_string(),
        }
    }

    fn project_file(&self) -> Result<ProjectFile> {
        Ok(ProjectFile::new(self.require(meta::REPO_ROOT)?, self.require(meta::REL_PATH)?))
    }

    /// Rebuilds a live fragment from the recorded metadata.
    ///
    /// Dynamic variants come back with fresh ids. Content-fixed variants have
    /// no reconstruction rule and fail with `UnsupportedReconstruction`.
    pub fn unfreeze(&self, services: &ContextServices) -> Result<ContextFragment> {
        let kind = self.parts.original_kind;
        debug!(snapshot = %self.hash, kind = %kind, "Unfreezing snapshot");
        let live: ContextFragment = match kind {
            FragmentKind::ProjectPath => ProjectPathFragment::new(self.project_file()?, services).into(),
            FragmentKind::ExternalPath => {
                ExternalPathFragment::new(ExternalFile::new(self.require(meta::ABS_PATH)?), services).into()
            }
            FragmentKind::ImageFile => {
                let file = match self.parts.meta.get(meta::IS_PROJECT_FILE).map(String::as_str) {
                    Some("true") => FileRef::Project(self.project_file()?),
                    Some("false") | None => FileRef::External(ExternalFile::new(self.require(meta::ABS_PATH)?)),
                    Some(other) => return Err(self.invalid(meta::IS_PROJECT_FILE, other)),
                };
                ImageFileFragment::new(file, services).into()
            }
            FragmentKind::GitFile => {
                let content = match &self.parts.payload {
                    FrozenPayload::Text(text) => text.clone(),
                    FrozenPayload::Image(_) => {
                        return Err(FragmentError::InvalidRecord(format!(
                            "git snapshot {} has no text content",
                            self.hash
                        )))
                    }
                };
                GitFileFragment::new(self.project_file()?, self.require(meta::REVISION)?, content).into()
            }
            FragmentKind::Skeleton => {
                let raw_targets = self.require(meta::TARGET_IDENTIFIERS)?;
                let targets: Vec<String> = serde_json::from_str(raw_targets)
                    .map_err(|_| self.invalid(meta::TARGET_IDENTIFIERS, raw_targets))?;
                let raw = self.require(meta::SUMMARY_TYPE)?;
                let summary_type = SummaryType::parse(raw).ok_or_else(|| self.invalid(meta::SUMMARY_TYPE, raw))?;
                SkeletonFragment::new(targets, summary_type, services).into()
            }
            FragmentKind::Usage => UsageFragment::new(self.require(meta::TARGET_IDENTIFIER)?, services).into(),
            FragmentKind::CallGraph => {
                let method = self.require(meta::METHOD_NAME)?;
                let raw_depth = self.require(meta::DEPTH)?;
                let depth = raw_depth
                    .parse::<u32>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| self.invalid(meta::DEPTH, raw_depth))?;
                let raw_callee = self.require(meta::IS_CALLEE_GRAPH)?;
                let is_callee = raw_callee
                    .parse::<bool>()
                    .map_err(|_| self.invalid(meta::IS_CALLEE_GRAPH, raw_callee))?;
                CallGraphFragment::new(method, depth, CallDirection::from_callee_flag(is_callee), services).into()
            }
            FragmentKind::String
            | FragmentKind::Search
            | FragmentKind::History
            | FragmentKind::Task
            | FragmentKind::PasteText
            | FragmentKind::PasteImage
            | FragmentKind::Stacktrace => return Err(FragmentError::UnsupportedReconstruction(kind)),
        };
        Ok(live)
    }
}

impl Fragment for FrozenFragment {
    fn id(&self) -> FragmentId {
        FragmentId::Content(self.hash)
    }

    fn kind(&self) -> FragmentKind {
        self.parts.original_kind
    }

    fn description(&self) -> String {
        self.parts.description.clone()
    }

    fn short_description(&self) -> String {
        self.parts.short_description.clone()
    }

    fn text(&self) -> Result<String> {
        Ok(match &self.parts.payload {
            FrozenPayload::Text(text) => text.clone(),
            FrozenPayload::Image(_) => FROZEN_IMAGE_TEXT.to_string(),
        })
    }

    fn image(&self) -> Result<Option<Vec<u8>>> {
        Ok(match &self.parts.payload {
            FrozenPayload::Image(bytes) => Some(bytes.clone()),
            FrozenPayload::Text(_) => None,
        })
    }

    fn is_text(&self) -> bool {
        matches!(self.parts.payload, FrozenPayload::Text(_))
    }

    fn syntax_style(&self) -> String {
        self.parts.syntax_style.clone()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        self.parts.files.clone()
    }

    // Symbols are not captured; unfreeze to query them.
    fn sources(&self) -> BTreeSet<CodeUnit> {
        BTreeSet::new()
    }

    fn is_eligible_for_auto_context(&self) -> bool {
        match self.parts.original_kind {
            FragmentKind::ProjectPath => false,
            FragmentKind::Skeleton => {
                self.parts.meta.get(meta::SUMMARY_TYPE).map(String::as_str)
                    != Some(SummaryType::ClassSkeleton.as_str())
            }
            _ => true,
        }
    }

    fn format(&self) -> Result<String> {
        Ok(format!(
            "<frozen fragmentid=\"{}\" description=\"{}\" originalType=\"{}\">\n{}\n</frozen>\n",
            self.hash,
            self.parts.description,
            self.parts.original_kind,
            self.text()?
        ))
    }
}

impl fmt::Debug for FrozenFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenFragment")
            .field("hash", &self.hash)
            .field("original_kind", &self.parts.original_kind)
            .field("description", &self.parts.description)
            .field("payload", &self.parts.payload)
            .finish()
    }
}

/// Deduplicating store of snapshots, keyed by content hash.
///
/// Grows until [`clear`](Self::clear) is called; there is no eviction.
#[derive(Debug, Default)]
pub struct InternPool {
    snapshots: DashMap<ContentHash, Arc<FrozenFragment>>,
}

impl InternPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled snapshot for these parts, creating it if absent.
    ///
    /// Concurrent calls with equal content all receive the same instance.
    pub fn intern(&self, parts: FrozenParts) -> Arc<FrozenFragment> {
        let hash = parts.content_hash();
        match self.snapshots.entry(hash) {
            Entry::Occupied(existing) => {
                debug!(snapshot = %hash, "Intern pool hit");
                Arc::clone(existing.get())
            }
            Entry::Vacant(slot) => {
                debug!(snapshot = %hash, kind = %parts.original_kind, "Intern pool miss");
                let snapshot = Arc::new(FrozenFragment { hash, parts });
                slot.insert(Arc::clone(&snapshot));
                snapshot
            }
        }
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<FrozenFragment>> {
        self.snapshots.get(hash).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Forgets every snapshot. Snapshots still referenced elsewhere stay alive.
    pub fn clear(&self) {
        self.snapshots.clear();
    }
}

fn insert_project_file(meta: &mut BTreeMap<String, String>, file: &ProjectFile) {
    meta.insert(meta::REPO_ROOT.to_string(), file.root().display().to_string());
    meta.insert(meta::REL_PATH.to_string(), file.rel_path().to_string());
}

fn reconstruction_meta(fragment: &ContextFragment) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    match fragment {
        ContextFragment::ProjectPath(f) => insert_project_file(&mut out, f.file()),
        ContextFragment::ExternalPath(f) => {
            out.insert(meta::ABS_PATH.to_string(), f.file().abs_path().display().to_string());
        }
        ContextFragment::ImageFile(f) => {
            out.insert(meta::ABS_PATH.to_string(), f.file().abs_path().display().to_string());
            if let Some(file) = f.file().as_project_file() {
                out.insert(meta::IS_PROJECT_FILE.to_string(), "true".to_string());
                insert_project_file(&mut out, file);
            }
        }
        ContextFragment::GitFile(f) => {
            insert_project_file(&mut out, f.file());
            out.insert(meta::REVISION.to_string(), f.revision().to_string());
        }
        ContextFragment::Skeleton(f) => {
            let targets =
                serde_json::to_string(f.targets()).map_err(|e| FragmentError::Serialization(e.to_string()))?;
            out.insert(meta::TARGET_IDENTIFIERS.to_string(), targets);
            out.insert(meta::SUMMARY_TYPE.to_string(), f.summary_type().as_str().to_string());
        }
        ContextFragment::Usage(f) => {
            out.insert(meta::TARGET_IDENTIFIER.to_string(), f.target_identifier().to_string());
        }
        ContextFragment::CallGraph(f) => {
            out.insert(meta::METHOD_NAME.to_string(), f.method_name().to_string());
            out.insert(meta::DEPTH.to_string(), f.depth().to_string());
            out.insert(
                meta::IS_CALLEE_GRAPH.to_string(),
                f.direction().is_callee_graph().to_string(),
            );
        }
        ContextFragment::String(_)
        | ContextFragment::Search(_)
        | ContextFragment::History(_)
        | ContextFragment::Task(_)
        | ContextFragment::PasteText(_)
        | ContextFragment::PasteImage(_)
        | ContextFragment::Stacktrace(_)
        | ContextFragment::Frozen(_) => {}
    }
    Ok(out)
}

/// Freezes a fragment into the session's intern pool.
///
/// Fails with an I/O-kind error if content cannot be read and with
/// `Cancelled` if the read was interrupted. Pasted fragments wait a bounded
/// time for their description and fall back to a placeholder. Freezing a
/// snapshot returns it unchanged.
pub fn freeze(fragment: &ContextFragment, services: &ContextServices) -> Result<Arc<FrozenFragment>> {
    if let ContextFragment::Frozen(snapshot) = fragment {
        return Ok(Arc::clone(snapshot));
    }

    let timeout = services.config().freeze.paste_description_timeout();
    let (description, short_description) = match fragment {
        ContextFragment::PasteText(paste) => {
            let resolved = paste.resolved_description(timeout);
            let short = crate::fragment::lowercase_first(&resolved);
            (resolved, short)
        }
        ContextFragment::PasteImage(paste) => {
            let resolved = paste.resolved_description(timeout);
            let short = crate::fragment::lowercase_first(&resolved);
            (resolved, short)
        }
        other => (other.description(), other.short_description()),
    };
    let syntax_style = fragment.syntax_style();
    let files = fragment.files();
    let payload = if fragment.is_text() {
        FrozenPayload::Text(fragment.text()?)
    } else {
        FrozenPayload::Image(fragment.image()?.unwrap_or_default())
    };

    let parts = FrozenParts {
        original_kind: fragment.kind(),
        description,
        short_description,
        payload,
        syntax_style,
        files,
        meta: reconstruction_meta(fragment)?,
    };
    let snapshot = services.interner().intern(parts);
    debug!(fragment = %fragment.id(), snapshot = %snapshot.content_hash(), "Froze fragment");
    Ok(snapshot)
}
