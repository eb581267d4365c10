//! Collaborators consumed by fragments, and the per-session service bundle.
//!
//! Fragments never reach for process-wide state: the id allocator, the
//! intern pool and every external collaborator travel together in a
//! [`ContextServices`] value that is created per session.

use crate::config::FragmentConfig;
use crate::error::{FragmentError, Result};
use crate::files::ProjectFile;
use crate::frozen::InternPool;
use crate::ids::IdAllocator;
use crate::symbols::{CallDirection, CallSite, CodeUnit, UsageHit};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Answer from the code-intelligence service.
///
/// `NotReady` means the analyzer has not finished indexing; it is distinct
/// from a ready answer that happens to be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis<T> {
    NotReady,
    Ready(T),
}

impl<T> Analysis<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Analysis::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Analysis::Ready(value) => Some(value),
            Analysis::NotReady => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Analysis<U> {
        match self {
            Analysis::Ready(value) => Analysis::Ready(f(value)),
            Analysis::NotReady => Analysis::NotReady,
        }
    }
}

/// The project a session works in.
pub trait Project: Send + Sync {
    fn root(&self) -> &Path;

    /// Every file in the project.
    fn all_files(&self) -> Vec<ProjectFile>;

    /// Resolves a root-relative path string to a file handle.
    fn to_file(&self, rel_path: &str) -> ProjectFile {
        ProjectFile::new(self.root(), rel_path)
    }
}

/// Symbol-level queries over the project.
pub trait CodeIntelligence: Send + Sync {
    /// Symbols declared in a file.
    fn declarations_in_file(&self, file: &ProjectFile) -> Analysis<BTreeSet<CodeUnit>>;

    /// Looks up a symbol by fully qualified name.
    fn definition(&self, fq_name: &str) -> Analysis<Option<CodeUnit>>;

    /// Skeletons (signatures without bodies) of the named classes.
    fn class_skeletons(&self, fq_names: &[String]) -> Analysis<BTreeMap<CodeUnit, String>>;

    /// Skeletons of every top-level declaration in a file.
    fn file_skeletons(&self, file: &ProjectFile) -> Analysis<BTreeMap<CodeUnit, String>>;

    /// Places where the symbol is used.
    fn usages(&self, identifier: &str) -> Analysis<Vec<UsageHit>>;

    /// Call-graph edges reachable from a method within `depth` hops.
    fn call_graph(&self, method: &str, direction: CallDirection, depth: u32) -> Analysis<Vec<CallSite>>;
}

/// Historical file content.
pub trait VersionControl: Send + Sync {
    fn file_at_revision(&self, file: &ProjectFile, revision: &str) -> Result<String>;
}

/// Raw file access.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// A project rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalProject {
    root: PathBuf,
}

impl LocalProject {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn walk(&self, dir: &Path, out: &mut Vec<ProjectFile>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => {
                    if name != "target" {
                        self.walk(&path, out);
                    }
                }
                Ok(ft) if ft.is_file() => {
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        out.push(ProjectFile::new(&self.root, &rel.to_string_lossy()));
                    }
                }
                _ => {}
            }
        }
    }
}

impl Project for LocalProject {
    fn root(&self) -> &Path {
        &self.root
    }

    fn all_files(&self) -> Vec<ProjectFile> {
        let mut files = Vec::new();
        self.walk(&self.root, &mut files);
        files.sort();
        files
    }
}

/// Analyzer that never finishes indexing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotReadyAnalyzer;

impl CodeIntelligence for NotReadyAnalyzer {
    fn declarations_in_file(&self, _file: &ProjectFile) -> Analysis<BTreeSet<CodeUnit>> {
        Analysis::NotReady
    }

    fn definition(&self, _fq_name: &str) -> Analysis<Option<CodeUnit>> {
        Analysis::NotReady
    }

    fn class_skeletons(&self, _fq_names: &[String]) -> Analysis<BTreeMap<CodeUnit, String>> {
        Analysis::NotReady
    }

    fn file_skeletons(&self, _file: &ProjectFile) -> Analysis<BTreeMap<CodeUnit, String>> {
        Analysis::NotReady
    }

    fn usages(&self, _identifier: &str) -> Analysis<Vec<UsageHit>> {
        Analysis::NotReady
    }

    fn call_graph(&self, _method: &str, _direction: CallDirection, _depth: u32) -> Analysis<Vec<CallSite>> {
        Analysis::NotReady
    }
}

/// Cooperative cancellation signal shared by everything reading on behalf
/// of one session.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Fails with `Cancelled` if the flag is raised.
    pub fn check(&self, what: impl fmt::Display) -> Result<()> {
        if self.is_cancelled() {
            Err(FragmentError::Cancelled(what.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Everything a fragment needs from its surroundings.
///
/// Cloning is cheap; all clones share the same allocator, intern pool and
/// collaborators.
#[derive(Clone)]
pub struct ContextServices {
    ids: Arc<IdAllocator>,
    interner: Arc<InternPool>,
    project: Arc<dyn Project>,
    analyzer: Arc<dyn CodeIntelligence>,
    fs: Arc<dyn FileSystem>,
    cancel: CancelFlag,
    config: Arc<FragmentConfig>,
}

impl ContextServices {
    /// Services for a project with a not-ready analyzer, the local
    /// filesystem and default configuration.
    pub fn new(project: Arc<dyn Project>) -> Self {
        Self {
            ids: Arc::new(IdAllocator::new()),
            interner: Arc::new(InternPool::new()),
            project,
            analyzer: Arc::new(NotReadyAnalyzer),
            fs: Arc::new(LocalFileSystem),
            cancel: CancelFlag::new(),
            config: Arc::new(FragmentConfig::default()),
        }
    }

    /// Services for a project directory on disk.
    pub fn for_directory(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(LocalProject::new(root)))
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn CodeIntelligence>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_config(mut self, config: FragmentConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn interner(&self) -> &InternPool {
        &self.interner
    }

    pub fn project(&self) -> &dyn Project {
        self.project.as_ref()
    }

    pub fn analyzer(&self) -> &dyn CodeIntelligence {
        self.analyzer.as_ref()
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn config(&self) -> &FragmentConfig {
        &self.config
    }

    /// Ends the session: forgets every interned snapshot, rewinds the id
    /// allocator and lowers the cancel flag.
    pub fn reset(&self) {
        self.interner.clear();
        self.ids.reset();
        self.cancel.reset();
        debug!("Context services reset");
    }

    /// Reads a text file, honouring cancellation before and after the read.
    pub fn read_text(&self, path: &Path) -> Result<String> {
        self.cancel.check(format_args!("reading {}", path.display()))?;
        let text = self.fs.read_to_string(path).map_err(|source| FragmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.cancel.check(format_args!("reading {}", path.display()))?;
        Ok(text)
    }

    /// Reads a binary file, honouring cancellation and the image size limit.
    pub fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.cancel.check(format_args!("reading {}", path.display()))?;
        let bytes = self.fs.read_bytes(path).map_err(|source| FragmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.len() as u64 > self.config.storage.max_image_bytes {
            return Err(FragmentError::Read {
                path: path.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{} bytes exceeds limit of {} bytes",
                        bytes.len(),
                        self.config.storage.max_image_bytes
                    ),
                ),
            });
        }
        self.cancel.check(format_args!("reading {}", path.display()))?;
        Ok(bytes)
    }
}

impl fmt::Debug for ContextServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextServices")
            .field("root", &self.project.root())
            .field("watermark", &self.ids.current_watermark())
            .field("interned", &self.interner.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
