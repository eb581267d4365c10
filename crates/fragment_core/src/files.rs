//! File handles referenced by fragments, plus syntax-style and media-type
//! inference.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Syntax-style identifiers attached to fragment text.
pub mod syntax {
    pub const NONE: &str = "text/plain";
    pub const MARKDOWN: &str = "text/markdown";
    pub const JAVA: &str = "text/java";
    pub const RUST: &str = "text/rust";
    pub const PYTHON: &str = "text/python";
    pub const JAVASCRIPT: &str = "text/javascript";
    pub const TYPESCRIPT: &str = "text/typescript";
    pub const GO: &str = "text/go";
    pub const C: &str = "text/c";
    pub const CPP: &str = "text/c++";
    pub const JSON: &str = "text/json";
    pub const TOML: &str = "text/toml";
    pub const YAML: &str = "text/yaml";
    pub const XML: &str = "text/xml";
    pub const HTML: &str = "text/html";
    pub const SHELL: &str = "text/unix-shell";
    pub const SQL: &str = "text/sql";

    /// Guesses the syntax style from a file extension.
    pub fn for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "java" => JAVA,
            "rs" => RUST,
            "py" | "pyi" => PYTHON,
            "js" | "mjs" | "cjs" | "jsx" => JAVASCRIPT,
            "ts" | "tsx" => TYPESCRIPT,
            "go" => GO,
            "c" | "h" => C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => CPP,
            "json" => JSON,
            "toml" => TOML,
            "yml" | "yaml" => YAML,
            "xml" => XML,
            "html" | "htm" => HTML,
            "sh" | "bash" | "zsh" => SHELL,
            "sql" => SQL,
            "md" | "markdown" => MARKDOWN,
            _ => NONE,
        }
    }

    /// Guesses the syntax style of a path.
    pub fn for_path(path: &std::path::Path) -> &'static str {
        path.extension()
            .and_then(|e| e.to_str())
            .map(for_extension)
            .unwrap_or(NONE)
    }
}

/// A file inside the project, addressed by project root plus relative path.
///
/// Equality, hashing and ordering all go through the absolute path.
#[derive(Clone)]
pub struct ProjectFile {
    root: PathBuf,
    rel_path: String,
    abs_path: PathBuf,
}

impl ProjectFile {
    /// Creates a project file. Backslashes in `rel_path` are normalized to `/`
    /// and a leading `./` or `/` is dropped.
    pub fn new(root: impl Into<PathBuf>, rel_path: &str) -> Self {
        let root = root.into();
        let normalized = rel_path.replace('\\', "/");
        let rel_path = normalized
            .trim_start_matches("./")
            .trim_start_matches('/')
            .to_string();
        let abs_path = root.join(&rel_path);
        Self {
            root,
            rel_path,
            abs_path,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the project root, `/`-separated.
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    /// Relative parent directory; empty for top-level files.
    pub fn parent(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(idx) => &self.rel_path[..idx],
            None => "",
        }
    }

    pub fn syntax_style(&self) -> &'static str {
        syntax::for_path(Path::new(&self.rel_path))
    }

    /// `name [parent]`, or just the name for top-level files.
    pub fn describe(&self) -> String {
        if self.parent().is_empty() {
            self.file_name().to_string()
        } else {
            format!("{} [{}]", self.file_name(), self.parent())
        }
    }
}

impl PartialEq for ProjectFile {
    fn eq(&self, other: &Self) -> bool {
        self.abs_path == other.abs_path
    }
}

impl Eq for ProjectFile {}

impl Hash for ProjectFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.abs_path.hash(state);
    }
}

impl PartialOrd for ProjectFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProjectFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.abs_path.cmp(&other.abs_path)
    }
}

impl fmt::Display for ProjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rel_path)
    }
}

impl fmt::Debug for ProjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectFile({})", self.abs_path.display())
    }
}

/// A file outside the project, addressed by absolute path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ExternalFile {
    abs_path: PathBuf,
}

impl ExternalFile {
    pub fn new(abs_path: impl Into<PathBuf>) -> Self {
        Self {
            abs_path: abs_path.into(),
        }
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    pub fn file_name(&self) -> String {
        self.abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.abs_path.display().to_string())
    }

    pub fn syntax_style(&self) -> &'static str {
        syntax::for_path(&self.abs_path)
    }
}

impl fmt::Display for ExternalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abs_path.display())
    }
}

/// Either kind of file; what an image fragment points at.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FileRef {
    Project(ProjectFile),
    External(ExternalFile),
}

impl FileRef {
    pub fn abs_path(&self) -> &Path {
        match self {
            FileRef::Project(file) => file.abs_path(),
            FileRef::External(file) => file.abs_path(),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            FileRef::Project(file) => file.file_name().to_string(),
            FileRef::External(file) => file.file_name(),
        }
    }

    pub fn as_project_file(&self) -> Option<&ProjectFile> {
        match self {
            FileRef::Project(file) => Some(file),
            FileRef::External(_) => None,
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRef::Project(file) => file.fmt(f),
            FileRef::External(file) => file.fmt(f),
        }
    }
}

/// Media type of an image path, if the extension is known.
pub fn image_media_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
}

/// True if the bytes start with the signature of a supported raster format.
pub fn looks_like_image(bytes: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        b"\x89PNG\r\n\x1a\n",
        b"\xff\xd8\xff",
        b"GIF87a",
        b"GIF89a",
        b"BM",
    ];
    if SIGNATURES.iter().any(|sig| bytes.starts_with(sig)) {
        return true;
    }
    bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}
