//! The fragment taxonomy.
//!
//! A fragment is one unit of context handed to the assistant. Every variant
//! implements the [`Fragment`] capability contract; [`ContextFragment`] is
//! the closed enum over all of them and is what contexts and sessions hold,
//! behind shared [`FragmentRef`] handles.
//!
//! | Kind | Dynamic | Id |
//! |---|---|---|
//! | project path, external path, image, skeleton, usage, call graph | yes | allocated |
//! | git revision, string, search, history, task, pasted text/image, stack trace | no | content hash |
//! | frozen snapshot | no | content hash |

mod analysis;
mod path;
mod task;
mod text;

pub use analysis::{CallGraphFragment, SkeletonFragment, SummaryType, UsageFragment};
pub use path::{ExternalPathFragment, GitFileFragment, ImageFileFragment, ProjectPathFragment};
pub use task::{
    format_messages, ChatMessage, ChatRole, HistoryFragment, SearchFragment, TaskEntry,
    TaskEntryContent, TaskFragment,
};
pub use text::{
    PasteImageFragment, PasteTextFragment, StacktraceFragment, StringFragment, PASTE_DESCRIPTION_ERROR,
    PASTE_DESCRIPTION_TIMED_OUT, PASTE_SUMMARIZING, PASTE_SUMMARY_FAILED,
};

use crate::error::Result;
use crate::files::ProjectFile;
use crate::frozen::FrozenFragment;
use crate::ids::FragmentId;
use crate::services::{ContextServices, Project};
use crate::symbols::CodeUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Body shown in place of image bytes inside formatted markup.
pub const IMAGE_OUT_OF_BAND: &str = "[Image content provided out of band]";

/// Shared handle to a fragment. Two references denote the same fragment
/// exactly when [`Arc::ptr_eq`] holds.
pub type FragmentRef = Arc<ContextFragment>;

/// The closed set of fragment kinds.
///
/// The kind doubles as the tag recorded in a frozen snapshot and drives
/// reconstruction, so adding a kind forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FragmentKind {
    ProjectPath,
    ExternalPath,
    ImageFile,
    GitFile,
    String,
    Search,
    Skeleton,
    Usage,
    CallGraph,
    History,
    Task,
    PasteText,
    PasteImage,
    Stacktrace,
}

impl FragmentKind {
    pub const ALL: [FragmentKind; 14] = [
        FragmentKind::ProjectPath,
        FragmentKind::ExternalPath,
        FragmentKind::ImageFile,
        FragmentKind::GitFile,
        FragmentKind::String,
        FragmentKind::Search,
        FragmentKind::Skeleton,
        FragmentKind::Usage,
        FragmentKind::CallGraph,
        FragmentKind::History,
        FragmentKind::Task,
        FragmentKind::PasteText,
        FragmentKind::PasteImage,
        FragmentKind::Stacktrace,
    ];

    /// Kind name as it appears in markup and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::ProjectPath => "PROJECT_PATH",
            FragmentKind::ExternalPath => "EXTERNAL_PATH",
            FragmentKind::ImageFile => "IMAGE_FILE",
            FragmentKind::GitFile => "GIT_FILE",
            FragmentKind::String => "STRING",
            FragmentKind::Search => "SEARCH",
            FragmentKind::Skeleton => "SKELETON",
            FragmentKind::Usage => "USAGE",
            FragmentKind::CallGraph => "CALL_GRAPH",
            FragmentKind::History => "HISTORY",
            FragmentKind::Task => "TASK",
            FragmentKind::PasteText => "PASTE_TEXT",
            FragmentKind::PasteImage => "PASTE_IMAGE",
            FragmentKind::Stacktrace => "STACKTRACE",
        }
    }

    /// Name of the originating variant, hashed alongside the kind.
    pub fn variant_tag(&self) -> &'static str {
        match self {
            FragmentKind::ProjectPath => "ProjectPathFragment",
            FragmentKind::ExternalPath => "ExternalPathFragment",
            FragmentKind::ImageFile => "ImageFileFragment",
            FragmentKind::GitFile => "GitFileFragment",
            FragmentKind::String => "StringFragment",
            FragmentKind::Search => "SearchFragment",
            FragmentKind::Skeleton => "SkeletonFragment",
            FragmentKind::Usage => "UsageFragment",
            FragmentKind::CallGraph => "CallGraphFragment",
            FragmentKind::History => "HistoryFragment",
            FragmentKind::Task => "TaskFragment",
            FragmentKind::PasteText => "PasteTextFragment",
            FragmentKind::PasteImage => "PasteImageFragment",
            FragmentKind::Stacktrace => "StacktraceFragment",
        }
    }

    /// Path-backed kinds; everything else is virtual.
    pub fn is_path(&self) -> bool {
        matches!(
            self,
            FragmentKind::ProjectPath
                | FragmentKind::ExternalPath
                | FragmentKind::ImageFile
                | FragmentKind::GitFile
        )
    }

    pub fn is_virtual(&self) -> bool {
        !self.is_path()
    }

    /// Whether live fragments of this kind carry allocated ids.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            FragmentKind::ProjectPath
                | FragmentKind::ExternalPath
                | FragmentKind::ImageFile
                | FragmentKind::Skeleton
                | FragmentKind::Usage
                | FragmentKind::CallGraph
        )
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by every fragment variant.
pub trait Fragment: fmt::Debug + Send + Sync {
    fn id(&self) -> FragmentId;

    fn kind(&self) -> FragmentKind;

    fn description(&self) -> String;

    fn short_description(&self) -> String {
        lowercase_first(&self.description())
    }

    /// Raw content. Dynamic variants read live state and may fail.
    fn text(&self) -> Result<String>;

    /// Image bytes for non-text fragments; `None` for text fragments.
    fn image(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn is_text(&self) -> bool {
        true
    }

    fn syntax_style(&self) -> String;

    fn is_dynamic(&self) -> bool {
        false
    }

    /// Concrete files the fragment refers to.
    fn files(&self) -> BTreeSet<ProjectFile> {
        BTreeSet::new()
    }

    /// Code symbols the fragment refers to.
    fn sources(&self) -> BTreeSet<CodeUnit> {
        BTreeSet::new()
    }

    /// Whether this fragment's symbols should seed automatic context suggestions.
    fn is_eligible_for_auto_context(&self) -> bool {
        true
    }

    /// Markup handed to the model.
    fn format(&self) -> Result<String> {
        Ok(format!(
            "<fragment description=\"{}\" fragmentid=\"{}\">\n{}\n</fragment>\n",
            self.description(),
            self.id(),
            self.text()?
        ))
    }

    /// One-line table-of-contents entry.
    fn format_toc(&self) -> String {
        format!(
            "<fragment-toc description=\"{}\" fragmentid=\"{}\" />",
            self.description(),
            self.id()
        )
    }

    /// Compact rendering for summaries of the whole context.
    fn format_summary(&self) -> Result<String> {
        Ok(format!("<fragment description=\"{}\" />", self.description()))
    }
}

/// Any fragment.
#[derive(Debug)]
pub enum ContextFragment {
    ProjectPath(ProjectPathFragment),
    ExternalPath(ExternalPathFragment),
    ImageFile(ImageFileFragment),
    GitFile(GitFileFragment),
    String(StringFragment),
    Search(SearchFragment),
    Skeleton(SkeletonFragment),
    Usage(UsageFragment),
    CallGraph(CallGraphFragment),
    History(HistoryFragment),
    Task(TaskFragment),
    PasteText(PasteTextFragment),
    PasteImage(PasteImageFragment),
    Stacktrace(StacktraceFragment),
    Frozen(Arc<FrozenFragment>),
}

impl ContextFragment {
    fn inner(&self) -> &dyn Fragment {
        match self {
            ContextFragment::ProjectPath(f) => f,
            ContextFragment::ExternalPath(f) => f,
            ContextFragment::ImageFile(f) => f,
            ContextFragment::GitFile(f) => f,
            ContextFragment::String(f) => f,
            ContextFragment::Search(f) => f,
            ContextFragment::Skeleton(f) => f,
            ContextFragment::Usage(f) => f,
            ContextFragment::CallGraph(f) => f,
            ContextFragment::History(f) => f,
            ContextFragment::Task(f) => f,
            ContextFragment::PasteText(f) => f,
            ContextFragment::PasteImage(f) => f,
            ContextFragment::Stacktrace(f) => f,
            ContextFragment::Frozen(f) => f.as_ref(),
        }
    }

    /// Wraps the fragment in a shared handle.
    pub fn shared(self) -> FragmentRef {
        Arc::new(self)
    }

    pub fn as_frozen(&self) -> Option<&Arc<FrozenFragment>> {
        match self {
            ContextFragment::Frozen(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&TaskFragment> {
        match self {
            ContextFragment::Task(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, ContextFragment::Frozen(_))
    }

    /// Label used in consistency errors: the kind, prefixed for snapshots.
    pub(crate) fn label(&self) -> String {
        match self {
            ContextFragment::Frozen(f) => format!("frozen {}", f.original_kind()),
            other => other.kind().to_string(),
        }
    }
}

/// Reconstructs a live fragment from a frozen handle; any other handle is
/// returned unchanged.
pub fn unfreeze(fragment: &FragmentRef, services: &ContextServices) -> Result<FragmentRef> {
    match fragment.as_ref() {
        ContextFragment::Frozen(snapshot) => Ok(snapshot.unfreeze(services)?.shared()),
        _ => Ok(Arc::clone(fragment)),
    }
}

impl Fragment for ContextFragment {
    fn id(&self) -> FragmentId {
        self.inner().id()
    }

    fn kind(&self) -> FragmentKind {
        self.inner().kind()
    }

    fn description(&self) -> String {
        self.inner().description()
    }

    fn short_description(&self) -> String {
        self.inner().short_description()
    }

    fn text(&self) -> Result<String> {
        self.inner().text()
    }

    fn image(&self) -> Result<Option<Vec<u8>>> {
        self.inner().image()
    }

    fn is_text(&self) -> bool {
        self.inner().is_text()
    }

    fn syntax_style(&self) -> String {
        self.inner().syntax_style()
    }

    fn is_dynamic(&self) -> bool {
        self.inner().is_dynamic()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        self.inner().files()
    }

    fn sources(&self) -> BTreeSet<CodeUnit> {
        self.inner().sources()
    }

    fn is_eligible_for_auto_context(&self) -> bool {
        self.inner().is_eligible_for_auto_context()
    }

    fn format(&self) -> Result<String> {
        self.inner().format()
    }

    fn format_toc(&self) -> String {
        self.inner().format_toc()
    }

    fn format_summary(&self) -> Result<String> {
        self.inner().format_summary()
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ContextFragment {
                fn from(fragment: $ty) -> Self {
                    ContextFragment::$variant(fragment)
                }
            }
        )*
    };
}

impl_from_variant! {
    ProjectPath => ProjectPathFragment,
    ExternalPath => ExternalPathFragment,
    ImageFile => ImageFileFragment,
    GitFile => GitFileFragment,
    String => StringFragment,
    Search => SearchFragment,
    Skeleton => SkeletonFragment,
    Usage => UsageFragment,
    CallGraph => CallGraphFragment,
    History => HistoryFragment,
    Task => TaskFragment,
    PasteText => PasteTextFragment,
    PasteImage => PasteImageFragment,
    Stacktrace => StacktraceFragment,
    Frozen => Arc<FrozenFragment>,
}

pub(crate) fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Project files mentioned in free text.
///
/// Files whose relative path occurs verbatim win; only when there are none
/// does a bare file-name match count.
pub(crate) fn parse_project_files(text: &str, project: &dyn Project) -> BTreeSet<ProjectFile> {
    let all = project.all_files();
    let exact: BTreeSet<ProjectFile> = all
        .iter()
        .filter(|f| text.contains(f.rel_path()))
        .cloned()
        .collect();
    if !exact.is_empty() {
        return exact;
    }
    all.into_iter()
        .filter(|f| text.contains(f.file_name()))
        .collect()
}

/// Claims a persisted dynamic id, keeping the allocator ahead of it.
pub(crate) fn claim_dynamic_id(id: &str, services: &ContextServices) -> Result<FragmentId> {
    let parsed = FragmentId::parse_dynamic(id)?;
    services.ids().observe(id);
    Ok(parsed)
}

/// Files declaring the given symbols.
pub(crate) fn files_of(sources: &BTreeSet<CodeUnit>) -> BTreeSet<ProjectFile> {
    sources.iter().map(|unit| unit.source.clone()).collect()
}

/// Syntax style of the first source's file, or plain text.
pub(crate) fn style_of_sources(sources: &BTreeSet<CodeUnit>) -> String {
    sources
        .iter()
        .next()
        .map(|unit| unit.source.syntax_style())
        .unwrap_or(crate::files::syntax::NONE)
        .to_string()
}
