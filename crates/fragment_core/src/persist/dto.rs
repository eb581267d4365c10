//! Serialized shapes of a session document.
//!
//! Fragments are stored once, in one of three pools keyed by id, and
//! contexts refer to them by id. Records carry their own id as well; the
//! loader checks the two agree.

use crate::fragment::{FragmentKind, SummaryType};
use crate::symbols::CodeUnitKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current document format version.
pub const SESSION_DOCUMENT_VERSION: u32 = 1;

/// A whole persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub version: u32,
    pub fragments: FragmentPools,
    pub contexts: Vec<CompactContextRecord>,
}

/// Every fragment of a session, each stored exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentPools {
    /// Path fragments and snapshots of path fragments.
    #[serde(default)]
    pub referenced: BTreeMap<String, ReferencedRecord>,
    /// Everything else except task logs.
    #[serde(default, rename = "virtual")]
    pub virtuals: BTreeMap<String, VirtualRecord>,
    /// Task logs referenced from task entries and parsed outputs.
    #[serde(default)]
    pub task: BTreeMap<String, TaskRecord>,
}

impl FragmentPools {
    pub fn len(&self) -> usize {
        self.referenced.len() + self.virtuals.len() + self.task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFileRecord {
    pub repo_root: String,
    pub rel_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferencedRecord {
    ProjectFile {
        id: String,
        repo_root: String,
        rel_path: String,
    },
    ExternalFile {
        id: String,
        abs_path: String,
    },
    ImageFile {
        id: String,
        abs_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        /// Present when the image lives inside the project.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_file: Option<ProjectFileRecord>,
    },
    GitFile {
        id: String,
        repo_root: String,
        rel_path: String,
        revision: String,
        content: String,
    },
    Frozen(FrozenRecord),
}

impl ReferencedRecord {
    pub fn id(&self) -> &str {
        match self {
            ReferencedRecord::ProjectFile { id, .. }
            | ReferencedRecord::ExternalFile { id, .. }
            | ReferencedRecord::ImageFile { id, .. }
            | ReferencedRecord::GitFile { id, .. } => id,
            ReferencedRecord::Frozen(record) => &record.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnitRecord {
    pub source_file: ProjectFileRecord,
    pub kind: CodeUnitKind,
    pub namespace: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub session_name: String,
    pub messages: Vec<ChatMessageRecord>,
}

/// A task entry: either a reference to a task log or a compressed summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntryRecord {
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VirtualRecord {
    Task(TaskRecord),
    String {
        id: String,
        text: String,
        description: String,
        syntax_style: String,
    },
    Search {
        id: String,
        query: String,
        messages: Vec<ChatMessageRecord>,
        #[serde(default)]
        sources: Vec<CodeUnitRecord>,
    },
    Skeleton {
        id: String,
        target_identifiers: Vec<String>,
        summary_type: SummaryType,
    },
    Usage {
        id: String,
        target_identifier: String,
    },
    CallGraph {
        id: String,
        method_name: String,
        depth: u32,
        is_callee_graph: bool,
    },
    PasteText {
        id: String,
        text: String,
        description: String,
    },
    PasteImage {
        id: String,
        image_base64: String,
        description: String,
    },
    Stacktrace {
        id: String,
        #[serde(default)]
        sources: Vec<CodeUnitRecord>,
        original: String,
        exception: String,
        code: String,
    },
    History {
        id: String,
        history: Vec<TaskEntryRecord>,
    },
    Frozen(FrozenRecord),
}

impl VirtualRecord {
    pub fn id(&self) -> &str {
        match self {
            VirtualRecord::Task(record) => &record.id,
            VirtualRecord::Frozen(record) => &record.id,
            VirtualRecord::String { id, .. }
            | VirtualRecord::Search { id, .. }
            | VirtualRecord::Skeleton { id, .. }
            | VirtualRecord::Usage { id, .. }
            | VirtualRecord::CallGraph { id, .. }
            | VirtualRecord::PasteText { id, .. }
            | VirtualRecord::PasteImage { id, .. }
            | VirtualRecord::Stacktrace { id, .. }
            | VirtualRecord::History { id, .. } => id,
        }
    }
}

/// A frozen snapshot. Exactly one of `text_content` and `image_base64` is set,
/// matching `is_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenRecord {
    pub id: String,
    pub original_type: FragmentKind,
    pub description: String,
    pub short_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub is_text: bool,
    pub syntax_style: String,
    #[serde(default)]
    pub files: Vec<ProjectFileRecord>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// A context as a list of fragment ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactContextRecord {
    #[serde(default)]
    pub editable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
    #[serde(default)]
    pub virtuals: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<TaskEntryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_output_id: Option<String>,
    pub action: String,
}
