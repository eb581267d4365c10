//! Conversation-backed fragments: task logs, search results and task history.

use super::{files_of, parse_project_files, ContextFragment, Fragment, FragmentKind, FragmentRef};
use crate::error::{FragmentError, Result};
use crate::files::{syntax, ProjectFile};
use crate::hasher::HashFields;
use crate::ids::FragmentId;
use crate::services::ContextServices;
use crate::symbols::CodeUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
    System,
    Custom,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Ai => "ai",
            ChatRole::System => "system",
            ChatRole::Custom => "custom",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(ChatRole::User),
            "ai" => Ok(ChatRole::Ai),
            "system" => Ok(ChatRole::System),
            "custom" => Ok(ChatRole::Custom),
            other => Err(FragmentError::InvalidRecord(format!("unknown chat role '{}'", other))),
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Ai, content)
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders messages as `<message type=ROLE>` blocks with indented content.
pub fn format_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("<message type={}>\n{}\n</message>", m.role.as_str(), indent(&m.content)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The conversation of one task.
pub struct TaskFragment {
    id: FragmentId,
    session_name: String,
    messages: Vec<ChatMessage>,
    services: ContextServices,
}

impl TaskFragment {
    pub fn new(session_name: &str, messages: Vec<ChatMessage>, services: &ContextServices) -> Self {
        let text = format_messages(&messages);
        let id = HashFields::text(FragmentKind::Task, session_name, &text, syntax::MARKDOWN)
            .content_id()
            .into();
        Self {
            id,
            session_name: session_name.to_string(),
            messages,
            services: services.clone(),
        }
    }

    pub fn with_id(
        id: &str,
        session_name: &str,
        messages: Vec<ChatMessage>,
        services: &ContextServices,
    ) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            session_name: session_name.to_string(),
            messages,
            services: services.clone(),
        })
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

impl Fragment for TaskFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::Task
    }

    fn description(&self) -> String {
        self.session_name.clone()
    }

    fn text(&self) -> Result<String> {
        Ok(format_messages(&self.messages))
    }

    fn syntax_style(&self) -> String {
        syntax::MARKDOWN.to_string()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        parse_project_files(&format_messages(&self.messages), self.services.project())
    }

    fn format_summary(&self) -> Result<String> {
        self.format()
    }
}

impl fmt::Debug for TaskFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFragment")
            .field("id", &self.id)
            .field("session_name", &self.session_name)
            .field("messages", &self.messages.len())
            .finish()
    }
}

/// The answer to a search, with the symbols it found.
#[derive(Debug)]
pub struct SearchFragment {
    id: FragmentId,
    query: String,
    messages: Vec<ChatMessage>,
    sources: BTreeSet<CodeUnit>,
}

impl SearchFragment {
    pub fn new(query: &str, messages: Vec<ChatMessage>, sources: BTreeSet<CodeUnit>) -> Self {
        let text = format_messages(&messages);
        let id = HashFields::text(FragmentKind::Search, query, &text, syntax::MARKDOWN)
            .content_id()
            .into();
        Self {
            id,
            query: query.to_string(),
            messages,
            sources,
        }
    }

    pub fn with_id(
        id: &str,
        query: &str,
        messages: Vec<ChatMessage>,
        sources: BTreeSet<CodeUnit>,
    ) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            query: query.to_string(),
            messages,
            sources,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

impl Fragment for SearchFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::Search
    }

    fn description(&self) -> String {
        self.query.clone()
    }

    fn text(&self) -> Result<String> {
        Ok(format_messages(&self.messages))
    }

    fn syntax_style(&self) -> String {
        syntax::MARKDOWN.to_string()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        files_of(&self.sources)
    }

    fn sources(&self) -> BTreeSet<CodeUnit> {
        self.sources.clone()
    }

    fn format_summary(&self) -> Result<String> {
        self.format()
    }
}

/// What a task-history entry holds.
#[derive(Debug, Clone)]
pub enum TaskEntryContent {
    /// The full conversation, as a task fragment.
    Log(FragmentRef),
    /// A compressed summary replacing the conversation.
    Compressed(String),
}

/// One prior turn in a task history.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub sequence: u32,
    pub content: TaskEntryContent,
}

impl TaskEntry {
    /// An entry backed by a task log. `log` must be a task fragment.
    pub fn log(sequence: u32, log: FragmentRef) -> Result<Self> {
        if log.as_task().is_none() {
            return Err(FragmentError::InconsistentReference {
                id: log.id().to_string(),
                expected: "task log",
                found: log.label(),
            });
        }
        Ok(Self {
            sequence,
            content: TaskEntryContent::Log(log),
        })
    }

    pub fn compressed(sequence: u32, summary: impl Into<String>) -> Self {
        Self {
            sequence,
            content: TaskEntryContent::Compressed(summary.into()),
        }
    }

    pub fn log_fragment(&self) -> Option<&FragmentRef> {
        match &self.content {
            TaskEntryContent::Log(log) => Some(log),
            TaskEntryContent::Compressed(_) => None,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match &self.content {
            TaskEntryContent::Compressed(summary) => Some(summary),
            TaskEntryContent::Log(_) => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.content, TaskEntryContent::Compressed(_))
    }

    fn render(&self) -> String {
        match &self.content {
            TaskEntryContent::Log(log) => {
                let messages = match log.as_ref() {
                    ContextFragment::Task(task) => format_messages(task.messages()),
                    _ => String::new(),
                };
                format!("<task sequence={}>\n{}\n</task>", self.sequence, indent(&messages))
            }
            TaskEntryContent::Compressed(summary) => format!(
                "<task sequence={} summarized=true>\n{}\n</task>",
                self.sequence,
                indent(summary)
            ),
        }
    }
}

/// A list of prior turns.
#[derive(Debug)]
pub struct HistoryFragment {
    id: FragmentId,
    history: Vec<TaskEntry>,
}

impl HistoryFragment {
    pub fn new(history: Vec<TaskEntry>) -> Self {
        let description = Self::describe(&history);
        let text = Self::render(&history);
        let id = HashFields::text(FragmentKind::History, &description, &text, syntax::MARKDOWN)
            .content_id()
            .into();
        Self { id, history }
    }

    pub fn with_id(id: &str, history: Vec<TaskEntry>) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            history,
        })
    }

    pub fn entries(&self) -> &[TaskEntry] {
        &self.history
    }

    fn describe(history: &[TaskEntry]) -> String {
        let n = history.len();
        format!("Task History ({} task{})", n, if n > 1 { "s" } else { "" })
    }

    fn render(history: &[TaskEntry]) -> String {
        history
            .iter()
            .map(TaskEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Fragment for HistoryFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::History
    }

    fn description(&self) -> String {
        Self::describe(&self.history)
    }

    fn text(&self) -> Result<String> {
        Ok(Self::render(&self.history))
    }

    fn syntax_style(&self) -> String {
        syntax::MARKDOWN.to_string()
    }

    fn format(&self) -> Result<String> {
        Ok(format!(
            "<taskhistory fragmentid=\"{}\">\n{}\n</taskhistory>\n",
            self.id,
            Self::render(&self.history)
        ))
    }

    fn format_summary(&self) -> Result<String> {
        Ok(String::new())
    }
}
