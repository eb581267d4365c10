//! Conversion between a [`ContextHistory`] and a [`SessionDocument`].
//!
//! Loading preserves identity: every id in the document becomes exactly one
//! [`FragmentRef`], however many places refer to it.

use super::dto::{
    ChatMessageRecord, CodeUnitRecord, CompactContextRecord, FragmentPools, FrozenRecord, ProjectFileRecord,
    ReferencedRecord, SessionDocument, TaskEntryRecord, TaskRecord, VirtualRecord, SESSION_DOCUMENT_VERSION,
};
use crate::context::{Context, ContextHistory};
use crate::deferred::Deferred;
use crate::error::{FragmentError, Result};
use crate::files::{ExternalFile, FileRef, ProjectFile};
use crate::fragment::{
    CallGraphFragment, ChatMessage, ContextFragment, ExternalPathFragment, Fragment, FragmentRef, GitFileFragment,
    HistoryFragment, ImageFileFragment, PasteImageFragment, PasteTextFragment, ProjectPathFragment, SearchFragment,
    SkeletonFragment, StacktraceFragment, StringFragment, TaskEntry, TaskEntryContent, TaskFragment, UsageFragment,
};
use crate::frozen::{FrozenFragment, FrozenParts, FrozenPayload};
use crate::ids::FragmentId;
use crate::services::ContextServices;
use crate::symbols::{CallDirection, CodeUnit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builds the persisted form of a history.
///
/// Pasted fragments wait a bounded time for their descriptions.
pub fn to_document(history: &ContextHistory, services: &ContextServices) -> Result<SessionDocument> {
    let mut writer = Writer {
        pools: FragmentPools::default(),
        timeout: services.config().freeze.paste_description_timeout(),
    };

    let mut contexts = Vec::with_capacity(history.len());
    for context in history.contexts() {
        contexts.push(writer.context(context)?);
    }

    debug!(
        contexts = contexts.len(),
        fragments = writer.pools.len(),
        "Built session document"
    );
    Ok(SessionDocument {
        version: SESSION_DOCUMENT_VERSION,
        fragments: writer.pools,
        contexts,
    })
}

/// Rebuilds a history from its persisted form.
///
/// The id allocator's watermark is advanced past every dynamic id seen, and
/// snapshots are verified against their ids and interned.
pub fn from_document(doc: &SessionDocument, services: &ContextServices) -> Result<ContextHistory> {
    if doc.version != SESSION_DOCUMENT_VERSION {
        return Err(FragmentError::UnsupportedVersion {
            found: doc.version,
            supported: SESSION_DOCUMENT_VERSION,
        });
    }

    let mut loader = Loader {
        pools: &doc.fragments,
        services,
        resolved: HashMap::new(),
        resolving: HashSet::new(),
    };
    let mut history = ContextHistory::new();
    for record in &doc.contexts {
        history.push(loader.context(record)?);
    }

    debug!(
        contexts = history.len(),
        fragments = loader.resolved.len(),
        watermark = services.ids().current_watermark(),
        "Loaded session document"
    );
    Ok(history)
}

struct Writer {
    pools: FragmentPools,
    timeout: Duration,
}

impl Writer {
    fn context(&mut self, context: &Context) -> Result<CompactContextRecord> {
        let mut record = CompactContextRecord {
            action: context.action.clone(),
            ..CompactContextRecord::default()
        };
        for fragment in &context.editable {
            record.editable.push(self.fragment(fragment)?);
        }
        for fragment in &context.readonly {
            record.readonly.push(self.fragment(fragment)?);
        }
        for fragment in &context.virtuals {
            record.virtuals.push(self.fragment(fragment)?);
        }
        for entry in &context.task_history {
            record.tasks.push(self.entry(entry)?);
        }
        if let Some(output) = &context.parsed_output {
            record.parsed_output_id = Some(self.fragment(output)?);
        }
        Ok(record)
    }

    fn entry(&mut self, entry: &TaskEntry) -> Result<TaskEntryRecord> {
        Ok(match &entry.content {
            TaskEntryContent::Log(log) => TaskEntryRecord {
                sequence: entry.sequence,
                log_id: Some(self.fragment(log)?),
                summary: None,
            },
            TaskEntryContent::Compressed(summary) => TaskEntryRecord {
                sequence: entry.sequence,
                log_id: None,
                summary: Some(summary.clone()),
            },
        })
    }

    fn contains(&self, id: &str) -> bool {
        self.pools.referenced.contains_key(id) || self.pools.virtuals.contains_key(id) || self.pools.task.contains_key(id)
    }

    /// Records a fragment in its pool (once) and returns its id.
    fn fragment(&mut self, fragment: &FragmentRef) -> Result<String> {
        let id = fragment.id().to_string();
        if self.contains(&id) {
            return Ok(id);
        }

        match fragment.as_ref() {
            ContextFragment::ProjectPath(f) => {
                self.referenced(ReferencedRecord::ProjectFile {
                    id: id.clone(),
                    repo_root: f.file().root().display().to_string(),
                    rel_path: f.file().rel_path().to_string(),
                });
            }
            ContextFragment::ExternalPath(f) => {
                self.referenced(ReferencedRecord::ExternalFile {
                    id: id.clone(),
                    abs_path: f.file().abs_path().display().to_string(),
                });
            }
            ContextFragment::ImageFile(f) => {
                self.referenced(ReferencedRecord::ImageFile {
                    id: id.clone(),
                    abs_path: f.file().abs_path().display().to_string(),
                    media_type: f.media_type(),
                    project_file: f.file().as_project_file().map(project_file_record),
                });
            }
            ContextFragment::GitFile(f) => {
                self.referenced(ReferencedRecord::GitFile {
                    id: id.clone(),
                    repo_root: f.file().root().display().to_string(),
                    rel_path: f.file().rel_path().to_string(),
                    revision: f.revision().to_string(),
                    content: f.content().to_string(),
                });
            }
            ContextFragment::Task(f) => {
                self.pools.task.insert(id.clone(), task_record(&id, f));
            }
            ContextFragment::String(f) => {
                self.virtual_record(VirtualRecord::String {
                    id: id.clone(),
                    text: f.text()?,
                    description: f.description(),
                    syntax_style: f.syntax_style(),
                });
            }
            ContextFragment::Search(f) => {
                self.virtual_record(VirtualRecord::Search {
                    id: id.clone(),
                    query: f.query().to_string(),
                    messages: f.messages().iter().map(message_record).collect(),
                    sources: f.sources().iter().map(code_unit_record).collect(),
                });
            }
            ContextFragment::Skeleton(f) => {
                self.virtual_record(VirtualRecord::Skeleton {
                    id: id.clone(),
                    target_identifiers: f.targets().to_vec(),
                    summary_type: f.summary_type(),
                });
            }
            ContextFragment::Usage(f) => {
                self.virtual_record(VirtualRecord::Usage {
                    id: id.clone(),
                    target_identifier: f.target_identifier().to_string(),
                });
            }
            ContextFragment::CallGraph(f) => {
                self.virtual_record(VirtualRecord::CallGraph {
                    id: id.clone(),
                    method_name: f.method_name().to_string(),
                    depth: f.depth(),
                    is_callee_graph: f.direction().is_callee_graph(),
                });
            }
            ContextFragment::PasteText(f) => {
                self.virtual_record(VirtualRecord::PasteText {
                    id: id.clone(),
                    text: f.text()?,
                    description: f.resolved_description(self.timeout),
                });
            }
            ContextFragment::PasteImage(f) => {
                self.virtual_record(VirtualRecord::PasteImage {
                    id: id.clone(),
                    image_base64: BASE64.encode(f.bytes()),
                    description: f.resolved_description(self.timeout),
                });
            }
            ContextFragment::Stacktrace(f) => {
                self.virtual_record(VirtualRecord::Stacktrace {
                    id: id.clone(),
                    sources: f.sources().iter().map(code_unit_record).collect(),
                    original: f.original().to_string(),
                    exception: f.exception().to_string(),
                    code: f.code().to_string(),
                });
            }
            ContextFragment::History(f) => {
                let mut history = Vec::with_capacity(f.entries().len());
                for entry in f.entries() {
                    history.push(self.entry(entry)?);
                }
                self.virtual_record(VirtualRecord::History { id: id.clone(), history });
            }
            ContextFragment::Frozen(f) => {
                let record = frozen_record(&id, f);
                if f.original_kind().is_path() {
                    self.referenced(ReferencedRecord::Frozen(record));
                } else {
                    self.virtual_record(VirtualRecord::Frozen(record));
                }
            }
        }
        Ok(id)
    }

    fn referenced(&mut self, record: ReferencedRecord) {
        self.pools.referenced.insert(record.id().to_string(), record);
    }

    fn virtual_record(&mut self, record: VirtualRecord) {
        self.pools.virtuals.insert(record.id().to_string(), record);
    }
}

fn project_file_record(file: &ProjectFile) -> ProjectFileRecord {
    ProjectFileRecord {
        repo_root: file.root().display().to_string(),
        rel_path: file.rel_path().to_string(),
    }
}

fn message_record(message: &ChatMessage) -> ChatMessageRecord {
    ChatMessageRecord {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
    }
}

fn code_unit_record(unit: &CodeUnit) -> CodeUnitRecord {
    CodeUnitRecord {
        source_file: project_file_record(&unit.source),
        kind: unit.kind,
        namespace: unit.namespace.clone(),
        short_name: unit.short_name.clone(),
    }
}

fn task_record(id: &str, task: &TaskFragment) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        session_name: task.session_name().to_string(),
        messages: task.messages().iter().map(message_record).collect(),
    }
}

fn frozen_record(id: &str, snapshot: &FrozenFragment) -> FrozenRecord {
    let parts = snapshot.parts();
    let (text_content, image_base64) = match &parts.payload {
        FrozenPayload::Text(text) => (Some(text.clone()), None),
        FrozenPayload::Image(bytes) => (None, Some(BASE64.encode(bytes))),
    };
    FrozenRecord {
        id: id.to_string(),
        original_type: parts.original_kind,
        description: parts.description.clone(),
        short_description: parts.short_description.clone(),
        is_text: text_content.is_some(),
        text_content,
        image_base64,
        syntax_style: parts.syntax_style.clone(),
        files: parts.files.iter().map(project_file_record).collect(),
        meta: parts.meta.clone(),
    }
}

/// Where a reference appears, and therefore what it may resolve to.
#[derive(Debug, Clone, Copy)]
enum Site {
    /// Editable and read-only lists.
    Referenced,
    /// The virtual list.
    Virtual,
    /// Task entries and parsed outputs.
    TaskLog,
}

impl Site {
    fn label(self) -> &'static str {
        match self {
            Site::Referenced => "path fragment",
            Site::Virtual => "virtual fragment",
            Site::TaskLog => "task log",
        }
    }

    fn accepts(self, fragment: &ContextFragment) -> bool {
        match (self, fragment) {
            (Site::TaskLog, ContextFragment::Task(_)) => true,
            (Site::TaskLog, _) => false,
            (Site::Referenced, ContextFragment::Frozen(f)) => f.original_kind().is_path(),
            (Site::Virtual, ContextFragment::Frozen(f)) => f.original_kind().is_virtual(),
            (Site::Referenced, other) => other.kind().is_path(),
            (Site::Virtual, other) => other.kind().is_virtual(),
        }
    }
}

struct Loader<'a> {
    pools: &'a FragmentPools,
    services: &'a ContextServices,
    /// One fragment per id, shared by every reference to it.
    resolved: HashMap<String, FragmentRef>,
    /// Ids currently being built, to reject self-referencing histories.
    resolving: HashSet<String>,
}

impl Loader<'_> {
    fn context(&mut self, record: &CompactContextRecord) -> Result<Context> {
        let mut context = Context::new(record.action.clone());
        for id in &record.editable {
            context.editable.push(self.resolve_at(id, Site::Referenced)?);
        }
        for id in &record.readonly {
            context.readonly.push(self.resolve_at(id, Site::Referenced)?);
        }
        for id in &record.virtuals {
            context.virtuals.push(self.resolve_at(id, Site::Virtual)?);
        }
        for entry in &record.tasks {
            context.task_history.push(self.entry(entry)?);
        }
        if let Some(id) = &record.parsed_output_id {
            context.parsed_output = Some(self.resolve_at(id, Site::TaskLog)?);
        }
        Ok(context)
    }

    fn entry(&mut self, record: &TaskEntryRecord) -> Result<TaskEntry> {
        match (&record.log_id, &record.summary) {
            (Some(id), None) => TaskEntry::log(record.sequence, self.resolve_at(id, Site::TaskLog)?),
            (None, Some(summary)) => Ok(TaskEntry::compressed(record.sequence, summary.clone())),
            _ => Err(FragmentError::InvalidRecord(format!(
                "task entry {} must have exactly one of log_id and summary",
                record.sequence
            ))),
        }
    }

    fn resolve_at(&mut self, id: &str, site: Site) -> Result<FragmentRef> {
        let fragment = self.resolve(id)?;
        if !site.accepts(&fragment) {
            return Err(FragmentError::InconsistentReference {
                id: id.to_string(),
                expected: site.label(),
                found: fragment.label(),
            });
        }
        Ok(fragment)
    }

    /// Resolves an id, building its fragment on first use. Pools are
    /// searched referenced, then virtual, then task.
    fn resolve(&mut self, id: &str) -> Result<FragmentRef> {
        if let Some(fragment) = self.resolved.get(id) {
            return Ok(Arc::clone(fragment));
        }
        if !self.resolving.insert(id.to_string()) {
            return Err(FragmentError::InvalidRecord(format!("fragment {} refers to itself", id)));
        }

        let pools = self.pools;
        let built = if let Some(record) = pools.referenced.get(id) {
            check_record_id(id, record.id())?;
            self.referenced(record)?
        } else if let Some(record) = pools.virtuals.get(id) {
            check_record_id(id, record.id())?;
            self.virtual_record(record)?
        } else if let Some(record) = pools.task.get(id) {
            check_record_id(id, &record.id)?;
            self.task(record)?
        } else {
            return Err(FragmentError::DanglingReference(id.to_string()));
        };

        let fragment = built.shared();
        debug!(id, kind = %fragment.label(), "Resolved fragment record");
        self.resolving.remove(id);
        self.resolved.insert(id.to_string(), Arc::clone(&fragment));
        Ok(fragment)
    }

    fn referenced(&mut self, record: &ReferencedRecord) -> Result<ContextFragment> {
        let services = self.services;
        Ok(match record {
            ReferencedRecord::ProjectFile { id, repo_root, rel_path } => {
                ProjectPathFragment::with_id(ProjectFile::new(repo_root, rel_path), id, services)?.into()
            }
            ReferencedRecord::ExternalFile { id, abs_path } => {
                ExternalPathFragment::with_id(ExternalFile::new(abs_path), id, services)?.into()
            }
            ReferencedRecord::ImageFile {
                id,
                abs_path,
                project_file: inside_project,
                ..
            } => {
                let file = match inside_project {
                    Some(pf) => FileRef::Project(project_file(pf)),
                    None => FileRef::External(ExternalFile::new(abs_path)),
                };
                ImageFileFragment::with_id(file, id, services)?.into()
            }
            ReferencedRecord::GitFile {
                id,
                repo_root,
                rel_path,
                revision,
                content,
            } => GitFileFragment::with_id(ProjectFile::new(repo_root, rel_path), revision, content.clone(), id)?.into(),
            ReferencedRecord::Frozen(record) => self.frozen(record)?,
        })
    }

    fn virtual_record(&mut self, record: &VirtualRecord) -> Result<ContextFragment> {
        let services = self.services;
        Ok(match record {
            VirtualRecord::Task(record) => self.task(record)?,
            VirtualRecord::String {
                id,
                text,
                description,
                syntax_style,
            } => StringFragment::with_id(id, text, description, syntax_style, services)?.into(),
            VirtualRecord::Search {
                id,
                query,
                messages,
                sources,
            } => SearchFragment::with_id(id, query, chat_messages(messages)?, code_units(sources))?.into(),
            VirtualRecord::Skeleton {
                id,
                target_identifiers,
                summary_type,
            } => SkeletonFragment::with_id(id, target_identifiers.clone(), *summary_type, services)?.into(),
            VirtualRecord::Usage { id, target_identifier } => {
                UsageFragment::with_id(id, target_identifier, services)?.into()
            }
            VirtualRecord::CallGraph {
                id,
                method_name,
                depth,
                is_callee_graph,
            } => {
                if *depth == 0 {
                    return Err(FragmentError::InvalidRecord(format!(
                        "call graph {} has depth 0",
                        id
                    )));
                }
                CallGraphFragment::with_id(
                    id,
                    method_name,
                    *depth,
                    CallDirection::from_callee_flag(*is_callee_graph),
                    services,
                )?
                .into()
            }
            VirtualRecord::PasteText { id, text, description } => {
                PasteTextFragment::with_id(id, text, Deferred::ready(description.clone()), services)?.into()
            }
            VirtualRecord::PasteImage {
                id,
                image_base64,
                description,
            } => {
                let bytes = decode_base64(id, image_base64)?;
                PasteImageFragment::with_id(id, bytes, Deferred::ready(description.clone()))?.into()
            }
            VirtualRecord::Stacktrace {
                id,
                sources,
                original,
                exception,
                code,
            } => StacktraceFragment::with_id(id, code_units(sources), original, exception, code)?.into(),
            VirtualRecord::History { id, history } => {
                let mut entries = Vec::with_capacity(history.len());
                for entry in history {
                    entries.push(self.entry(entry)?);
                }
                HistoryFragment::with_id(id, entries)?.into()
            }
            VirtualRecord::Frozen(record) => self.frozen(record)?,
        })
    }

    fn task(&mut self, record: &TaskRecord) -> Result<ContextFragment> {
        Ok(TaskFragment::with_id(
            &record.id,
            &record.session_name,
            chat_messages(&record.messages)?,
            self.services,
        )?
        .into())
    }

    /// Rebuilds a snapshot, verifies its hash against the recorded id and
    /// interns it.
    fn frozen(&mut self, record: &FrozenRecord) -> Result<ContextFragment> {
        let expected = FragmentId::parse_content(&record.id)?;
        let payload = match (record.is_text, &record.text_content, &record.image_base64) {
            (true, Some(text), None) => FrozenPayload::Text(text.clone()),
            (false, None, Some(encoded)) => FrozenPayload::Image(decode_base64(&record.id, encoded)?),
            _ => {
                return Err(FragmentError::InvalidRecord(format!(
                    "snapshot {} must carry exactly the payload matching is_text={}",
                    record.id, record.is_text
                )))
            }
        };
        let parts = FrozenParts {
            original_kind: record.original_type,
            description: record.description.clone(),
            short_description: record.short_description.clone(),
            payload,
            syntax_style: record.syntax_style.clone(),
            files: record.files.iter().map(project_file).collect::<BTreeSet<_>>(),
            meta: record.meta.clone(),
        };

        let actual = FragmentId::from(parts.content_hash());
        if actual != expected {
            return Err(FragmentError::ContentHashMismatch {
                expected: record.id.clone(),
                actual: actual.to_string(),
            });
        }
        Ok(ContextFragment::Frozen(self.services.interner().intern(parts)))
    }
}

fn check_record_id(key: &str, record_id: &str) -> Result<()> {
    if key != record_id {
        return Err(FragmentError::InvalidRecord(format!(
            "record stored under {} carries id {}",
            key, record_id
        )));
    }
    Ok(())
}

fn project_file(record: &ProjectFileRecord) -> ProjectFile {
    ProjectFile::new(&record.repo_root, &record.rel_path)
}

fn chat_messages(records: &[ChatMessageRecord]) -> Result<Vec<ChatMessage>> {
    records
        .iter()
        .map(|r| Ok(ChatMessage::new(r.role.parse()?, r.content.clone())))
        .collect()
}

fn code_units(records: &[CodeUnitRecord]) -> BTreeSet<CodeUnit> {
    records
        .iter()
        .map(|r| CodeUnit::new(project_file(&r.source_file), r.kind, &r.namespace, &r.short_name))
        .collect()
}

fn decode_base64(id: &str, encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| FragmentError::InvalidRecord(format!("fragment {} has invalid image data: {}", id, e)))
}
