//! Content-fixed virtual fragments: plain strings, pastes and stack traces.

use super::{files_of, parse_project_files, style_of_sources, Fragment, FragmentKind, IMAGE_OUT_OF_BAND};
use crate::deferred::{Deferred, DeferredError};
use crate::error::Result;
use crate::files::{syntax, ProjectFile};
use crate::hasher::{HashFields, PayloadRef};
use crate::ids::FragmentId;
use crate::services::ContextServices;
use crate::symbols::CodeUnit;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Description shown while a paste is still being summarized.
pub const PASTE_SUMMARIZING: &str = "(Summarizing. This does not block LLM requests)";
/// Description shown when summarizing a paste failed.
pub const PASTE_SUMMARY_FAILED: &str = "(Error summarizing paste)";
/// Captured description when the bounded wait elapsed.
pub const PASTE_DESCRIPTION_TIMED_OUT: &str = "(Paste description timed out)";
/// Captured description when the description computation failed.
pub const PASTE_DESCRIPTION_ERROR: &str = "(Error getting paste description)";

const PASTING_TEXT: &str = "(Pasting text)";
const PASTING_IMAGE: &str = "(Pasting image)";

/// Waits at most `timeout` for a paste description, substituting a
/// placeholder instead of failing.
fn resolve_paste_description(description: &Deferred<String>, timeout: Duration, id: FragmentId) -> String {
    match description.get_timeout(timeout) {
        Ok(resolved) => resolved,
        Err(DeferredError::TimedOut) => {
            warn!(fragment = %id, timeout_ms = timeout.as_millis() as u64, "Paste description timed out");
            PASTE_DESCRIPTION_TIMED_OUT.to_string()
        }
        Err(e) => {
            warn!(fragment = %id, error = %e, "Paste description unavailable");
            PASTE_DESCRIPTION_ERROR.to_string()
        }
    }
}

fn peek_paste_description(description: &Deferred<String>, prefix: &str) -> String {
    match description.try_get() {
        None => PASTE_SUMMARIZING.to_string(),
        Some(Ok(resolved)) => format!("{}{}", prefix, resolved),
        Some(Err(_)) => PASTE_SUMMARY_FAILED.to_string(),
    }
}

/// Arbitrary text with a caller-supplied description.
pub struct StringFragment {
    id: FragmentId,
    text: String,
    description: String,
    syntax_style: String,
    services: ContextServices,
}

impl StringFragment {
    pub fn new(text: &str, description: &str, syntax_style: &str, services: &ContextServices) -> Self {
        let id = HashFields::text(FragmentKind::String, description, text, syntax_style)
            .content_id()
            .into();
        Self {
            id,
            text: text.to_string(),
            description: description.to_string(),
            syntax_style: syntax_style.to_string(),
            services: services.clone(),
        }
    }

    pub fn with_id(
        id: &str,
        text: &str,
        description: &str,
        syntax_style: &str,
        services: &ContextServices,
    ) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            text: text.to_string(),
            description: description.to_string(),
            syntax_style: syntax_style.to_string(),
            services: services.clone(),
        })
    }
}

impl Fragment for StringFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::String
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn syntax_style(&self) -> String {
        self.syntax_style.clone()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        parse_project_files(&self.text, self.services.project())
    }
}

impl fmt::Debug for StringFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringFragment")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}

/// Pasted text whose description is summarized in the background.
///
/// The id hashes the pasted text only, so it is stable no matter when or
/// how the description resolves.
pub struct PasteTextFragment {
    id: FragmentId,
    text: String,
    description: Deferred<String>,
    services: ContextServices,
}

impl PasteTextFragment {
    pub fn new(text: &str, description: Deferred<String>, services: &ContextServices) -> Self {
        let id = HashFields::text(FragmentKind::PasteText, PASTING_TEXT, text, syntax::MARKDOWN)
            .content_id()
            .into();
        Self {
            id,
            text: text.to_string(),
            description,
            services: services.clone(),
        }
    }

    pub fn with_id(id: &str, text: &str, description: Deferred<String>, services: &ContextServices) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            text: text.to_string(),
            description,
            services: services.clone(),
        })
    }

    pub fn description_future(&self) -> &Deferred<String> {
        &self.description
    }

    /// The summary itself, waiting at most `timeout`; a placeholder on
    /// timeout or failure.
    pub fn resolved_description(&self, timeout: Duration) -> String {
        resolve_paste_description(&self.description, timeout, self.id)
    }
}

impl Fragment for PasteTextFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::PasteText
    }

    fn description(&self) -> String {
        peek_paste_description(&self.description, "Paste of ")
    }

    fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn syntax_style(&self) -> String {
        syntax::MARKDOWN.to_string()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        parse_project_files(&self.text, self.services.project())
    }
}

impl fmt::Debug for PasteTextFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasteTextFragment")
            .field("id", &self.id)
            .field("description", &self.description())
            .finish()
    }
}

/// A pasted image.
pub struct PasteImageFragment {
    id: FragmentId,
    bytes: Vec<u8>,
    description: Deferred<String>,
}

impl PasteImageFragment {
    pub fn new(bytes: Vec<u8>, description: Deferred<String>) -> Self {
        let id = HashFields {
            kind: FragmentKind::PasteImage,
            description: Some(PASTING_IMAGE),
            short_description: None,
            syntax_style: Some(syntax::NONE),
            payload: PayloadRef::Image(&bytes),
        }
        .content_id()
        .into();
        Self {
            id,
            bytes,
            description,
        }
    }

    pub fn with_id(id: &str, bytes: Vec<u8>, description: Deferred<String>) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            bytes,
            description,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn description_future(&self) -> &Deferred<String> {
        &self.description
    }

    pub fn resolved_description(&self, timeout: Duration) -> String {
        resolve_paste_description(&self.description, timeout, self.id)
    }
}

impl Fragment for PasteImageFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::PasteImage
    }

    fn description(&self) -> String {
        peek_paste_description(&self.description, "")
    }

    fn text(&self) -> Result<String> {
        Ok(IMAGE_OUT_OF_BAND.to_string())
    }

    fn image(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.bytes.clone()))
    }

    fn is_text(&self) -> bool {
        false
    }

    fn syntax_style(&self) -> String {
        syntax::NONE.to_string()
    }
}

impl fmt::Debug for PasteImageFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasteImageFragment")
            .field("id", &self.id)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A stack trace plus the bodies of the project methods it passes through.
#[derive(Debug)]
pub struct StacktraceFragment {
    id: FragmentId,
    sources: BTreeSet<CodeUnit>,
    original: String,
    exception: String,
    code: String,
}

impl StacktraceFragment {
    pub fn new(sources: BTreeSet<CodeUnit>, original: &str, exception: &str, code: &str) -> Self {
        let description = Self::describe(exception);
        let text = Self::render(original, code);
        let style = style_of_sources(&sources);
        let id = HashFields::text(FragmentKind::Stacktrace, &description, &text, &style)
            .content_id()
            .into();
        Self {
            id,
            sources,
            original: original.to_string(),
            exception: exception.to_string(),
            code: code.to_string(),
        }
    }

    pub fn with_id(
        id: &str,
        sources: BTreeSet<CodeUnit>,
        original: &str,
        exception: &str,
        code: &str,
    ) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            sources,
            original: original.to_string(),
            exception: exception.to_string(),
            code: code.to_string(),
        })
    }

    fn describe(exception: &str) -> String {
        format!("stacktrace of {}", exception)
    }

    fn render(original: &str, code: &str) -> String {
        format!("{}\n\nStacktrace methods in this project:\n\n{}", original, code)
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn exception(&self) -> &str {
        &self.exception
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl Fragment for StacktraceFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::Stacktrace
    }

    fn description(&self) -> String {
        Self::describe(&self.exception)
    }

    fn text(&self) -> Result<String> {
        Ok(Self::render(&self.original, &self.code))
    }

    fn syntax_style(&self) -> String {
        style_of_sources(&self.sources)
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
