//! Path-backed fragments.

use super::{claim_dynamic_id, Fragment, FragmentKind, IMAGE_OUT_OF_BAND};
use crate::error::{FragmentError, Result};
use crate::files::{image_media_type, looks_like_image, syntax, ExternalFile, FileRef, ProjectFile};
use crate::hasher::HashFields;
use crate::ids::FragmentId;
use crate::services::{ContextServices, VersionControl};
use crate::symbols::CodeUnit;
use std::collections::BTreeSet;
use std::fmt;

fn format_file(path: impl fmt::Display, id: FragmentId, body: &str) -> String {
    format!(
        "<file path=\"{}\" fragmentid=\"{}\">\n{}\n</file>\n",
        path, id, body
    )
}

/// A file in the project, read live from disk.
pub struct ProjectPathFragment {
    id: FragmentId,
    file: ProjectFile,
    services: ContextServices,
}

impl ProjectPathFragment {
    pub fn new(file: ProjectFile, services: &ContextServices) -> Self {
        Self {
            id: services.ids().next_dynamic_id(),
            file,
            services: services.clone(),
        }
    }

    /// Rebuilds a fragment that was assigned `id` earlier.
    pub fn with_id(file: ProjectFile, id: &str, services: &ContextServices) -> Result<Self> {
        Ok(Self {
            id: claim_dynamic_id(id, services)?,
            file,
            services: services.clone(),
        })
    }

    pub fn file(&self) -> &ProjectFile {
        &self.file
    }
}

impl Fragment for ProjectPathFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::ProjectPath
    }

    fn description(&self) -> String {
        self.file.describe()
    }

    fn short_description(&self) -> String {
        self.file.file_name().to_string()
    }

    fn text(&self) -> Result<String> {
        self.services.read_text(self.file.abs_path())
    }

    fn syntax_style(&self) -> String {
        self.file.syntax_style().to_string()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        BTreeSet::from([self.file.clone()])
    }

    fn sources(&self) -> BTreeSet<CodeUnit> {
        self.services
            .analyzer()
            .declarations_in_file(&self.file)
            .ready()
            .unwrap_or_default()
    }

    // The file itself is already in context; seeding suggestions from it
    // would only point back at it.
    fn is_eligible_for_auto_context(&self) -> bool {
        false
    }

    fn format(&self) -> Result<String> {
        Ok(format_file(&self.file, self.id, &self.text()?))
    }

    fn format_summary(&self) -> Result<String> {
        Ok(format!("<file source=\"{}\" />", self.file))
    }
}

impl fmt::Debug for ProjectPathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectPathFragment")
            .field("id", &self.id)
            .field("file", &self.file)
            .finish()
    }
}

/// A file outside the project.
pub struct ExternalPathFragment {
    id: FragmentId,
    file: ExternalFile,
    services: ContextServices,
}

impl ExternalPathFragment {
    pub fn new(file: ExternalFile, services: &ContextServices) -> Self {
        Self {
            id: services.ids().next_dynamic_id(),
            file,
            services: services.clone(),
        }
    }

    pub fn with_id(file: ExternalFile, id: &str, services: &ContextServices) -> Result<Self> {
        Ok(Self {
            id: claim_dynamic_id(id, services)?,
            file,
            services: services.clone(),
        })
    }

    pub fn file(&self) -> &ExternalFile {
        &self.file
    }
}

impl Fragment for ExternalPathFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::ExternalPath
    }

    fn description(&self) -> String {
        self.file.to_string()
    }

    fn short_description(&self) -> String {
        self.file.file_name()
    }

    fn text(&self) -> Result<String> {
        self.services.read_text(self.file.abs_path())
    }

    fn syntax_style(&self) -> String {
        self.file.syntax_style().to_string()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn format(&self) -> Result<String> {
        Ok(format_file(&self.file, self.id, &self.text()?))
    }

    fn format_summary(&self) -> Result<String> {
        Ok(format!("<file source=\"{}\" />", self.file))
    }
}

impl fmt::Debug for ExternalPathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalPathFragment")
            .field("id", &self.id)
            .field("file", &self.file)
            .finish()
    }
}

/// An image file, inside or outside the project.
pub struct ImageFileFragment {
    id: FragmentId,
    file: FileRef,
    services: ContextServices,
}

impl ImageFileFragment {
    pub fn new(file: FileRef, services: &ContextServices) -> Self {
        Self {
            id: services.ids().next_dynamic_id(),
            file,
            services: services.clone(),
        }
    }

    pub fn with_id(file: FileRef, id: &str, services: &ContextServices) -> Result<Self> {
        Ok(Self {
            id: claim_dynamic_id(id, services)?,
            file,
            services: services.clone(),
        })
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    /// Media type guessed from the file extension.
    pub fn media_type(&self) -> Option<String> {
        image_media_type(self.file.abs_path())
    }
}

impl Fragment for ImageFileFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::ImageFile
    }

    fn description(&self) -> String {
        match &self.file {
            FileRef::Project(file) => file.describe(),
            FileRef::External(file) => file.to_string(),
        }
    }

    fn short_description(&self) -> String {
        self.file.file_name()
    }

    fn text(&self) -> Result<String> {
        Ok(IMAGE_OUT_OF_BAND.to_string())
    }

    fn image(&self) -> Result<Option<Vec<u8>>> {
        let bytes = self.services.read_bytes(self.file.abs_path())?;
        if !looks_like_image(&bytes) {
            return Err(FragmentError::NotAnImage {
                path: self.file.abs_path().to_path_buf(),
            });
        }
        Ok(Some(bytes))
    }

    fn is_text(&self) -> bool {
        false
    }

    fn syntax_style(&self) -> String {
        syntax::NONE.to_string()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        self.file.as_project_file().cloned().into_iter().collect()
    }

    fn format(&self) -> Result<String> {
        Ok(format_file(&self.file, self.id, IMAGE_OUT_OF_BAND))
    }

    fn format_summary(&self) -> Result<String> {
        Ok(format!("<file source=\"{}\" />", self.file))
    }
}

impl fmt::Debug for ImageFileFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFileFragment")
            .field("id", &self.id)
            .field("file", &self.file)
            .finish()
    }
}

/// A project file as of a specific revision.
///
/// The content is fetched once, at construction; the fragment never talks
/// to version control again.
#[derive(Debug)]
pub struct GitFileFragment {
    id: FragmentId,
    file: ProjectFile,
    revision: String,
    content: String,
}

impl GitFileFragment {
    /// Length of the abbreviated revision shown in descriptions.
    const SHORT_REVISION_LEN: usize = 7;

    pub fn new(file: ProjectFile, revision: &str, content: String) -> Self {
        let id = Self::compute_id(&file, revision, &content);
        Self {
            id,
            file,
            revision: revision.to_string(),
            content,
        }
    }

    /// Fetches `file` at `revision` from version control.
    pub fn from_revision(file: ProjectFile, revision: &str, vcs: &dyn VersionControl) -> Result<Self> {
        let content = vcs.file_at_revision(&file, revision)?;
        Ok(Self::new(file, revision, content))
    }

    /// Rebuilds a fragment with a persisted content-hash id.
    pub fn with_id(file: ProjectFile, revision: &str, content: String, id: &str) -> Result<Self> {
        Ok(Self {
            id: FragmentId::parse_content(id)?,
            file,
            revision: revision.to_string(),
            content,
        })
    }

    fn compute_id(file: &ProjectFile, revision: &str, content: &str) -> FragmentId {
        let description = format!("{} @{}", file.file_name(), revision);
        HashFields::text(FragmentKind::GitFile, &description, content, file.syntax_style())
            .content_id()
            .into()
    }

    pub fn file(&self) -> &ProjectFile {
        &self.file
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn short_revision(&self) -> &str {
        match self.revision.char_indices().nth(Self::SHORT_REVISION_LEN) {
            Some((idx, _)) => &self.revision[..idx],
            None => &self.revision,
        }
    }
}

impl Fragment for GitFileFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::GitFile
    }

    fn description(&self) -> String {
        format!("{} @{}", self.file.describe(), self.short_revision())
    }

    fn short_description(&self) -> String {
        format!("{} @{}", self.file.file_name(), self.short_revision())
    }

    fn text(&self) -> Result<String> {
        Ok(self.content.clone())
    }

    fn syntax_style(&self) -> String {
        self.file.syntax_style().to_string()
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        BTreeSet::from([self.file.clone()])
    }

    fn format(&self) -> Result<String> {
        Ok(format!(
            "<file path=\"{}\" revision=\"{}\">\n{}\n</file>\n",
            self.file, self.revision, self.content
        ))
    }

    fn format_summary(&self) -> Result<String> {
        Ok(format!("<file source=\"{}\" />", self.file))
    }
}
