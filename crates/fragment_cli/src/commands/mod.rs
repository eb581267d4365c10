//! CLI commands.

pub mod freeze;
pub mod inspect;
pub mod snapshot;
pub mod verify;

use anyhow::{Context, Result};
use console::style;
use fragment_core::{
    image_media_type, ContextFragment, ContextServices, ExternalFile, ExternalPathFragment, FileRef, Fragment,
    FragmentConfig, FragmentError, FragmentRef, ImageFileFragment, ProjectFile, ProjectPathFragment,
};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Directory under the project root holding `config.toml`.
pub const CONFIG_DIR: &str = ".ctxfrag";

/// Session services for a project root, configured from `<root>/.ctxfrag`.
pub fn open_services(root: &Path) -> Result<ContextServices> {
    let root = fs::canonicalize(root).with_context(|| format!("Cannot open project root {}", root.display()))?;
    let config = FragmentConfig::load(&root.join(CONFIG_DIR)).map_err(report)?;
    debug!(root = %root.display(), "Opening project");
    Ok(ContextServices::for_directory(root).with_config(config))
}

/// Builds a live fragment for a command-line path.
///
/// Paths that resolve inside the project become project files, anything
/// else external files. Files whose extension names an image type become
/// image fragments.
pub fn fragment_for(services: &ContextServices, path: &Path) -> FragmentRef {
    let root = services.project().root();
    let abs = resolve(root, path);
    let is_image = image_media_type(&abs).is_some_and(|m| m.starts_with("image/"));

    let fragment: ContextFragment = match abs.strip_prefix(root) {
        Ok(rel) => {
            let file = ProjectFile::new(root, &rel.to_string_lossy());
            if is_image {
                ImageFileFragment::new(FileRef::Project(file), services).into()
            } else {
                ProjectPathFragment::new(file, services).into()
            }
        }
        Err(_) => {
            let file = ExternalFile::new(abs);
            if is_image {
                ImageFileFragment::new(FileRef::External(file), services).into()
            } else {
                ExternalPathFragment::new(file, services).into()
            }
        }
    };
    fragment.shared()
}

/// Absolute form of a command-line path. Existing files are canonicalized;
/// missing ones have `.` and `..` removed lexically.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    if let Ok(real) = fs::canonicalize(&joined) {
        return real;
    }
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Prints the recovery hint for an error, if it has one, and converts it.
pub fn report(err: FragmentError) -> anyhow::Error {
    if let Some(hint) = err.recovery_suggestion() {
        eprintln!("{} {}", style("hint:").yellow(), hint);
    }
    err.into()
}

/// Kind label shown in listings: snapshots show the kind they captured.
pub fn kind_label(fragment: &ContextFragment) -> String {
    match fragment.as_frozen() {
        Some(snapshot) => format!("frozen {}", snapshot.original_kind()),
        None => fragment.kind().to_string(),
    }
}
