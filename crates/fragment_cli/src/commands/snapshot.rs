//! Snapshot command: commit files as one turn and save the session.

use super::{fragment_for, open_services, report};
use anyhow::{Context as _, Result};
use console::style;
use fragment_core::{Context, ContextHistory, SessionStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Build a context from `paths`, freeze it and write a session file.
pub fn run(root: &Path, out: &Path, action: &str, paths: &[PathBuf]) -> Result<()> {
    let services = open_services(root)?;

    let mut live = Context::new(action);
    for path in paths {
        live = live.with_editable(fragment_for(&services, path));
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message("Freezing context...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut history = ContextHistory::new();
    let committed = history.commit(&live, &services).map_err(report);
    let kept = match committed {
        Ok(ctx) => ctx.editable.len(),
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Saving session...");
    let store = SessionStore::new(services.config());
    let saved = store
        .save(out, &history, &services)
        .map_err(report)
        .with_context(|| format!("Failed to save session to {}", out.display()));
    spinner.finish_and_clear();
    saved?;

    println!(
        "Saved session to {} ({} fragment(s), {} dropped)",
        style(out.display()).bold(),
        style(kept).green(),
        style(paths.len() - kept).red()
    );
    Ok(())
}
