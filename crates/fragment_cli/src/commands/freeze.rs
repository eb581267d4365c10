//! Freeze command: capture files as content-addressed snapshots.

use super::{fragment_for, open_services, report};
use anyhow::{bail, Result};
use console::style;
use fragment_core::{freeze, Fragment};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Freeze each path and print its content hash.
///
/// Files that cannot be read are reported and skipped.
pub fn run(root: &Path, paths: &[PathBuf]) -> Result<()> {
    let services = open_services(root)?;

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{bar:30.cyan/blue} {pos}/{len} {msg}")?);

    let mut frozen = Vec::new();
    let mut failed = Vec::new();
    for path in paths {
        pb.set_message(path.display().to_string());
        let fragment = fragment_for(&services, path);
        match freeze(&fragment, &services) {
            Ok(snapshot) => frozen.push(snapshot),
            Err(e) if e.is_recoverable() => failed.push((path, e)),
            Err(e) => {
                pb.abandon();
                return Err(report(e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    for snapshot in &frozen {
        println!(
            "{} {:<14} {}",
            style(&snapshot.content_hash().as_hex()[..12]).yellow(),
            style(snapshot.original_kind()).cyan(),
            snapshot.description()
        );
    }
    for (path, e) in &failed {
        println!("{} {}: {}", style("×").red(), path.display(), e);
    }

    println!();
    println!(
        "Froze {} file(s), skipped {}, {} distinct snapshot(s)",
        style(frozen.len()).green(),
        style(failed.len()).red(),
        services.interner().len()
    );

    if frozen.is_empty() && !failed.is_empty() {
        bail!("No files could be frozen");
    }
    Ok(())
}
