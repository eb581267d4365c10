//! Session verification command.

use super::{open_services, report};
use anyhow::Result;
use console::style;
use fragment_core::{persist, SessionStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Load a session, verifying every reference and snapshot hash.
pub fn run(file: &Path, root: &Path) -> Result<()> {
    let services = open_services(root)?;
    let store = SessionStore::new(services.config());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Verifying session...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let loaded = store
        .read_document(file)
        .and_then(|doc| persist::from_document(&doc, &services).map(|history| (doc, history)));
    pb.finish_and_clear();
    let (doc, history) = loaded.map_err(report)?;

    println!();
    println!("{}", style("Verification Report:").bold());
    println!("  Format version:     {}", style(doc.version).cyan());
    println!("  Contexts:           {}", style(history.len()).cyan());
    println!(
        "  Path fragments:     {}",
        style(doc.fragments.referenced.len()).cyan()
    );
    println!(
        "  Virtual fragments:  {}",
        style(doc.fragments.virtuals.len()).cyan()
    );
    println!("  Task logs:          {}", style(doc.fragments.task.len()).cyan());
    println!(
        "  Snapshots verified: {}",
        style(services.interner().len()).cyan()
    );
    println!(
        "  Next dynamic id:    {}",
        style(services.ids().current_watermark()).cyan()
    );
    println!();
    println!("{} Session is consistent", style("✓").green());
    Ok(())
}
