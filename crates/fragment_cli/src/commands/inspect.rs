//! Inspect command: print the turns of a saved session.

use super::{kind_label, open_services, report};
use anyhow::Result;
use console::style;
use fragment_core::{ContextFragment, Fragment, SessionStore, TaskEntryContent};
use std::path::Path;

pub fn run(file: &Path, root: &Path) -> Result<()> {
    let services = open_services(root)?;
    let store = SessionStore::new(services.config());
    let history = store.load(file, &services).map_err(report)?;

    println!("{} {}", style("Session:").bold(), file.display());
    for (turn, ctx) in history.contexts().iter().enumerate() {
        println!();
        println!("{} {}", style(format!("Turn {}:", turn + 1)).bold(), ctx.action);
        for fragment in &ctx.editable {
            print_fragment("editable", fragment);
        }
        for fragment in &ctx.readonly {
            print_fragment("readonly", fragment);
        }
        for fragment in &ctx.virtuals {
            print_fragment("virtual", fragment);
        }
        for entry in &ctx.task_history {
            match &entry.content {
                TaskEntryContent::Log(log) => println!(
                    "  {:<10} #{} {}",
                    style("task").dim(),
                    entry.sequence,
                    log.description()
                ),
                TaskEntryContent::Compressed(summary) => println!(
                    "  {:<10} #{} {}",
                    style("task").dim(),
                    entry.sequence,
                    first_line(summary)
                ),
            }
        }
        if let Some(output) = &ctx.parsed_output {
            print_fragment("output", output);
        }
    }
    Ok(())
}

fn print_fragment(list: &str, fragment: &ContextFragment) {
    let id = fragment.id().to_string();
    let short = if id.len() > 12 { &id[..12] } else { id.as_str() };
    println!(
        "  {:<10} {} {:<22} {}",
        style(list).dim(),
        style(short).yellow(),
        style(kind_label(fragment)).cyan(),
        fragment.description()
    );
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
