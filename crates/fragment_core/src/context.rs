//! Contexts and their history.
//!
//! A [`Context`] is the set of fragments handed to the model for one turn.
//! Committing a context to a [`ContextHistory`] freezes its dynamic fragments
//! so later edits to the working tree do not rewrite the past.

use crate::error::Result;
use crate::fragment::{ContextFragment, Fragment, FragmentRef, TaskEntry};
use crate::frozen::freeze;
use crate::services::ContextServices;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One turn's worth of fragments.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Files the model may edit.
    pub editable: Vec<FragmentRef>,
    /// Files supplied for reference only.
    pub readonly: Vec<FragmentRef>,
    /// Synthesized fragments: analysis results, pastes, conversations.
    pub virtuals: Vec<FragmentRef>,
    pub task_history: Vec<TaskEntry>,
    /// The conversation produced by this turn, if any.
    pub parsed_output: Option<FragmentRef>,
    /// What the user did to reach this context.
    pub action: String,
}

impl Context {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_editable(mut self, fragment: FragmentRef) -> Self {
        self.editable.push(fragment);
        self
    }

    pub fn with_readonly(mut self, fragment: FragmentRef) -> Self {
        self.readonly.push(fragment);
        self
    }

    pub fn with_virtual(mut self, fragment: FragmentRef) -> Self {
        self.virtuals.push(fragment);
        self
    }

    pub fn with_task(mut self, entry: TaskEntry) -> Self {
        self.task_history.push(entry);
        self
    }

    pub fn with_parsed_output(mut self, output: FragmentRef) -> Self {
        self.parsed_output = Some(output);
        self
    }

    /// Every fragment the context holds directly, in list order.
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentRef> {
        self.editable
            .iter()
            .chain(self.readonly.iter())
            .chain(self.virtuals.iter())
            .chain(self.task_history.iter().filter_map(TaskEntry::log_fragment))
            .chain(self.parsed_output.iter())
    }

    /// Table of contents of the editable, read-only and virtual fragments.
    pub fn format_toc(&self) -> String {
        self.editable
            .iter()
            .chain(self.readonly.iter())
            .chain(self.virtuals.iter())
            .map(|f| f.format_toc())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns a copy with every dynamic fragment replaced by its snapshot.
    ///
    /// Content-fixed fragments, task entries and the parsed output are kept
    /// as they are. A fragment that fails with a recoverable error (missing
    /// file, cancellation) is dropped from the copy; any other error aborts.
    /// A fragment shared between lists is frozen once and stays shared.
    pub fn freeze(&self, services: &ContextServices) -> Result<Context> {
        let mut frozen: HashMap<*const ContextFragment, Option<FragmentRef>> = HashMap::new();

        let editable = freeze_list(&self.editable, services, &mut frozen)?;
        let readonly = freeze_list(&self.readonly, services, &mut frozen)?;
        let virtuals = freeze_list(&self.virtuals, services, &mut frozen)?;

        debug!(
            action = %self.action,
            fragments = frozen.len(),
            "froze context"
        );

        Ok(Context {
            editable,
            readonly,
            virtuals,
            task_history: self.task_history.clone(),
            parsed_output: self.parsed_output.clone(),
            action: self.action.clone(),
        })
    }
}

fn freeze_list(
    fragments: &[FragmentRef],
    services: &ContextServices,
    frozen: &mut HashMap<*const ContextFragment, Option<FragmentRef>>,
) -> Result<Vec<FragmentRef>> {
    let mut out = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let key = Arc::as_ptr(fragment);
        let replacement = match frozen.get(&key) {
            Some(done) => done.clone(),
            None => {
                let result = freeze_one(fragment, services)?;
                frozen.insert(key, result.clone());
                result
            }
        };
        out.extend(replacement);
    }
    Ok(out)
}

fn freeze_one(fragment: &FragmentRef, services: &ContextServices) -> Result<Option<FragmentRef>> {
    if !fragment.is_dynamic() {
        return Ok(Some(Arc::clone(fragment)));
    }
    match freeze(fragment, services) {
        Ok(snapshot) => Ok(Some(ContextFragment::Frozen(snapshot).shared())),
        Err(e) if e.is_recoverable() => {
            warn!(
                fragment = %fragment.id(),
                kind = %fragment.kind(),
                error = %e,
                "dropping fragment that could not be frozen"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The sequence of committed contexts of a session.
#[derive(Debug, Clone, Default)]
pub struct ContextHistory {
    contexts: Vec<Context>,
}

impl ContextHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an already frozen (or deserialized) context.
    pub fn push(&mut self, context: Context) {
        self.contexts.push(context);
    }

    /// Freezes `live` and appends the result.
    pub fn commit(&mut self, live: &Context, services: &ContextServices) -> Result<&Context> {
        let frozen = live.freeze(services)?;
        self.contexts.push(frozen);
        Ok(&self.contexts[self.contexts.len() - 1])
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn latest(&self) -> Option<&Context> {
        self.contexts.last()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
