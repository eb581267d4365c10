use super::steps::ListKind;
use anyhow::{anyhow, bail, ensure, Result};
use fragment_core::{ContextHistory, ContextServices, Fragment, FragmentRef};
use std::sync::Arc;

/// A fragment position inside a committed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Editable(usize),
    Readonly(usize),
    Virtual(usize),
    TaskLog(usize),
    ParsedOutput,
}

/// Declarative assertions on session state
pub enum Assertion {
    // History
    HistoryLen(usize),
    ListLen {
        turn: usize,
        list: ListKind,
        len: usize,
    },
    Action {
        turn: usize,
        action: String,
    },

    // Fragments
    Text {
        turn: usize,
        slot: Slot,
        text: String,
    },
    IsFrozen {
        turn: usize,
        slot: Slot,
    },
    IsLive {
        turn: usize,
        slot: Slot,
    },
    SameFragment {
        a: (usize, Slot),
        b: (usize, Slot),
    },
    DistinctFragments {
        a: (usize, Slot),
        b: (usize, Slot),
    },

    // Session services
    InternedSnapshots(usize),
    NextDynamicIdAtLeast(u64),

    // Custom
    Custom(Box<dyn Fn(&ContextHistory, &ContextServices) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HistoryLen(n) => write!(f, "HistoryLen({})", n),
            Self::ListLen { turn, list, len } => {
                write!(f, "ListLen {{ turn: {}, list: {:?}, len: {} }}", turn, list, len)
            }
            Self::Action { turn, action } => write!(f, "Action {{ turn: {}, action: {:?} }}", turn, action),
            Self::Text { turn, slot, text } => {
                write!(f, "Text {{ turn: {}, slot: {:?}, text: {:?} }}", turn, slot, text)
            }
            Self::IsFrozen { turn, slot } => write!(f, "IsFrozen {{ turn: {}, slot: {:?} }}", turn, slot),
            Self::IsLive { turn, slot } => write!(f, "IsLive {{ turn: {}, slot: {:?} }}", turn, slot),
            Self::SameFragment { a, b } => write!(f, "SameFragment {{ a: {:?}, b: {:?} }}", a, b),
            Self::DistinctFragments { a, b } => {
                write!(f, "DistinctFragments {{ a: {:?}, b: {:?} }}", a, b)
            }
            Self::InternedSnapshots(n) => write!(f, "InternedSnapshots({})", n),
            Self::NextDynamicIdAtLeast(n) => write!(f, "NextDynamicIdAtLeast({})", n),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl Assertion {
    /// Check the assertion against a history and its session services
    pub fn check(&self, history: &ContextHistory, services: &ContextServices) -> Result<()> {
        match self {
            Self::HistoryLen(n) => {
                ensure!(history.len() == *n, "expected {} contexts, found {}", n, history.len());
            }
            Self::ListLen { turn, list, len } => {
                let ctx = history
                    .contexts()
                    .get(*turn)
                    .ok_or_else(|| anyhow!("no context at turn {}", turn))?;
                let actual = match list {
                    ListKind::Editable => ctx.editable.len(),
                    ListKind::Readonly => ctx.readonly.len(),
                    ListKind::Virtual => ctx.virtuals.len(),
                };
                ensure!(actual == *len, "{:?} list of turn {} has {} entries, expected {}", list, turn, actual, len);
            }
            Self::Action { turn, action } => {
                let ctx = history
                    .contexts()
                    .get(*turn)
                    .ok_or_else(|| anyhow!("no context at turn {}", turn))?;
                ensure!(&ctx.action == action, "action of turn {} is {:?}", turn, ctx.action);
            }
            Self::Text { turn, slot, text } => {
                let fragment = fragment_at(history, *turn, *slot)?;
                let actual = fragment.text()?;
                ensure!(&actual == text, "text at {:?} of turn {} is {:?}", slot, turn, actual);
            }
            Self::IsFrozen { turn, slot } => {
                ensure!(fragment_at(history, *turn, *slot)?.is_frozen(), "{:?} of turn {} is live", slot, turn);
            }
            Self::IsLive { turn, slot } => {
                ensure!(!fragment_at(history, *turn, *slot)?.is_frozen(), "{:?} of turn {} is frozen", slot, turn);
            }
            Self::SameFragment { a, b } => {
                let left = fragment_at(history, a.0, a.1)?;
                let right = fragment_at(history, b.0, b.1)?;
                ensure!(Arc::ptr_eq(&left, &right), "{:?} and {:?} are different fragments", a, b);
            }
            Self::DistinctFragments { a, b } => {
                let left = fragment_at(history, a.0, a.1)?;
                let right = fragment_at(history, b.0, b.1)?;
                ensure!(!Arc::ptr_eq(&left, &right), "{:?} and {:?} are the same fragment", a, b);
            }
            Self::InternedSnapshots(n) => {
                let actual = services.interner().len();
                ensure!(actual == *n, "expected {} interned snapshots, found {}", n, actual);
            }
            Self::NextDynamicIdAtLeast(n) => {
                let actual = services.ids().current_watermark();
                ensure!(actual >= *n, "next dynamic id is {}, expected at least {}", actual, n);
            }
            Self::Custom(check) => check(history, services)?,
        }
        Ok(())
    }
}

/// Look up the fragment at a slot of a committed context
pub fn fragment_at(history: &ContextHistory, turn: usize, slot: Slot) -> Result<FragmentRef> {
    let ctx = history
        .contexts()
        .get(turn)
        .ok_or_else(|| anyhow!("no context at turn {}", turn))?;
    let found = match slot {
        Slot::Editable(i) => ctx.editable.get(i).cloned(),
        Slot::Readonly(i) => ctx.readonly.get(i).cloned(),
        Slot::Virtual(i) => ctx.virtuals.get(i).cloned(),
        Slot::TaskLog(i) => ctx.task_history.get(i).and_then(|e| e.log_fragment().cloned()),
        Slot::ParsedOutput => ctx.parsed_output.clone(),
    };
    match found {
        Some(fragment) => Ok(fragment),
        None => bail!("no fragment at {:?} of turn {}", slot, turn),
    }
}
