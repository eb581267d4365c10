use super::assertions::Assertion;

/// Which fragment list of a context a step or assertion refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Editable,
    Readonly,
    Virtual,
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Working tree
    WriteFile {
        path: String,
        content: Vec<u8>,
    },
    RemoveFile {
        path: String,
    },

    // Building the live context
    AddFile {
        name: String,
        path: String,
        list: ListKind,
    },
    AddShared {
        name: String,
        list: ListKind,
    },
    AddNote {
        name: String,
        text: String,
        description: String,
    },
    AddUsage {
        name: String,
        symbol: String,
    },
    AddSkeleton {
        name: String,
        class: String,
    },
    AddTaskLog {
        name: String,
        session: String,
        prompt: String,
    },
    AddSummary {
        summary: String,
    },
    DropFromContext {
        name: String,
    },

    // Session
    Commit {
        action: String,
    },
    SaveAndReload,
    AnalyzerReady(bool),
    ResetSession,

    // Assertions
    Assert {
        assertion: Assertion,
    },
}
