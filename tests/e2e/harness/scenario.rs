use super::assertions::{Assertion, Slot};
use super::fakes::FakeAnalyzer;
use super::runner::ScenarioRunner;
use super::steps::{ListKind, ScenarioStep};
use super::workspace::TestWorkspace;
use anyhow::Result;
use fragment_core::{ContextHistory, ContextServices};
use std::collections::HashMap;

type AnalyzerSetup = Box<dyn FnOnce(FakeAnalyzer) -> FakeAnalyzer>;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    fixture: Option<String>,
    initial_files: HashMap<String, Vec<u8>>,
    analyzer: Option<AnalyzerSetup>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fixture: None,
            initial_files: HashMap::new(),
            analyzer: None,
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Add a single file to initial workspace
    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.initial_files.insert(path.to_string(), content.to_vec());
        self
    }

    /// Load initial workspace from fixtures
    pub fn from_fixture(mut self, fixture_name: &str) -> Self {
        self.fixture = Some(fixture_name.to_string());
        self
    }

    /// Configure the analyzer the session uses
    pub fn with_analyzer(mut self, setup: impl FnOnce(FakeAnalyzer) -> FakeAnalyzer + 'static) -> Self {
        self.analyzer = Some(Box::new(setup));
        self
    }

    // ===== Working tree =====

    pub fn edit_file(mut self, path: &str, content: &[u8]) -> Self {
        self.steps.push(ScenarioStep::WriteFile {
            path: path.to_string(),
            content: content.to_vec(),
        });
        self
    }

    pub fn delete_file(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::RemoveFile { path: path.to_string() });
        self
    }

    // ===== Live context =====

    pub fn add_editable(mut self, name: &str, path: &str) -> Self {
        self.steps.push(ScenarioStep::AddFile {
            name: name.to_string(),
            path: path.to_string(),
            list: ListKind::Editable,
        });
        self
    }

    pub fn add_readonly(mut self, name: &str, path: &str) -> Self {
        self.steps.push(ScenarioStep::AddFile {
            name: name.to_string(),
            path: path.to_string(),
            list: ListKind::Readonly,
        });
        self
    }

    /// Put an already added fragment into another list as well
    pub fn share(mut self, name: &str, list: ListKind) -> Self {
        self.steps.push(ScenarioStep::AddShared {
            name: name.to_string(),
            list,
        });
        self
    }

    pub fn add_note(mut self, name: &str, description: &str, text: &str) -> Self {
        self.steps.push(ScenarioStep::AddNote {
            name: name.to_string(),
            text: text.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn add_usage(mut self, name: &str, symbol: &str) -> Self {
        self.steps.push(ScenarioStep::AddUsage {
            name: name.to_string(),
            symbol: symbol.to_string(),
        });
        self
    }

    pub fn add_skeleton(mut self, name: &str, class: &str) -> Self {
        self.steps.push(ScenarioStep::AddSkeleton {
            name: name.to_string(),
            class: class.to_string(),
        });
        self
    }

    /// Record a conversation turn as a task entry and as the parsed output
    pub fn add_task_log(mut self, name: &str, session: &str, prompt: &str) -> Self {
        self.steps.push(ScenarioStep::AddTaskLog {
            name: name.to_string(),
            session: session.to_string(),
            prompt: prompt.to_string(),
        });
        self
    }

    pub fn add_summary(mut self, summary: &str) -> Self {
        self.steps.push(ScenarioStep::AddSummary {
            summary: summary.to_string(),
        });
        self
    }

    pub fn drop_fragment(mut self, name: &str) -> Self {
        self.steps.push(ScenarioStep::DropFromContext { name: name.to_string() });
        self
    }

    // ===== Session =====

    pub fn commit(mut self, action: &str) -> Self {
        self.steps.push(ScenarioStep::Commit {
            action: action.to_string(),
        });
        self
    }

    pub fn save_and_reload(mut self) -> Self {
        self.steps.push(ScenarioStep::SaveAndReload);
        self
    }

    pub fn analyzer_ready(mut self, ready: bool) -> Self {
        self.steps.push(ScenarioStep::AnalyzerReady(ready));
        self
    }

    pub fn reset_session(mut self) -> Self {
        self.steps.push(ScenarioStep::ResetSession);
        self
    }

    // ===== Assertions =====

    fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    pub fn assert_history_len(self, n: usize) -> Self {
        self.assert(Assertion::HistoryLen(n))
    }

    pub fn assert_list_len(self, turn: usize, list: ListKind, len: usize) -> Self {
        self.assert(Assertion::ListLen { turn, list, len })
    }

    pub fn assert_action(self, turn: usize, action: &str) -> Self {
        self.assert(Assertion::Action {
            turn,
            action: action.to_string(),
        })
    }

    pub fn assert_text(self, turn: usize, slot: Slot, text: &str) -> Self {
        self.assert(Assertion::Text {
            turn,
            slot,
            text: text.to_string(),
        })
    }

    pub fn assert_frozen(self, turn: usize, slot: Slot) -> Self {
        self.assert(Assertion::IsFrozen { turn, slot })
    }

    pub fn assert_live(self, turn: usize, slot: Slot) -> Self {
        self.assert(Assertion::IsLive { turn, slot })
    }

    pub fn assert_same(self, a: (usize, Slot), b: (usize, Slot)) -> Self {
        self.assert(Assertion::SameFragment { a, b })
    }

    pub fn assert_distinct(self, a: (usize, Slot), b: (usize, Slot)) -> Self {
        self.assert(Assertion::DistinctFragments { a, b })
    }

    pub fn assert_interned(self, n: usize) -> Self {
        self.assert(Assertion::InternedSnapshots(n))
    }

    pub fn assert_next_id_at_least(self, n: u64) -> Self {
        self.assert(Assertion::NextDynamicIdAtLeast(n))
    }

    pub fn assert_custom(
        self,
        check: impl Fn(&ContextHistory, &ContextServices) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.assert(Assertion::Custom(Box::new(check)))
    }

    // ===== Execution =====

    fn prepare(&mut self) -> Result<ScenarioRunner> {
        let workspace = match &self.fixture {
            Some(name) => TestWorkspace::from_fixture(name)?,
            None => TestWorkspace::empty()?,
        };
        for (path, content) in &self.initial_files {
            workspace.write_file(path, content)?;
        }
        let mut analyzer = FakeAnalyzer::new(workspace.path());
        if let Some(setup) = self.analyzer.take() {
            analyzer = setup(analyzer);
        }
        Ok(ScenarioRunner::new(workspace, analyzer))
    }

    /// Run the scenario
    pub fn run(mut self) -> ScenarioResult {
        let mut runner = match self.prepare() {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Assert the scenario failed, with an error mentioning `needle`
    pub fn expect_failure(self, needle: &str) {
        assert!(!self.success, "Scenario '{}' unexpectedly passed", self.name);
        let error = self.error.unwrap_or_default();
        assert!(
            error.contains(needle),
            "Scenario '{}' failed with {:?}, expected mention of {:?}",
            self.name,
            error,
            needle
        );
    }
}
