//! In-memory stand-ins for the code-intelligence and version-control
//! collaborators.

use fragment_core::{
    Analysis, CallDirection, CallSite, CodeIntelligence, CodeUnit, CodeUnitKind, FragmentError, ProjectFile,
    VersionControl, UsageHit,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Analyzer answering from fixed tables. Starts ready; `set_ready(false)`
/// makes every query report `NotReady`.
pub struct FakeAnalyzer {
    root: PathBuf,
    ready: AtomicBool,
    classes: BTreeMap<String, (CodeUnit, String)>,
    usages: HashMap<String, Vec<UsageHit>>,
    calls: HashMap<String, Vec<CallSite>>,
}

impl FakeAnalyzer {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ready: AtomicBool::new(true),
            classes: BTreeMap::new(),
            usages: HashMap::new(),
            calls: HashMap::new(),
        }
    }

    pub fn unit(&self, rel_path: &str, namespace: &str, short_name: &str, kind: CodeUnitKind) -> CodeUnit {
        CodeUnit::new(ProjectFile::new(&self.root, rel_path), kind, namespace, short_name)
    }

    /// Declares a class with its skeleton.
    pub fn with_class(mut self, rel_path: &str, namespace: &str, name: &str, skeleton: &str) -> Self {
        let unit = self.unit(rel_path, namespace, name, CodeUnitKind::Class);
        self.classes.insert(unit.fq_name(), (unit, skeleton.to_string()));
        self
    }

    pub fn with_usage(mut self, symbol: &str, enclosing: CodeUnit, snippet: &str) -> Self {
        self.usages.entry(symbol.to_string()).or_default().push(UsageHit {
            enclosing,
            snippet: snippet.to_string(),
        });
        self
    }

    pub fn with_call(mut self, from: &str, target: CodeUnit, line: &str) -> Self {
        self.calls.entry(from.to_string()).or_default().push(CallSite {
            from: from.to_string(),
            target,
            source_line: line.to_string(),
        });
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn gate<T>(&self, value: impl FnOnce() -> T) -> Analysis<T> {
        if self.ready.load(Ordering::SeqCst) {
            Analysis::Ready(value())
        } else {
            Analysis::NotReady
        }
    }
}

impl CodeIntelligence for FakeAnalyzer {
    fn declarations_in_file(&self, file: &ProjectFile) -> Analysis<BTreeSet<CodeUnit>> {
        self.gate(|| {
            self.classes
                .values()
                .filter(|(unit, _)| &unit.source == file)
                .map(|(unit, _)| unit.clone())
                .collect()
        })
    }

    fn definition(&self, fq_name: &str) -> Analysis<Option<CodeUnit>> {
        self.gate(|| self.classes.get(fq_name).map(|(unit, _)| unit.clone()))
    }

    fn class_skeletons(&self, fq_names: &[String]) -> Analysis<BTreeMap<CodeUnit, String>> {
        self.gate(|| {
            fq_names
                .iter()
                .filter_map(|name| self.classes.get(name))
                .map(|(unit, skeleton)| (unit.clone(), skeleton.clone()))
                .collect()
        })
    }

    fn file_skeletons(&self, file: &ProjectFile) -> Analysis<BTreeMap<CodeUnit, String>> {
        self.gate(|| {
            self.classes
                .values()
                .filter(|(unit, _)| &unit.source == file)
                .map(|(unit, skeleton)| (unit.clone(), skeleton.clone()))
                .collect()
        })
    }

    fn usages(&self, identifier: &str) -> Analysis<Vec<UsageHit>> {
        self.gate(|| self.usages.get(identifier).cloned().unwrap_or_default())
    }

    fn call_graph(&self, method: &str, _direction: CallDirection, _depth: u32) -> Analysis<Vec<CallSite>> {
        self.gate(|| self.calls.get(method).cloned().unwrap_or_default())
    }
}

/// Version control answering from a table of (path, revision) contents.
#[derive(Default)]
pub struct FakeVcs {
    files: HashMap<(String, String), String>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, rel_path: &str, revision: &str, content: &str) -> Self {
        self.files
            .insert((rel_path.to_string(), revision.to_string()), content.to_string());
        self
    }
}

impl VersionControl for FakeVcs {
    fn file_at_revision(&self, file: &ProjectFile, revision: &str) -> fragment_core::Result<String> {
        self.files
            .get(&(file.rel_path().to_string(), revision.to_string()))
            .cloned()
            .ok_or_else(|| FragmentError::InvalidRecord(format!("{} not found at {}", file, revision)))
    }
}
