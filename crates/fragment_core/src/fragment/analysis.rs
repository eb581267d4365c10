//! Fragments computed on demand by the code-intelligence service.
//!
//! An analyzer that is still indexing is not an error: these fragments
//! render a placeholder and report no symbols until it is ready.

use super::{claim_dynamic_id, files_of, style_of_sources, Fragment, FragmentKind};
use crate::error::Result;
use crate::files::{syntax, ProjectFile};
use crate::ids::FragmentId;
use crate::services::{Analysis, ContextServices};
use crate::symbols::{CallDirection, CallSite, CodeUnit, UsageHit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const NOT_READY: &str = "Code intelligence is not ready.";

/// What a skeleton fragment summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryType {
    /// Targets are fully qualified class names.
    ClassSkeleton,
    /// Targets are project-relative file paths.
    FileSkeletons,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::ClassSkeleton => "CLASS_SKELETON",
            SummaryType::FileSkeletons => "FILE_SKELETONS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLASS_SKELETON" => Some(SummaryType::ClassSkeleton),
            "FILE_SKELETONS" => Some(SummaryType::FileSkeletons),
            _ => None,
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration skeletons for classes or files, grouped by namespace.
pub struct SkeletonFragment {
    id: FragmentId,
    targets: Vec<String>,
    summary_type: SummaryType,
    services: ContextServices,
}

impl SkeletonFragment {
    pub fn new(targets: Vec<String>, summary_type: SummaryType, services: &ContextServices) -> Self {
        Self {
            id: services.ids().next_dynamic_id(),
            targets,
            summary_type,
            services: services.clone(),
        }
    }

    pub fn with_id(
        id: &str,
        targets: Vec<String>,
        summary_type: SummaryType,
        services: &ContextServices,
    ) -> Result<Self> {
        Ok(Self {
            id: claim_dynamic_id(id, services)?,
            targets,
            summary_type,
            services: services.clone(),
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn summary_type(&self) -> SummaryType {
        self.summary_type
    }

    fn skeletons(&self) -> Analysis<BTreeMap<CodeUnit, String>> {
        let analyzer = self.services.analyzer();
        match self.summary_type {
            SummaryType::ClassSkeleton => analyzer.class_skeletons(&self.targets),
            SummaryType::FileSkeletons => {
                let mut all = BTreeMap::new();
                for target in &self.targets {
                    let file = self.services.project().to_file(target);
                    match analyzer.file_skeletons(&file) {
                        Analysis::Ready(skeletons) => all.extend(skeletons),
                        Analysis::NotReady => return Analysis::NotReady,
                    }
                }
                Analysis::Ready(all)
            }
        }
    }

    fn render(&self, skeletons: &BTreeMap<CodeUnit, String>) -> String {
        let mut by_namespace: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (unit, skeleton) in skeletons {
            by_namespace
                .entry(unit.namespace.as_str())
                .or_default()
                .push(skeleton.as_str());
        }
        by_namespace
            .into_iter()
            .map(|(namespace, skeletons)| {
                let header = if namespace.is_empty() {
                    "(default package)"
                } else {
                    namespace
                };
                format!("package {};\n\n{}", header, skeletons.join("\n\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Fragment for SkeletonFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::Skeleton
    }

    fn description(&self) -> String {
        format!("Summary of {}", self.targets.join(", "))
    }

    fn text(&self) -> Result<String> {
        Ok(match self.skeletons() {
            Analysis::NotReady => format!("{} Summaries will be fetched later.", NOT_READY),
            Analysis::Ready(skeletons) if skeletons.is_empty() => {
                format!("No summaries found for: {}", self.targets.join(", "))
            }
            Analysis::Ready(skeletons) => self.render(&skeletons),
        })
    }

    fn syntax_style(&self) -> String {
        style_of_sources(&self.sources())
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        files_of(&self.sources())
    }

    fn sources(&self) -> BTreeSet<CodeUnit> {
        self.skeletons()
            .ready()
            .map(|skeletons| skeletons.into_keys().collect())
            .unwrap_or_default()
    }

    fn is_eligible_for_auto_context(&self) -> bool {
        self.summary_type != SummaryType::ClassSkeleton
    }

    fn format(&self) -> Result<String> {
        Ok(format!(
            "<summary targets=\"{}\" type=\"{}\" fragmentid=\"{}\">\n{}\n</summary>\n",
            self.targets.join(", "),
            self.summary_type,
            self.id,
            self.text()?
        ))
    }

    fn format_summary(&self) -> Result<String> {
        self.format()
    }
}

impl fmt::Debug for SkeletonFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkeletonFragment")
            .field("id", &self.id)
            .field("targets", &self.targets)
            .field("summary_type", &self.summary_type)
            .finish()
    }
}

/// Every use of a symbol.
pub struct UsageFragment {
    id: FragmentId,
    target_identifier: String,
    services: ContextServices,
}

impl UsageFragment {
    pub fn new(target_identifier: &str, services: &ContextServices) -> Self {
        Self {
            id: services.ids().next_dynamic_id(),
            target_identifier: target_identifier.to_string(),
            services: services.clone(),
        }
    }

    pub fn with_id(id: &str, target_identifier: &str, services: &ContextServices) -> Result<Self> {
        Ok(Self {
            id: claim_dynamic_id(id, services)?,
            target_identifier: target_identifier.to_string(),
            services: services.clone(),
        })
    }

    pub fn target_identifier(&self) -> &str {
        &self.target_identifier
    }

    fn hits(&self) -> Analysis<Vec<UsageHit>> {
        self.services.analyzer().usages(&self.target_identifier)
    }
}

impl Fragment for UsageFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::Usage
    }

    fn description(&self) -> String {
        format!("Uses of {}", self.target_identifier)
    }

    fn text(&self) -> Result<String> {
        Ok(match self.hits() {
            Analysis::NotReady => format!(
                "{} Cannot find usages for {}.",
                NOT_READY, self.target_identifier
            ),
            Analysis::Ready(hits) if hits.is_empty() => {
                format!("No relevant usages found for symbol: {}", self.target_identifier)
            }
            Analysis::Ready(hits) => hits
                .iter()
                .map(|hit| format!("Usage in {} ({}):\n{}", hit.enclosing, hit.enclosing.source, hit.snippet))
                .collect::<Vec<_>>()
                .join("\n\n"),
        })
    }

    fn syntax_style(&self) -> String {
        style_of_sources(&self.sources())
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        files_of(&self.sources())
    }

    fn sources(&self) -> BTreeSet<CodeUnit> {
        self.hits()
            .ready()
            .map(|hits| hits.into_iter().map(|hit| hit.enclosing).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for UsageFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageFragment")
            .field("id", &self.id)
            .field("target_identifier", &self.target_identifier)
            .finish()
    }
}

/// Callers or callees of a method, to a bounded depth.
pub struct CallGraphFragment {
    id: FragmentId,
    method_name: String,
    depth: u32,
    direction: CallDirection,
    services: ContextServices,
}

impl CallGraphFragment {
    /// `depth` is clamped to at least 1.
    pub fn new(method_name: &str, depth: u32, direction: CallDirection, services: &ContextServices) -> Self {
        Self {
            id: services.ids().next_dynamic_id(),
            method_name: method_name.to_string(),
            depth: depth.max(1),
            direction,
            services: services.clone(),
        }
    }

    pub fn with_id(
        id: &str,
        method_name: &str,
        depth: u32,
        direction: CallDirection,
        services: &ContextServices,
    ) -> Result<Self> {
        Ok(Self {
            id: claim_dynamic_id(id, services)?,
            method_name: method_name.to_string(),
            depth: depth.max(1),
            direction,
            services: services.clone(),
        })
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    fn edges(&self) -> Analysis<Vec<CallSite>> {
        self.services
            .analyzer()
            .call_graph(&self.method_name, self.direction, self.depth)
    }

    fn render(&self, edges: &[CallSite]) -> String {
        let arrow = match self.direction {
            CallDirection::Callers => "<-",
            CallDirection::Callees => "->",
        };
        let mut out = format!("Root: {}", self.method_name);
        for edge in edges {
            out.push_str(&format!(
                "\n{} {} {} [{}]\n  {}",
                edge.from,
                arrow,
                edge.target,
                edge.target.source,
                edge.source_line.trim()
            ));
        }
        out
    }
}

impl Fragment for CallGraphFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn kind(&self) -> FragmentKind {
        FragmentKind::CallGraph
    }

    fn description(&self) -> String {
        format!(
            "{} of {} (depth {})",
            self.direction.label(),
            self.method_name,
            self.depth
        )
    }

    fn text(&self) -> Result<String> {
        Ok(match self.edges() {
            Analysis::NotReady => format!(
                "{} Cannot generate call graph for {}.",
                NOT_READY, self.method_name
            ),
            Analysis::Ready(edges) if edges.is_empty() => {
                format!("No call graph available for {}", self.method_name)
            }
            Analysis::Ready(edges) => self.render(&edges),
        })
    }

    fn syntax_style(&self) -> String {
        syntax::NONE.to_string()
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn files(&self) -> BTreeSet<ProjectFile> {
        files_of(&self.sources())
    }

    fn sources(&self) -> BTreeSet<CodeUnit> {
        self.edges()
            .ready()
            .map(|edges| edges.into_iter().map(|edge| edge.target).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for CallGraphFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallGraphFragment")
            .field("id", &self.id)
            .field("method_name", &self.method_name)
            .field("depth", &self.depth)
            .field("direction", &self.direction)
            .finish()
    }
}
