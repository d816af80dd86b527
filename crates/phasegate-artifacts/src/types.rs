use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Workspace artifacts that phase prerequisites and outputs are checked against.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    RequirementsDoc,
    PlanningDoc,
    TestFiles,
    ReviewReport,
    VersionConsistency,
    AcceptanceReport,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::RequirementsDoc => "requirements-doc",
            ArtifactKind::PlanningDoc => "planning-doc",
            ArtifactKind::TestFiles => "test-files",
            ArtifactKind::ReviewReport => "review-report",
            ArtifactKind::VersionConsistency => "version-consistency",
            ArtifactKind::AcceptanceReport => "acceptance-report",
        }
    }

    /// What to produce when the artifact is missing.
    pub fn hint(&self) -> &'static str {
        match self {
            ArtifactKind::RequirementsDoc => "write the requirements document (e.g. docs/requirements.md)",
            ArtifactKind::PlanningDoc => "write the planning or design document (e.g. docs/design.md)",
            ArtifactKind::TestFiles => "add at least one test file (e.g. under tests/)",
            ArtifactKind::ReviewReport => "record the review outcome (e.g. docs/review.md)",
            ArtifactKind::VersionConsistency => "make the version in every manifest agree",
            ArtifactKind::AcceptanceReport => "write the acceptance report (e.g. docs/acceptance.md)",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub kind: ArtifactKind,
    pub present: bool,
    pub detail: String,
}

impl ProbeResult {
    pub fn found(kind: ArtifactKind, detail: impl Into<String>) -> Self {
        Self { kind, present: true, detail: detail.into() }
    }

    pub fn missing(kind: ArtifactKind, detail: impl Into<String>) -> Self {
        Self { kind, present: false, detail: detail.into() }
    }
}

pub trait ArtifactProbe: Send + Sync {
    fn probe(&self, kind: ArtifactKind) -> Result<ProbeResult>;
}

/// Where each artifact is looked for, relative to the repo root.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactPaths {
    pub requirements: Vec<String>,
    pub planning: Vec<String>,
    pub review: Vec<String>,
    pub acceptance: Vec<String>,
    pub test_dirs: Vec<String>,
    pub version_files: Vec<String>,
    pub ignore_dirs: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            requirements: strings(&["docs/requirements.md", "docs/requirements", "REQUIREMENTS.md", "docs/prd.md"]),
            planning: strings(&[
                "docs/design.md",
                "docs/design",
                "docs/plan.md",
                "docs/architecture.md",
                "DESIGN.md",
                "PLAN.md",
            ]),
            review: strings(&["docs/review.md", "docs/reviews", "REVIEW.md", "reviews"]),
            acceptance: strings(&["docs/acceptance.md", "docs/acceptance", "ACCEPTANCE.md"]),
            test_dirs: strings(&["tests", "test", "__tests__", "spec"]),
            version_files: strings(&["Cargo.toml", "package.json", "pyproject.toml", "VERSION"]),
            ignore_dirs: strings(&[".git", ".phasegate", "target", "node_modules", "vendor", "dist", "build"]),
        }
    }
}
