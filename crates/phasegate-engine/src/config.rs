use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use phasegate_artifacts::ArtifactPaths;
use phasegate_core::{FailMode, Phase};
use phasegate_rules::DEFAULT_CONTINUATION_WINDOW;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub branches: BranchesConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub artifacts: ArtifactPaths,
    #[serde(default)]
    pub gates: GatesConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Relative to the repo root unless absolute; `~` is expanded.
    pub state_dir: String,
    pub fail_mode: FailMode,
    pub coding_phases: Vec<Phase>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            state_dir: ".phasegate".to_string(),
            fail_mode: FailMode::Open,
            coding_phases: vec![Phase::Implementation, Phase::Testing],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BranchesConfig {
    pub protected: Vec<String>,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        Self {
            protected: vec!["main".to_string(), "master".to_string()],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Replaces the built-in rule table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,
    pub continuation_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            rules_file: None,
            continuation_window: DEFAULT_CONTINUATION_WINDOW,
        }
    }
}

/// Phases whose artifact checks block instead of warn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatesConfig {
    pub hard_prerequisites: Vec<Phase>,
    pub hard_outputs: Vec<Phase>,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            hard_prerequisites: vec![],
            hard_outputs: vec![Phase::Testing, Phase::Review],
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Load the repo's config, writing the defaults on first use.
    pub fn load_or_create(repo_root: &Path) -> Result<Self> {
        let path = Self::config_path(repo_root);
        if path.exists() {
            return Self::load_from(&path);
        }
        let cfg = Self::default();
        cfg.save_to(&path)?;
        Ok(cfg)
    }

    pub fn config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(".phasegate").join("phasegate.toml")
    }

    pub fn state_dir(&self, repo_root: &Path) -> PathBuf {
        resolve_path(repo_root, &self.workflow.state_dir)
    }

    pub fn rules_path(&self, repo_root: &Path) -> Option<PathBuf> {
        self.detector.rules_file.as_deref().map(|p| resolve_path(repo_root, p))
    }
}

fn resolve_path(repo_root: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        repo_root.join(expanded)
    }
}
