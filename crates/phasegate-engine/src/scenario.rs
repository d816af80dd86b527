use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use phasegate_artifacts::FsArtifactProbe;
use phasegate_core::{CheckKind, FailMode, GateVerdict, Phase, WorkflowMode};
use phasegate_rules::BypassDetector;
use phasegate_storage_fs::FsStore;
use phasegate_vcs::VcsAdapter;
use serde::Deserialize;

use crate::{Config, DecisionRequest, Engine};

/// One gate decision fixture: state to set up, a request, the expected verdict.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub setup: ScenarioSetup,
    pub request: ScenarioRequest,
    pub expected: ScenarioExpected,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioSetup {
    pub branch: Option<String>,
    pub phase: Option<Phase>,
    pub task: Option<ScenarioTask>,
    pub mode: Option<WorkflowMode>,
    pub fail_mode: FailMode,
    /// Working-tree files, relative to the repo root.
    pub files: BTreeMap<String, String>,
    /// Raw state files written last, e.g. to corrupt `tasks.json`.
    pub state_files: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioTask {
    pub description: String,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioRequest {
    #[serde(default)]
    pub text: String,
    /// Defaults to the setup branch.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub advance_to: Option<Phase>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioExpected {
    pub allowed: bool,
    #[serde(default)]
    pub present: Vec<CheckKind>,
    #[serde(default)]
    pub absent: Vec<CheckKind>,
}

/// Branch fixed by the scenario; branch creation is not simulated.
struct ScenarioBranch(Option<String>);

impl VcsAdapter for ScenarioBranch {
    fn name(&self) -> &'static str {
        "scenario"
    }

    fn current_branch(&self, _repo_root: &Path) -> Result<String> {
        self.0.clone().ok_or_else(|| anyhow!("scenario has no branch"))
    }

    fn branch_exists(&self, _repo_root: &Path, branch: &str) -> Result<bool> {
        Ok(self.0.as_deref() == Some(branch))
    }

    fn create_branch(&self, _repo_root: &Path, branch: &str) -> Result<()> {
        Err(anyhow!("scenarios cannot create branch {branch}"))
    }
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read scenario: {}", path.display()))?;
    let sc: Scenario = serde_yaml::from_str(&s).with_context(|| format!("parse scenario: {}", path.display()))?;
    Ok(sc)
}

/// Every `*.yaml` scenario in `dir`, sorted by file name.
pub fn load_all(dir: &Path) -> Result<Vec<(PathBuf, Scenario)>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|x| x == "yaml").unwrap_or(false))
        .collect();
    paths.sort();
    paths
        .into_iter()
        .map(|p| load_scenario(&p).map(|sc| (p, sc)))
        .collect()
}

/// Build the scenario's state under `workdir` and run one decision against it.
pub fn simulate(sc: &Scenario, workdir: &Path) -> Result<GateVerdict> {
    let mut cfg = Config::default();
    cfg.workflow.fail_mode = sc.setup.fail_mode;
    let state_dir = cfg.state_dir(workdir);
    let engine = Engine::with_parts(
        workdir.to_path_buf(),
        cfg.clone(),
        Box::new(FsStore::open(&state_dir)?),
        Box::new(ScenarioBranch(sc.setup.branch.clone())),
        Box::new(FsArtifactProbe::new(workdir.to_path_buf(), cfg.artifacts.clone())),
        BypassDetector::builtin()?,
    );

    for (rel, body) in &sc.setup.files {
        let path = workdir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    }
    if let Some(task) = &sc.setup.task {
        engine.start(&task.description, &task.branch, false)?;
    }
    if let Some(phase) = sc.setup.phase {
        engine.set_phase(phase)?;
    }
    match sc.setup.mode {
        Some(WorkflowMode::Execution) => engine.activate()?,
        Some(WorkflowMode::Discussion) => engine.deactivate()?,
        None => {}
    }
    for (name, body) in &sc.setup.state_files {
        std::fs::write(state_dir.join(name), body)?;
    }

    let branch = sc
        .request
        .branch
        .clone()
        .unwrap_or_else(|| engine.current_branch());
    Ok(engine.decide(&DecisionRequest {
        text: sc.request.text.clone(),
        current_branch: branch,
        requested_phase: sc.request.advance_to,
    }))
}

pub fn check_expected(sc: &Scenario, verdict: &GateVerdict) -> Result<()> {
    let exp = &sc.expected;
    if verdict.allowed != exp.allowed {
        return Err(anyhow!(
            "{}: expected allowed={}, got {:?}",
            sc.scenario_id,
            exp.allowed,
            verdict.violations
        ));
    }
    if let Some(k) = exp.present.iter().find(|k| !verdict.has(**k)) {
        return Err(anyhow!("{}: expected a {k} violation, got {:?}", sc.scenario_id, verdict.violations));
    }
    if let Some(k) = exp.absent.iter().find(|k| verdict.has(**k)) {
        return Err(anyhow!("{}: unexpected {k} violation", sc.scenario_id));
    }
    Ok(())
}
