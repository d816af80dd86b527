use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use phasegate_artifacts::{ArtifactProbe, FsArtifactProbe};
use phasegate_core::{now_unix, Event, GateError, ModeRecord, Snapshot, WorkflowMode};
use phasegate_rules::BypassDetector;
use phasegate_storage::StateStore;
use phasegate_storage_fs::FsStore;
use phasegate_vcs::{VcsAdapter, UNKNOWN_BRANCH};
use phasegate_vcs_git::GitAdapter;
use tracing::{debug, warn};

use crate::config::Config;
use crate::requirements::Requirements;

/// Wires configuration, state, VCS, artifact probes and the rule table for one repo.
pub struct Engine {
    pub repo_root: PathBuf,
    pub cfg: Config,
    pub store: Box<dyn StateStore>,
    pub vcs: Box<dyn VcsAdapter>,
    pub probe: Box<dyn ArtifactProbe>,
    pub detector: BypassDetector,
}

impl Engine {
    pub fn open(repo_root: PathBuf) -> Result<Self> {
        let cfg = Config::load_or_create(&repo_root)?;
        let state_dir = cfg.state_dir(&repo_root);
        let store = FsStore::open(&state_dir).with_context(|| format!("open state dir {}", state_dir.display()))?;
        let detector = load_detector(&cfg, &repo_root)?;
        let probe = FsArtifactProbe::new(repo_root.clone(), cfg.artifacts.clone());
        Ok(Self::with_parts(
            repo_root,
            cfg,
            Box::new(store),
            Box::new(GitAdapter::new()),
            Box::new(probe),
            detector,
        ))
    }

    pub fn with_parts(
        repo_root: PathBuf,
        cfg: Config,
        store: Box<dyn StateStore>,
        vcs: Box<dyn VcsAdapter>,
        probe: Box<dyn ArtifactProbe>,
        detector: BypassDetector,
    ) -> Self {
        Self {
            repo_root,
            cfg,
            store,
            vcs,
            probe,
            detector,
        }
    }

    /// Create the config and state directory and record the initial phase.
    pub fn init_repo(repo_root: &Path) -> Result<Self> {
        let engine = Self::open(repo_root.to_path_buf())?;
        let phase = engine.current_phase();
        debug!(%phase, "initialized");
        Ok(engine)
    }

    pub fn requirements(&self) -> Requirements<'_> {
        Requirements {
            probe: self.probe.as_ref(),
            gates: &self.cfg.gates,
        }
    }

    /// Checked-out branch, or `<unknown>` when it cannot be determined.
    pub fn current_branch(&self) -> String {
        match self.vcs.current_branch(&self.repo_root) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "cannot determine current branch");
                UNKNOWN_BRANCH.to_string()
            }
        }
    }

    pub fn mode(&self) -> Result<WorkflowMode, GateError> {
        Ok(self.store.read_mode()?.map(|m| m.mode).unwrap_or_default())
    }

    pub(crate) fn set_mode(&self, mode: WorkflowMode) -> Result<(), GateError> {
        self.store.write_mode(&ModeRecord { mode, since: now_unix() })
    }

    /// Event lines are append-and-forget.
    pub(crate) fn record(&self, event: Event) {
        if let Err(e) = self.store.append_event(&event) {
            warn!(error = %e, kind = ?event.kind, "failed to append event");
        }
    }

    /// Read-only view of persisted state. Unreadable parts fall back to
    /// their defaults and are returned alongside.
    pub fn snapshot(&self) -> (Snapshot, Vec<GateError>) {
        let mut snap = Snapshot {
            now_unix: now_unix(),
            ..Snapshot::default()
        };
        let mut errors = Vec::new();

        match self.store.read_phase() {
            Ok(Some(rec)) => snap.phase = rec.current,
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
        match self.store.read_tasks() {
            Ok(map) => snap.active_task = map.active_task,
            Err(e) => errors.push(e),
        }
        match self.store.read_mode() {
            Ok(rec) => snap.mode = rec.map(|r| r.mode).unwrap_or_default(),
            Err(e) => errors.push(e),
        }

        for e in &errors {
            warn!(error = %e, "state degraded");
        }
        snap.degraded = errors.iter().map(|e| e.to_string()).collect();
        (snap, errors)
    }
}

/// The configured rule table, or the built-in one.
pub fn load_detector(cfg: &Config, repo_root: &Path) -> Result<BypassDetector> {
    match cfg.rules_path(repo_root) {
        Some(path) => BypassDetector::from_path(&path),
        None => BypassDetector::builtin(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use phasegate_artifacts::ArtifactPaths;
    use phasegate_storage::InMemoryStore;
    use std::sync::Mutex;

    /// Branch reported by a test engine; `None` fails like a detached HEAD.
    pub struct FixedBranch {
        pub branch: Mutex<Option<String>>,
    }

    impl VcsAdapter for FixedBranch {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn current_branch(&self, _repo_root: &Path) -> Result<String> {
            self.branch
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow!("no branch"))
        }

        fn branch_exists(&self, _repo_root: &Path, branch: &str) -> Result<bool> {
            Ok(self.branch.lock().unwrap().as_deref() == Some(branch))
        }

        fn create_branch(&self, _repo_root: &Path, branch: &str) -> Result<()> {
            *self.branch.lock().unwrap() = Some(branch.to_string());
            Ok(())
        }
    }

    /// In-memory state, a fixed branch and a filesystem probe over `root`.
    pub fn engine(root: &Path, branch: Option<&str>) -> Engine {
        Engine::with_parts(
            root.to_path_buf(),
            Config::default(),
            Box::new(InMemoryStore::new()),
            Box::new(FixedBranch {
                branch: Mutex::new(branch.map(str::to_string)),
            }),
            Box::new(FsArtifactProbe::new(root.to_path_buf(), ArtifactPaths::default())),
            BypassDetector::builtin().unwrap(),
        )
    }

    /// Like [`engine`], with state in `root/.phasegate` so several engines share it.
    pub fn fs_engine(root: &Path, branch: Option<&str>) -> Engine {
        let mut e = engine(root, branch);
        e.store = Box::new(FsStore::open(&root.join(".phasegate")).unwrap());
        e
    }
}
