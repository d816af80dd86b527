use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::types::{ArtifactKind, ArtifactPaths, ArtifactProbe, ProbeResult};

/// Probes artifacts on the local filesystem under `root`.
#[derive(Clone, Debug)]
pub struct FsArtifactProbe {
    pub root: PathBuf,
    pub paths: ArtifactPaths,
}

impl FsArtifactProbe {
    pub fn new(root: PathBuf, paths: ArtifactPaths) -> Self {
        Self { root, paths }
    }

    /// First candidate that is a non-empty file or a directory holding a file.
    fn first_document(&self, kind: ArtifactKind, candidates: &[String]) -> ProbeResult {
        for rel in candidates {
            let path = self.root.join(rel);
            if path.is_file() {
                if std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false) {
                    return ProbeResult::found(kind, rel.clone());
                }
            } else if path.is_dir() && self.any_file(&path, |_| true) {
                return ProbeResult::found(kind, rel.clone());
            }
        }
        ProbeResult::missing(kind, format!("none of: {}", candidates.join(", ")))
    }

    fn ignored(&self, name: &str) -> bool {
        self.paths.ignore_dirs.iter().any(|d| d == name)
    }

    fn walk(&self, dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> + '_ {
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && self.ignored(&e.file_name().to_string_lossy())))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
    }

    fn any_file(&self, dir: &Path, pred: impl Fn(&Path) -> bool) -> bool {
        self.walk(dir).any(|e| pred(e.path()))
    }

    fn find_test_file(&self) -> Option<PathBuf> {
        self.walk(&self.root).find_map(|e| {
            let rel = e.path().strip_prefix(&self.root).unwrap_or(e.path());
            is_test_path(rel, &self.paths.test_dirs).then(|| rel.to_path_buf())
        })
    }

    fn version_of(&self, rel: &str) -> Result<Option<String>> {
        let path = self.root.join(rel);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let name = Path::new(rel).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let version = match name.as_str() {
            "package.json" => {
                let v: serde_json::Value = serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
                v.get("version").and_then(|v| v.as_str()).map(str::to_string)
            }
            n if n.ends_with(".toml") => {
                let v: toml::Value = toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
                toml_version(&v)
            }
            _ => text.lines().next().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        };
        Ok(version)
    }

    fn version_consistency(&self) -> Result<ProbeResult> {
        let kind = ArtifactKind::VersionConsistency;
        let mut found = Vec::new();
        for rel in &self.paths.version_files {
            if let Some(v) = self.version_of(rel)? {
                found.push((rel.clone(), v));
            }
        }
        let listing = found.iter().map(|(f, v)| format!("{f}={v}")).collect::<Vec<_>>().join(", ");
        Ok(match found.first() {
            None => ProbeResult::missing(kind, "no versioned manifest found"),
            Some((_, first)) if found.iter().all(|(_, v)| v == first) => ProbeResult::found(kind, listing),
            Some(_) => ProbeResult::missing(kind, format!("versions disagree: {listing}")),
        })
    }
}

impl ArtifactProbe for FsArtifactProbe {
    fn probe(&self, kind: ArtifactKind) -> Result<ProbeResult> {
        let res = match kind {
            ArtifactKind::RequirementsDoc => self.first_document(kind, &self.paths.requirements),
            ArtifactKind::PlanningDoc => self.first_document(kind, &self.paths.planning),
            ArtifactKind::ReviewReport => self.first_document(kind, &self.paths.review),
            ArtifactKind::AcceptanceReport => self.first_document(kind, &self.paths.acceptance),
            ArtifactKind::TestFiles => match self.find_test_file() {
                Some(p) => ProbeResult::found(kind, p.display().to_string()),
                None => ProbeResult::missing(kind, "no test files in the working tree"),
            },
            ArtifactKind::VersionConsistency => self.version_consistency()?,
        };
        debug!(kind = %kind, present = res.present, detail = %res.detail, "artifact probe");
        Ok(res)
    }
}

/// `[package].version`, `[workspace.package].version`, `[project].version`
/// or `[tool.poetry].version`, whichever is set first.
fn toml_version(v: &toml::Value) -> Option<String> {
    const KEYS: [&[&str]; 4] = [
        &["package", "version"],
        &["workspace", "package", "version"],
        &["project", "version"],
        &["tool", "poetry", "version"],
    ];
    KEYS.iter().find_map(|path| {
        path.iter()
            .try_fold(v, |cur, key| cur.get(key))
            .and_then(|x| x.as_str())
            .map(str::to_string)
    })
}

/// Test-like by location (a test directory anywhere on the path) or by name.
pub fn is_test_path(rel: &Path, test_dirs: &[String]) -> bool {
    let mut parents = rel.parent().into_iter().flat_map(|p| p.components());
    if parents.any(|c| test_dirs.iter().any(|d| c.as_os_str() == d.as_str())) {
        return true;
    }
    let name = match rel.file_name() {
        Some(n) => n.to_string_lossy().to_lowercase(),
        None => return false,
    };
    let stem = name.split('.').next().unwrap_or("");
    name.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || name.contains(".test.")
        || name.contains(".spec.")
}
