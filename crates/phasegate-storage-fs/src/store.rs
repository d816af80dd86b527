use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use phasegate_core::{
    lock_retry_delay_ms, Event, GateError, ModeRecord, Phase, PhaseRecord, TaskMap, TransitionRecord,
};
use phasegate_storage::StateStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub const LOCK_FILE: &str = ".lock";
pub const PHASE_FILE: &str = "phase.json";
pub const TRANSITIONS_FILE: &str = "transitions.jsonl";
pub const TASKS_FILE: &str = "tasks.json";
pub const MODE_FILE: &str = "mode.json";
pub const EVENTS_FILE: &str = "events.jsonl";

/// JSON files under one state directory.
///
/// Writers serialize on an exclusive `flock` of `.lock` held across the whole
/// read-modify-write. Whole-file writes go through a temp file + rename, so
/// readers never see a torn file and do not take the lock.
pub struct FsStore {
    dir: PathBuf,
}

struct StateLock {
    file: File,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FsStore {
    pub fn open(dir: &Path) -> Result<Self, GateError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn lock_exclusive(&self) -> Result<StateLock, GateError> {
        let path = self.path(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        let contended = fs2::lock_contended_error().kind();
        let mut attempt = 1;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(StateLock { file }),
                Err(e) if e.kind() == contended || e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
            attempt += 1;
            match lock_retry_delay_ms(attempt) {
                Some(ms) => {
                    debug!(attempt, ms, "state lock busy");
                    std::thread::sleep(Duration::from_millis(ms));
                }
                None => {
                    return Err(GateError::LockTimeout {
                        path,
                        attempts: attempt - 1,
                    })
                }
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, GateError> {
        let path = self.path(name);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| GateError::MalformedState {
                    path,
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), GateError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(std::io::Error::from)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(self.path(name)).map_err(|e| e.error)?;
        Ok(())
    }

    fn append_line<T: Serialize>(&self, name: &str, value: &T) -> Result<(), GateError> {
        let line = serde_json::to_string(value).map_err(std::io::Error::from)?;
        let mut f = OpenOptions::new().create(true).append(true).open(self.path(name))?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Unparsable lines are skipped: a torn append must not hide the rest of the log.
    fn read_lines<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, GateError> {
        let path = self.path(name);
        let s = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for (n, line) in s.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(v) => out.push(v),
                Err(e) => warn!(file = %path.display(), line = n + 1, error = %e, "skipping unreadable log line"),
            }
        }
        Ok(out)
    }
}

impl StateStore for FsStore {
    fn read_phase(&self) -> Result<Option<PhaseRecord>, GateError> {
        self.read_json(PHASE_FILE)
    }

    fn ensure_phase(&self, initial: &TransitionRecord) -> Result<PhaseRecord, GateError> {
        let _lock = self.lock_exclusive()?;
        if let Some(existing) = self.read_json::<PhaseRecord>(PHASE_FILE)? {
            return Ok(existing);
        }
        let rec = PhaseRecord {
            current: initial.to_phase,
            updated_at: initial.timestamp,
        };
        self.write_json(PHASE_FILE, &rec)?;
        self.append_line(TRANSITIONS_FILE, initial)?;
        Ok(rec)
    }

    fn update_phase(
        &self,
        op: &mut dyn FnMut(Option<Phase>) -> Result<TransitionRecord, GateError>,
    ) -> Result<TransitionRecord, GateError> {
        let _lock = self.lock_exclusive()?;
        let current = self.read_json::<PhaseRecord>(PHASE_FILE)?.map(|r| r.current);
        let record = op(current)?;
        self.write_json(
            PHASE_FILE,
            &PhaseRecord {
                current: record.to_phase,
                updated_at: record.timestamp,
            },
        )?;
        self.append_line(TRANSITIONS_FILE, &record)?;
        Ok(record)
    }

    fn transitions(&self) -> Result<Vec<TransitionRecord>, GateError> {
        self.read_lines(TRANSITIONS_FILE)
    }

    fn read_tasks(&self) -> Result<TaskMap, GateError> {
        Ok(self.read_json(TASKS_FILE)?.unwrap_or_default())
    }

    fn update_tasks(
        &self,
        op: &mut dyn FnMut(&mut TaskMap) -> Result<(), GateError>,
    ) -> Result<TaskMap, GateError> {
        let _lock = self.lock_exclusive()?;
        // A malformed map is surfaced, never overwritten.
        let mut map: TaskMap = self.read_json(TASKS_FILE)?.unwrap_or_default();
        op(&mut map)?;
        self.write_json(TASKS_FILE, &map)?;
        Ok(map)
    }

    fn read_mode(&self) -> Result<Option<ModeRecord>, GateError> {
        self.read_json(MODE_FILE)
    }

    fn write_mode(&self, record: &ModeRecord) -> Result<(), GateError> {
        let _lock = self.lock_exclusive()?;
        self.write_json(MODE_FILE, record)
    }

    fn append_event(&self, event: &Event) -> Result<(), GateError> {
        self.append_line(EVENTS_FILE, event)
    }

    fn events(&self) -> Result<Vec<Event>, GateError> {
        self.read_lines(EVENTS_FILE)
    }
}
