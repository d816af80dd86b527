use std::sync::{Mutex, MutexGuard};

use phasegate_core::{Event, GateError, ModeRecord, Phase, PhaseRecord, TaskMap, TransitionRecord};

use crate::traits::StateStore;

/// In-memory store for tests. Not durable, but one mutex gives the same
/// read-modify-write atomicity as the file store's lock.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    phase: Option<PhaseRecord>,
    transitions: Vec<TransitionRecord>,
    tasks: TaskMap,
    mode: Option<ModeRecord>,
    events: Vec<Event>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StateStore for InMemoryStore {
    fn read_phase(&self) -> Result<Option<PhaseRecord>, GateError> {
        Ok(self.lock().phase.clone())
    }

    fn ensure_phase(&self, initial: &TransitionRecord) -> Result<PhaseRecord, GateError> {
        let mut inner = self.lock();
        if let Some(p) = &inner.phase {
            return Ok(p.clone());
        }
        let rec = PhaseRecord {
            current: initial.to_phase,
            updated_at: initial.timestamp,
        };
        inner.phase = Some(rec.clone());
        inner.transitions.push(initial.clone());
        Ok(rec)
    }

    fn update_phase(
        &self,
        op: &mut dyn FnMut(Option<Phase>) -> Result<TransitionRecord, GateError>,
    ) -> Result<TransitionRecord, GateError> {
        let mut inner = self.lock();
        let record = op(inner.phase.as_ref().map(|p| p.current))?;
        inner.phase = Some(PhaseRecord {
            current: record.to_phase,
            updated_at: record.timestamp,
        });
        inner.transitions.push(record.clone());
        Ok(record)
    }

    fn transitions(&self) -> Result<Vec<TransitionRecord>, GateError> {
        Ok(self.lock().transitions.clone())
    }

    fn read_tasks(&self) -> Result<TaskMap, GateError> {
        Ok(self.lock().tasks.clone())
    }

    fn update_tasks(
        &self,
        op: &mut dyn FnMut(&mut TaskMap) -> Result<(), GateError>,
    ) -> Result<TaskMap, GateError> {
        let mut inner = self.lock();
        let mut next = inner.tasks.clone();
        op(&mut next)?;
        inner.tasks = next.clone();
        Ok(next)
    }

    fn read_mode(&self) -> Result<Option<ModeRecord>, GateError> {
        Ok(self.lock().mode.clone())
    }

    fn write_mode(&self, record: &ModeRecord) -> Result<(), GateError> {
        self.lock().mode = Some(record.clone());
        Ok(())
    }

    fn append_event(&self, event: &Event) -> Result<(), GateError> {
        self.lock().events.push(event.clone());
        Ok(())
    }

    fn events(&self) -> Result<Vec<Event>, GateError> {
        Ok(self.lock().events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_core::{EventKind, Phase, Task, WorkflowMode};

    #[test]
    fn test_new_creates_empty_store() {
        let store = InMemoryStore::new();
        assert!(store.read_phase().unwrap().is_none());
        assert!(store.transitions().unwrap().is_empty());
        assert_eq!(store.read_tasks().unwrap(), TaskMap::default());
        assert!(store.read_mode().unwrap().is_none());
        assert!(store.events().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_phase_initializes_once() {
        let store = InMemoryStore::new();
        let init = TransitionRecord {
            from_phase: None,
            to_phase: Phase::FIRST,
            timestamp: 1,
        };
        assert_eq!(store.ensure_phase(&init).unwrap().current, Phase::Discovery);
        store
            .update_phase(&mut |from| {
                Ok(TransitionRecord {
                    from_phase: from,
                    to_phase: Phase::Planning,
                    timestamp: 2,
                })
            })
            .unwrap();
        assert_eq!(store.ensure_phase(&init).unwrap().current, Phase::Planning);
        let t = store.transitions().unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].from_phase, Some(Phase::Discovery));
    }

    #[test]
    fn test_rejected_phase_update_writes_nothing() {
        let store = InMemoryStore::new();
        let res = store.update_phase(&mut |_| Err(GateError::NoActiveTask));
        assert!(res.is_err());
        assert!(store.read_phase().unwrap().is_none());
        assert!(store.transitions().unwrap().is_empty());
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let store = InMemoryStore::new();
        let res = store.update_tasks(&mut |map| {
            map.active_task = Some(Task::start("x", "feature/x", 1));
            Err(GateError::NoActiveTask)
        });
        assert!(res.is_err());
        assert!(store.read_tasks().unwrap().active_task.is_none());
    }

    #[test]
    fn test_mode_and_events() {
        let store = InMemoryStore::new();
        store
            .write_mode(&ModeRecord {
                mode: WorkflowMode::Execution,
                since: 3,
            })
            .unwrap();
        store
            .append_event(&Event::new(EventKind::WorkflowActivated, "on", 3))
            .unwrap();
        assert_eq!(store.read_mode().unwrap().unwrap().mode, WorkflowMode::Execution);
        assert_eq!(store.events().unwrap()[0].kind, EventKind::WorkflowActivated);
    }
}
