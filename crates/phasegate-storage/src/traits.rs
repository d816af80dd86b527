use phasegate_core::{Event, GateError, ModeRecord, Phase, PhaseRecord, TaskMap, TransitionRecord};

/// Single owner of all persisted workflow state.
///
/// Reads return `GateError::MalformedState` for unparsable data so callers can
/// choose to degrade; missing data is `None` / default. Every mutation is an
/// atomic read-modify-write with respect to other writers.
pub trait StateStore: Send + Sync {
    fn read_phase(&self) -> Result<Option<PhaseRecord>, GateError>;

    /// Return the persisted phase, or persist `initial` (and its transition) if none exists.
    fn ensure_phase(&self, initial: &TransitionRecord) -> Result<PhaseRecord, GateError>;

    /// Build a transition from the current phase with `op`, then overwrite the
    /// phase and append the record, all under one write lock. Nothing is
    /// written if `op` fails. `op` must not call back into the store.
    fn update_phase(
        &self,
        op: &mut dyn FnMut(Option<Phase>) -> Result<TransitionRecord, GateError>,
    ) -> Result<TransitionRecord, GateError>;

    /// Oldest first.
    fn transitions(&self) -> Result<Vec<TransitionRecord>, GateError>;

    fn read_tasks(&self) -> Result<TaskMap, GateError>;

    /// Apply `op` to the task map and persist the result. Nothing is written if `op` fails.
    fn update_tasks(
        &self,
        op: &mut dyn FnMut(&mut TaskMap) -> Result<(), GateError>,
    ) -> Result<TaskMap, GateError>;

    fn read_mode(&self) -> Result<Option<ModeRecord>, GateError>;
    fn write_mode(&self, record: &ModeRecord) -> Result<(), GateError>;

    /// Append-only audit log; ordering is best effort.
    fn append_event(&self, event: &Event) -> Result<(), GateError>;
    fn events(&self) -> Result<Vec<Event>, GateError>;
}
