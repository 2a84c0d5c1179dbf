use crate::scheduler::SchedulerState;

/// Receives a snapshot after every state-mutating scheduler operation.
///
/// Fire-and-forget: implementations log their own failures, the scheduler
/// never waits on or inspects the outcome.
pub trait PersistenceSink: Send + Sync {
    fn save(&self, state: &SchedulerState);
}

/// Keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl PersistenceSink for NoPersistence {
    fn save(&self, _state: &SchedulerState) {}
}
