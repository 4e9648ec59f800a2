//! Saga instances and their compensation log.

use common::InstanceId;

use crate::state::SagaStatus;

/// One entry in the compensation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedStep {
    /// Position of the step in its definition.
    pub index: usize,
    /// Step name.
    pub name: String,
}

/// Append-only record of steps whose forward action succeeded.
///
/// Entries are kept in success order; [`CompensationLog::unwind`] walks them
/// last-succeeded-first, which is the order compensations must run in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationLog {
    entries: Vec<LoggedStep>,
}

impl CompensationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a succeeded step.
    pub fn record(&mut self, index: usize, name: impl Into<String>) {
        self.entries.push(LoggedStep {
            index,
            name: name.into(),
        });
    }

    /// Returns entries in reverse success order.
    pub fn unwind(&self) -> impl Iterator<Item = &LoggedStep> {
        self.entries.iter().rev()
    }

    /// Returns step names in success order.
    pub fn step_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Returns the number of logged steps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no step has succeeded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One execution of a saga definition against one payload.
///
/// Created by the orchestrator with status `Running`, cursor 0 and an empty
/// log. Only the orchestrator mutates it, and it is consumed into the
/// execution result once terminal.
#[derive(Debug, Clone)]
pub struct SagaInstance<P> {
    instance_id: InstanceId,
    saga_id: String,
    payload: P,
    cursor: usize,
    log: CompensationLog,
    status: SagaStatus,
}

impl<P> SagaInstance<P> {
    pub(crate) fn new(saga_id: impl Into<String>, payload: P) -> Self {
        Self {
            instance_id: InstanceId::new(),
            saga_id: saga_id.into(),
            payload,
            cursor: 0,
            log: CompensationLog::new(),
            status: SagaStatus::Running,
        }
    }

    /// Returns the instance ID.
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Returns the saga type ID.
    pub fn saga_id(&self) -> &str {
        &self.saga_id
    }

    /// Returns the current payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Returns the cursor.
    ///
    /// While running this is the index of the next step to execute; after a
    /// forward failure it marks the failed step; during compensation it is
    /// the index of the step being unwound.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the compensation log.
    pub fn log(&self) -> &CompensationLog {
        &self.log
    }

    /// Returns the names of steps whose forward action succeeded.
    pub fn completed_steps(&self) -> Vec<String> {
        self.log.step_names()
    }

    /// Returns the current status.
    pub fn status(&self) -> SagaStatus {
        self.status
    }

    pub(crate) fn record_success(&mut self, name: &str, payload: P) {
        debug_assert_eq!(self.status, SagaStatus::Running);
        self.payload = payload;
        self.log.record(self.cursor, name);
        self.cursor += 1;
    }

    pub(crate) fn begin_compensation(&mut self) {
        debug_assert!(self.status.can_compensate());
        self.status = SagaStatus::Compensating;
    }

    pub(crate) fn unwinding(&mut self, index: usize) {
        debug_assert_eq!(self.status, SagaStatus::Compensating);
        self.cursor = index;
    }

    pub(crate) fn complete(&mut self) {
        debug_assert!(self.status.can_complete());
        self.status = SagaStatus::Completed;
    }

    pub(crate) fn resolve(&mut self, fully_compensated: bool) {
        debug_assert!(self.status.can_resolve());
        self.status = if fully_compensated {
            SagaStatus::Compensated
        } else {
            SagaStatus::Failed
        };
    }

    pub(crate) fn into_payload(self) -> P {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_starts_running() {
        let instance = SagaInstance::new("create-order", 7u32);
        assert_eq!(instance.saga_id(), "create-order");
        assert_eq!(instance.status(), SagaStatus::Running);
        assert_eq!(instance.cursor(), 0);
        assert!(instance.log().is_empty());
        assert_eq!(*instance.payload(), 7);
    }

    #[test]
    fn test_instances_have_distinct_ids() {
        let a = SagaInstance::new("s", ());
        let b = SagaInstance::new("s", ());
        assert_ne!(a.instance_id(), b.instance_id());
    }

    #[test]
    fn test_record_success_advances_cursor_and_log() {
        let mut instance = SagaInstance::new("s", 0u32);
        instance.record_success("a", 1);
        instance.record_success("b", 2);

        assert_eq!(instance.cursor(), 2);
        assert_eq!(*instance.payload(), 2);
        assert_eq!(instance.completed_steps(), vec!["a", "b"]);
    }

    #[test]
    fn test_unwind_is_reverse_success_order() {
        let mut log = CompensationLog::new();
        log.record(0, "a");
        log.record(1, "b");
        log.record(2, "c");

        let order: Vec<(usize, &str)> = log.unwind().map(|e| (e.index, e.name.as_str())).collect();
        assert_eq!(order, vec![(2, "c"), (1, "b"), (0, "a")]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_compensation_transitions() {
        let mut instance = SagaInstance::new("s", ());
        instance.record_success("a", ());
        instance.begin_compensation();
        assert_eq!(instance.status(), SagaStatus::Compensating);

        instance.unwinding(0);
        assert_eq!(instance.cursor(), 0);

        instance.resolve(false);
        assert_eq!(instance.status(), SagaStatus::Failed);
        assert!(instance.status().is_terminal());
    }

    #[test]
    fn test_complete() {
        let mut instance = SagaInstance::new("s", 1u8);
        instance.record_success("a", 2);
        instance.complete();
        assert_eq!(instance.status(), SagaStatus::Completed);
        assert_eq!(instance.into_payload(), 2);
    }
}
