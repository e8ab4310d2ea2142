use sluice_core::errors::SchedError;
use sluice_core::model::Bundle;
use sluice_core::scheduler::{QueueState, Scheduler, SchedulerId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// An in-memory scheduler for tests. Ids are handed out sequentially,
/// submitted bundles sit in `Queued` until [`MockScheduler::step`] moves
/// them along (queued → active → terminal), and both trait calls can be
/// made to fail on demand.
pub struct MockScheduler {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    submits: u64,
    fail_submits: BTreeSet<u64>,
    states: BTreeMap<SchedulerId, QueueState>,
    scripts: Vec<(String, String)>,
}

impl MockScheduler {
    pub fn new() -> Self {
        MockScheduler {
            inner: Mutex::new(Inner::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("mock scheduler mutex must not be poisoned")
    }

    /// Makes the `index`-th submit (0-based, counted over the scheduler's
    /// lifetime) fail with a rejection.
    pub fn fail_submit(&self, index: u64) {
        self.lock().fail_submits.insert(index);
    }

    /// While set, both `submit` and `query` fail as unavailable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Advances every tracked id one state: queued → active → terminal.
    pub fn step(&self) {
        let mut inner = self.lock();
        for state in inner.states.values_mut() {
            *state = match state {
                QueueState::Queued => QueueState::Active,
                _ => QueueState::Terminal,
            };
        }
    }

    /// Marks every tracked id terminal at once.
    pub fn finish_all(&self) {
        let mut inner = self.lock();
        for state in inner.states.values_mut() {
            *state = QueueState::Terminal;
        }
    }

    /// Drops an id entirely, as if the queue had expired it.
    pub fn forget(&self, id: &SchedulerId) {
        self.lock().states.remove(id);
    }

    pub fn submit_count(&self) -> u64 {
        self.lock().submits
    }

    pub fn state_of(&self, id: &SchedulerId) -> Option<QueueState> {
        self.lock().states.get(id).copied()
    }

    /// The scripts handed over so far, as (bundle label, text) pairs.
    pub fn scripts(&self) -> Vec<(String, String)> {
        self.lock().scripts.clone()
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for MockScheduler {
    fn name(&self) -> &str {
        "mock"
    }

    fn submit(&self, bundle: &Bundle, script: &str) -> Result<SchedulerId, SchedError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SchedError::Unavailable {
                scheduler: "mock".to_string(),
                reason: "mock scheduler is offline".to_string(),
            });
        }
        let mut inner = self.lock();
        let index = inner.submits;
        inner.submits += 1;
        if inner.fail_submits.remove(&index) {
            return Err(SchedError::Rejected {
                scheduler: "mock".to_string(),
                reason: format!("mock rejection of submit #{}", index),
            });
        }
        let id = SchedulerId(format!("mock-{}", inner.next_id));
        inner.next_id += 1;
        inner.states.insert(id.clone(), QueueState::Queued);
        inner.scripts.push((bundle.label.clone(), script.to_string()));
        Ok(id)
    }

    fn query(
        &self,
        ids: &BTreeSet<SchedulerId>,
    ) -> Result<HashMap<SchedulerId, QueueState>, SchedError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SchedError::Unavailable {
                scheduler: "mock".to_string(),
                reason: "mock scheduler is offline".to_string(),
            });
        }
        let inner = self.lock();
        Ok(ids
            .iter()
            .map(|id| {
                let state = inner.states.get(id).copied().unwrap_or(QueueState::Unknown);
                (id.clone(), state)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::model::Directives;

    fn bundle(label: &str) -> Bundle {
        Bundle {
            label: label.to_string(),
            tasks: vec![],
            directives: Directives::default(),
        }
    }

    #[test]
    fn test_submitted_ids_step_through_states() {
        let sched = MockScheduler::new();
        let id = sched.submit(&bundle("b0"), "#!/bin/bash\n").unwrap();
        assert_eq!(sched.state_of(&id), Some(QueueState::Queued));
        sched.step();
        assert_eq!(sched.state_of(&id), Some(QueueState::Active));
        sched.step();
        assert_eq!(sched.state_of(&id), Some(QueueState::Terminal));
    }

    #[test]
    fn test_fail_submit_hits_the_requested_ordinal() {
        let sched = MockScheduler::new();
        sched.fail_submit(1);
        assert!(sched.submit(&bundle("b0"), "").is_ok());
        assert!(matches!(
            sched.submit(&bundle("b1"), ""),
            Err(SchedError::Rejected { .. })
        ));
        assert!(sched.submit(&bundle("b2"), "").is_ok());
        assert_eq!(sched.submit_count(), 3);
    }

    #[test]
    fn test_unavailable_fails_query() {
        let sched = MockScheduler::new();
        let id = sched.submit(&bundle("b0"), "").unwrap();
        sched.set_unavailable(true);
        let ids: BTreeSet<SchedulerId> = [id].into_iter().collect();
        assert!(matches!(
            sched.query(&ids),
            Err(SchedError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_forgotten_ids_read_unknown() {
        let sched = MockScheduler::new();
        let id = sched.submit(&bundle("b0"), "").unwrap();
        sched.forget(&id);
        let ids: BTreeSet<SchedulerId> = [id.clone()].into_iter().collect();
        let states = sched.query(&ids).unwrap();
        assert_eq!(states.get(&id), Some(&QueueState::Unknown));
    }
}
