/// Lifecycle states a worker passes through for one query plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingPlan,
    PlanAcknowledged,
    Running,
    Done,
    ShuttingDown,
}

/// Drives one worker through `receive plan -> acknowledge -> await
/// "start" -> localise plan -> execute -> send EOS -> clear queues ->
/// await next plan`. A liveness timer pings the coordinator; three
/// consecutive failed pings shut the worker down. The network
/// transport itself is external — this models only the state the
/// core's contract depends on.
pub struct Worker {
    id: usize,
    state: WorkerState,
    missed_pings: u32,
}

const MAX_MISSED_PINGS: u32 = 3;

impl Worker {
    pub fn new(id: usize) -> Self {
        Worker {
            id,
            state: WorkerState::AwaitingPlan,
            missed_pings: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Coordinator has sent a plan; worker acknowledges with its id.
    pub fn receive_plan(&mut self) -> usize {
        self.state = WorkerState::PlanAcknowledged;
        self.id
    }

    /// Coordinator's `"start"` message arrives; worker localises table
    /// references and wires consumers before executing.
    pub fn receive_start(&mut self) {
        self.state = WorkerState::Running;
    }

    /// Execution finished: end-of-stream was sent, queues are clear.
    pub fn finish(&mut self) {
        self.state = WorkerState::Done;
    }

    /// Coordinator's plan round is done; worker goes back to waiting.
    pub fn reset_for_next_plan(&mut self) {
        self.state = WorkerState::AwaitingPlan;
        self.missed_pings = 0;
    }

    /// Called by the liveness timer; `reachable` reflects whether the
    /// last ping to the coordinator succeeded.
    pub fn tick(&mut self, reachable: bool) {
        if reachable {
            self.missed_pings = 0;
            return;
        }
        self.missed_pings += 1;
        if self.missed_pings >= MAX_MISSED_PINGS {
            self.state = WorkerState::ShuttingDown;
        }
    }

    pub fn should_shut_down(&self) -> bool {
        self.state == WorkerState::ShuttingDown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_transitions_in_order() {
        let mut w = Worker::new(7);
        assert_eq!(w.state(), WorkerState::AwaitingPlan);
        assert_eq!(w.receive_plan(), 7);
        assert_eq!(w.state(), WorkerState::PlanAcknowledged);
        w.receive_start();
        assert_eq!(w.state(), WorkerState::Running);
        w.finish();
        assert_eq!(w.state(), WorkerState::Done);
        w.reset_for_next_plan();
        assert_eq!(w.state(), WorkerState::AwaitingPlan);
    }

    #[test]
    fn three_missed_pings_triggers_shutdown() {
        let mut w = Worker::new(1);
        w.tick(false);
        w.tick(false);
        assert!(!w.should_shut_down());
        w.tick(false);
        assert!(w.should_shut_down());
    }

    #[test]
    fn a_successful_ping_resets_the_miss_counter() {
        let mut w = Worker::new(1);
        w.tick(false);
        w.tick(false);
        w.tick(true);
        w.tick(false);
        w.tick(false);
        assert!(!w.should_shut_down());
    }
}
