use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::PoolError;
use crate::models::task::{Task, TaskStatus};
use crate::pool::clock::TickConfig;
use crate::pool::event_log::EventLog;
use crate::pool::generator::{generate_batch, BATCH_SIZE};

pub const MIN_CONCURRENCY: u8 = 1;
pub const MAX_CONCURRENCY: u8 = 6;
pub const DEFAULT_CONCURRENCY: u8 = 3;

/// Number of execution slots, always within 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency(u8);

impl Concurrency {
    pub fn new(slots: i64) -> Result<Self, PoolError> {
        if (MIN_CONCURRENCY as i64..=MAX_CONCURRENCY as i64).contains(&slots) {
            Ok(Self(slots as u8))
        } else {
            Err(PoolError::ConcurrencyOutOfRange {
                got: slots,
                min: MIN_CONCURRENCY,
                max: MAX_CONCURRENCY,
            })
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self(DEFAULT_CONCURRENCY)
    }
}

impl TryFrom<i64> for Concurrency {
    type Error = PoolError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// What a single tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub completed: Vec<String>,
    pub admitted: Vec<String>,
}

/// The whole simulated pool: task backlog, capacity, rolling log and the
/// random source used to generate tasks.
#[derive(Debug, Clone)]
pub struct PoolState {
    tasks: Vec<Task>,
    concurrency: Concurrency,
    clock: TickConfig,
    log: EventLog,
    rng: ChaCha8Rng,
    ticks: u64,
}

impl PoolState {
    pub fn new(concurrency: Concurrency, clock: TickConfig, seed: u64) -> Self {
        Self {
            tasks: Vec::new(),
            concurrency,
            clock,
            log: EventLog::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            ticks: 0,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Takes effect on the next tick; running tasks are never preempted.
    pub fn set_concurrency(&mut self, concurrency: Concurrency) {
        debug!("Concurrency {} -> {}", self.concurrency.get(), concurrency.get());
        self.concurrency = concurrency;
    }

    pub fn enqueue(&mut self) {
        let batch = generate_batch(&mut self.rng);
        self.push_tasks(batch);
        self.log
            .append(format!("Enqueued {} new tasks to the buffer.", BATCH_SIZE));
    }

    /// Appends tasks to the backlog as-is.
    pub fn push_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn by_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        for task in self.tasks.iter_mut() {
            let step = self.clock.progress_step(task.duration());
            if task.advance(step) {
                report.completed.push(task.id.clone());
            }
        }

        let running = self.count(TaskStatus::Running);
        let available = self.concurrency.get().saturating_sub(running);
        if available > 0 {
            // Positional admission: duplicate ids never double-book a slot.
            for task in self
                .tasks
                .iter_mut()
                .filter(|t| t.status == TaskStatus::Pending)
                .take(available)
            {
                task.start();
                report.admitted.push(task.id.clone());
            }
        }

        for id in &report.completed {
            self.log.append(format!("Task_{} completed", id));
        }
        for id in &report.admitted {
            self.log.append(format!("Slot secured for Task_{}", id));
        }
        if !report.completed.is_empty() || !report.admitted.is_empty() {
            debug!(
                "Tick {}: completed {:?}, admitted {:?}",
                report.tick, report.completed, report.admitted
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(slots: i64) -> PoolState {
        PoolState::new(Concurrency::new(slots).unwrap(), TickConfig::default(), 1)
    }

    fn fixed(ids: &[&str], duration: f64) -> Vec<Task> {
        ids.iter().map(|id| Task::new(id.to_string(), duration)).collect()
    }

    fn statuses(state: &PoolState) -> Vec<TaskStatus> {
        state.tasks().iter().map(|t| t.status).collect()
    }

    fn rank(status: TaskStatus) -> u8 {
        match status {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed => 2,
        }
    }

    #[test]
    fn concurrency_bounds() {
        assert!(Concurrency::new(0).is_err());
        assert!(Concurrency::new(7).is_err());
        assert_eq!(Concurrency::new(1).unwrap().get(), 1);
        assert_eq!(Concurrency::try_from(6).unwrap().get(), 6);
        assert_eq!(
            Concurrency::new(-2),
            Err(PoolError::ConcurrencyOutOfRange { got: -2, min: 1, max: 6 })
        );
    }

    #[test]
    fn two_slots_drain_five_tasks() {
        let mut s = state(2);
        s.push_tasks(fixed(&["A", "B", "C", "D", "E"], 1000.0));
        let report = s.tick();
        assert_eq!(report.admitted, ["A", "B"]);
        assert_eq!(s.count(TaskStatus::Running), 2);
        assert_eq!(s.count(TaskStatus::Pending), 3);

        // 1000 units at 10% per tick: complete on the 10th running tick.
        for _ in 0..9 {
            let r = s.tick();
            assert!(r.completed.is_empty());
            assert!(r.admitted.is_empty());
        }
        let r = s.tick();
        assert_eq!(r.completed, ["A", "B"]);
        assert_eq!(r.admitted, ["C", "D"]);
        assert_eq!(s.count(TaskStatus::Running), 2);

        while s.count(TaskStatus::Completed) < 5 {
            s.tick();
            assert!(s.count(TaskStatus::Running) <= 2);
        }
        assert_eq!(s.count(TaskStatus::Pending), 0);
    }

    #[test]
    fn one_completion_promotes_exactly_one() {
        let mut s = state(2);
        s.push_tasks(fixed(&["A"], 500.0));
        s.push_tasks(fixed(&["B", "C", "D"], 5000.0));
        s.tick();
        for _ in 0..4 {
            s.tick();
        }
        let r = s.tick();
        assert_eq!(r.completed, ["A"]);
        assert_eq!(r.admitted, ["C"]);
        assert_eq!(s.count(TaskStatus::Running), 2);
        assert_eq!(s.count(TaskStatus::Pending), 1);
    }

    #[test]
    fn lowering_concurrency_does_not_preempt() {
        let mut s = state(3);
        s.push_tasks(fixed(&["A", "B", "C", "D"], 2500.0));
        s.tick();
        assert_eq!(s.count(TaskStatus::Running), 3);

        s.set_concurrency(Concurrency::new(1).unwrap());
        // 4% per tick: admitted on tick 1, complete on tick 26.
        for _ in 0..24 {
            let r = s.tick();
            assert!(r.admitted.is_empty());
            assert_eq!(s.count(TaskStatus::Running), 3);
        }
        let r = s.tick();
        assert_eq!(r.completed, ["A", "B", "C"]);
        assert_eq!(r.admitted, ["D"]);
        assert_eq!(s.count(TaskStatus::Running), 1);
    }

    #[test]
    fn fifo_admission_with_single_slot() {
        let mut s = state(1);
        s.push_tasks(fixed(&["FIRST", "SECOND"], 200.0));
        assert_eq!(s.tick().admitted, ["FIRST"]);
        s.tick();
        let r = s.tick();
        assert_eq!(r.completed, ["FIRST"]);
        assert_eq!(r.admitted, ["SECOND"]);
    }

    #[test]
    fn duplicate_ids_take_one_slot_each() {
        let mut s = state(1);
        s.push_tasks(fixed(&["DUPED", "DUPED"], 3000.0));
        s.tick();
        assert_eq!(s.count(TaskStatus::Running), 1);
        assert_eq!(s.count(TaskStatus::Pending), 1);
    }

    #[test]
    fn short_task_completes_in_one_tick() {
        let mut s = state(1);
        s.push_tasks(fixed(&["QUICK"], 80.0));
        s.tick();
        let r = s.tick();
        assert_eq!(r.completed, ["QUICK"]);
        assert_eq!(s.tasks()[0].progress, 100.0);
    }

    #[test]
    fn invariants_hold_over_random_run() {
        let mut s = state(3);
        s.enqueue();
        s.enqueue();
        let mut prev = s.tasks().to_vec();
        for i in 0..400 {
            if i == 20 {
                s.set_concurrency(Concurrency::new(1).unwrap());
            }
            if i == 90 {
                s.set_concurrency(Concurrency::new(6).unwrap());
                s.enqueue();
            }
            let running_before = s.count(TaskStatus::Running);
            s.tick();
            let running = s.count(TaskStatus::Running);
            assert!(running <= s.concurrency().get().max(running_before));
            assert!(s.log().len() <= 5);

            for (before, after) in prev.iter().zip(s.tasks()) {
                assert!(rank(after.status) >= rank(before.status));
                assert!(after.progress >= before.progress);
                assert!(after.progress <= 100.0);
                assert_eq!(after.duration(), before.duration());
                if after.status == TaskStatus::Completed {
                    assert_eq!(after.progress, 100.0);
                }
            }
            prev = s.tasks().to_vec();
        }
        assert!(statuses(&s).iter().all(|st| *st == TaskStatus::Completed));
    }

    #[test]
    fn log_records_admissions_newest_first() {
        let mut s = state(2);
        s.enqueue();
        assert_eq!(
            s.log().entries().next().map(|e| e.message.as_str()),
            Some("Enqueued 5 new tasks to the buffer.")
        );
        s.tick();
        let second = s.tasks()[1].id.clone();
        assert_eq!(
            s.log().entries().next().map(|e| e.message.clone()),
            Some(format!("Slot secured for Task_{}", second))
        );
        assert_eq!(s.log().len(), 3);
    }

    #[test]
    fn completions_are_logged_before_admissions() {
        let mut s = state(2);
        s.push_tasks(fixed(&["A"], 100.0));
        s.push_tasks(fixed(&["B", "C"], 2500.0));
        s.tick();
        let report = s.tick();
        assert_eq!(report.completed, ["A"]);
        assert_eq!(report.admitted, ["C"]);

        let messages: Vec<_> = s.log().entries().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "Slot secured for Task_C",
                "Task_A completed",
                "Slot secured for Task_B",
                "Slot secured for Task_A",
            ]
        );
    }

    #[test]
    fn enqueue_is_deterministic_per_seed() {
        let mut a = state(2);
        let mut b = state(2);
        a.enqueue();
        b.enqueue();
        assert_eq!(a.tasks(), b.tasks());
        assert_eq!(a.tasks().len(), 5);
    }
}
