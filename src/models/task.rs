#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub progress: f64,
    duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
}

impl Task {
    pub fn new(id: String, duration: f64) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0.0,
            duration,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Pending -> Running. Any other state is left alone.
    pub fn start(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        true
    }

    /// Adds `step` percent to a running task. Returns true when this call
    /// completed it; progress is clamped to exactly 100 on completion.
    pub fn advance(&mut self, step: f64) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        let next = self.progress + step;
        if next >= 100.0 {
            self.progress = 100.0;
            self.status = TaskStatus::Completed;
            true
        } else {
            self.progress = next;
            false
        }
    }
}
