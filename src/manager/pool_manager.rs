use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};

use crate::config::SimConfig;
use crate::error::ManagerError;
use crate::models::message::PoolMessage;
use crate::pool::clock::TickConfig;
use crate::pool::scheduler::{Concurrency, PoolState};
use crate::worker::worker::{lock, spawn_driver_thread};

/// Owns the simulated pool and the thread that ticks it.
pub struct PoolManager {
    state: Arc<Mutex<PoolState>>,
    clock: TickConfig,
    sender: Sender<PoolMessage>,
    receiver: Option<Receiver<PoolMessage>>,
    driver: Option<JoinHandle<()>>,
}

impl PoolManager {
    pub fn new(config: &SimConfig) -> Self {
        let (sender, receiver) = unbounded();
        PoolManager {
            state: Arc::new(Mutex::new(PoolState::new(
                config.concurrency,
                config.clock,
                config.seed,
            ))),
            clock: config.clock,
            sender,
            receiver: Some(receiver),
            driver: None,
        }
    }

    pub fn start(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            warn!("Pool driver already started.");
            return;
        };
        let state = Arc::clone(&self.state);
        self.driver = Some(spawn_driver_thread(state, receiver, self.clock.period()));
        info!("Pool driver started ({} ms tick).", self.clock.period_ms());
    }

    pub fn enqueue(&self) -> Result<(), ManagerError> {
        self.send(PoolMessage::Enqueue)
    }

    pub fn set_concurrency(&self, slots: Concurrency) -> Result<(), ManagerError> {
        self.send(PoolMessage::SetConcurrency(slots))
    }

    /// Copy of the current state for rendering.
    pub fn snapshot(&self) -> PoolState {
        lock(&self.state).clone()
    }

    /// Cancels the timer and joins the driver; no tick runs afterwards.
    pub fn stop(&mut self) -> Result<(), ManagerError> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };
        // A driver that already exited has dropped its receiver.
        let _ = self.sender.send(PoolMessage::Shutdown);
        driver.join().map_err(|_| ManagerError::DriverPanicked)?;
        info!("Pool driver stopped.");
        Ok(())
    }

    fn send(&self, message: PoolMessage) -> Result<(), ManagerError> {
        if self.driver.is_none() {
            return Err(ManagerError::Disconnected);
        }
        self.sender
            .send(message)
            .map_err(|_| ManagerError::Disconnected)
    }
}

impl Drop for PoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Pool driver did not stop cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::models::task::TaskStatus;

    fn manager() -> PoolManager {
        PoolManager::new(&SimConfig {
            concurrency: Concurrency::new(2).unwrap(),
            clock: TickConfig::new(5),
            seed: 11,
            ..SimConfig::default()
        })
    }

    fn wait_for(manager: &PoolManager, pred: impl Fn(&PoolState) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if pred(&manager.snapshot()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn commands_before_start_are_rejected() {
        let m = manager();
        assert!(matches!(m.enqueue(), Err(ManagerError::Disconnected)));
    }

    #[test]
    fn driver_admits_enqueued_tasks() {
        let mut m = manager();
        m.start();
        m.enqueue().unwrap();
        assert!(wait_for(&m, |s| s.count(TaskStatus::Running) == 2));
        let snap = m.snapshot();
        assert_eq!(snap.tasks().len(), 5);
        assert!(snap.count(TaskStatus::Running) <= 2);
        m.stop().unwrap();
    }

    #[test]
    fn concurrency_change_reaches_driver() {
        let mut m = manager();
        m.start();
        m.set_concurrency(Concurrency::new(5).unwrap()).unwrap();
        assert!(wait_for(&m, |s| s.concurrency().get() == 5));
        m.enqueue().unwrap();
        assert!(wait_for(&m, |s| s.count(TaskStatus::Pending) == 0 && !s.tasks().is_empty()));
    }

    #[test]
    fn no_ticks_after_stop() {
        let mut m = manager();
        m.start();
        assert!(wait_for(&m, |s| s.ticks() > 2));
        m.stop().unwrap();
        let ticks = m.snapshot().ticks();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(m.snapshot().ticks(), ticks);
        assert!(matches!(m.enqueue(), Err(ManagerError::Disconnected)));
        m.stop().unwrap();
    }
}
