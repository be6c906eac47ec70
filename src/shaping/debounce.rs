use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::debug;

/// Trailing debounce over caller-supplied instants: fires once `delay` has
/// passed since the most recent call.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// An armed deadline is not moved.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn call(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Real-time debounce running on its own thread. Dropping the handle
/// cancels a pending firing.
pub struct DebouncedFn {
    sender: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl DebouncedFn {
    pub fn call(&self) {
        if let Some(sender) = &self.sender {
            // The worker only exits once the sender is gone.
            let _ = sender.send(());
        }
    }
}

impl Drop for DebouncedFn {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub fn spawn_debounced<F>(delay: Duration, mut callback: F) -> DebouncedFn
where
    F: FnMut() + Send + 'static,
{
    let (sender, receiver) = unbounded::<()>();
    let worker = thread::spawn(move || {
        let mut armed = false;
        loop {
            let next = if armed {
                receiver.recv_timeout(delay)
            } else {
                receiver.recv().map_err(|_| RecvTimeoutError::Disconnected)
            };
            match next {
                Ok(()) => armed = true,
                Err(RecvTimeoutError::Timeout) => {
                    armed = false;
                    callback();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Debounce worker stopped (pending={}).", armed);
                    break;
                }
            }
        }
    });
    DebouncedFn {
        sender: Some(sender),
        worker: Some(worker),
    }
}
