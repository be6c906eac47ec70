use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{select, tick, Receiver};
use log::{error, info, trace};

use crate::models::message::PoolMessage;
use crate::pool::scheduler::{Concurrency, PoolState};

/// Drives `PoolState::tick` from a real periodic timer. This thread is the
/// only writer; commands are applied between ticks so ticks never overlap.
pub fn spawn_driver_thread(
    state: Arc<Mutex<PoolState>>,
    receiver: Receiver<PoolMessage>,
    period: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let ticker = tick(period);
        loop {
            select! {
                recv(ticker) -> _ => handle_tick(&state),
                recv(receiver) -> message => match message {
                    Ok(PoolMessage::Enqueue) => handle_enqueue(&state),
                    Ok(PoolMessage::SetConcurrency(slots)) => handle_set_concurrency(slots, &state),
                    Ok(PoolMessage::Shutdown) => {
                        info!("Pool driver shutting down.");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to receive message: {}", e);
                        break;
                    }
                },
            }
        }
    })
}

pub(crate) fn lock(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handle_tick(state: &Arc<Mutex<PoolState>>) {
    let report = lock(state).tick();
    trace!("Tick {} applied.", report.tick);
}

fn handle_enqueue(state: &Arc<Mutex<PoolState>>) {
    let mut guard = lock(state);
    guard.enqueue();
    info!("Enqueued task batch ({} tasks total).", guard.tasks().len());
}

fn handle_set_concurrency(slots: Concurrency, state: &Arc<Mutex<PoolState>>) {
    lock(state).set_concurrency(slots);
    info!("Concurrency set to {}.", slots.get());
}
