use crate::pool::scheduler::Concurrency;

#[derive(Debug)]
pub enum PoolMessage {
    Enqueue,
    SetConcurrency(Concurrency),
    Shutdown,
}
