use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("concurrency must be between {min} and {max}, got {got}")]
    ConcurrencyOutOfRange { got: i64, min: u8, max: u8 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeapError {
    #[error("no heap node named '{0}'")]
    UnknownNode(String),
    #[error("a collection cycle is already running")]
    CollectionInProgress,
    #[error("no collection cycle is running")]
    NoCollection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapingError {
    #[error("window must be {min}..={max} ms in steps of {step}, got {got}")]
    WindowOutOfRange { got: u64, min: u64, max: u64, step: u64 },
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("pool driver is not running")]
    Disconnected,
    #[error("pool driver thread panicked")]
    DriverPanicked,
}
