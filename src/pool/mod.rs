pub mod clock;
pub mod event_log;
pub mod generator;
pub mod scheduler;
