pub mod log_entry;
pub mod message;
pub mod task;
