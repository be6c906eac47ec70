pub mod debounce;
pub mod lab;
pub mod throttle;
