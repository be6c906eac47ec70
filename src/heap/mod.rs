pub mod gc;
pub mod node;
