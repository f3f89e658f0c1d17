pub mod period;
pub mod selector;
