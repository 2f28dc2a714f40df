pub mod batchrunner;
pub mod disc;
pub mod math;
pub mod parameters;
