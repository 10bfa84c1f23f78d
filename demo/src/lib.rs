//! signal-demo: 用场景文件驱动信号引擎的演示程序

pub mod console;
pub mod runner;
pub mod scenario;

pub use runner::{run, Report};
pub use scenario::Scenario;
