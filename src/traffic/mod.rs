pub mod config;
pub mod driver;
pub mod logging;
pub mod patterns;

pub use config::{TrafficConfig, TrafficPattern};
pub use driver::{CpuPort, CpuSummary, TrafficDriver};
pub use patterns::{PatternEngine, PatternOp, TrafficOp};
