/// Monitoring engine module - probes checks and alerts on state changes
///
/// This module is responsible for:
/// - Sanitizing stored check records
/// - Executing HTTP/HTTPS probes with per-check timeouts
/// - Applying the up/down rule and deciding when to alert
/// - Sweeping every check on a fixed interval
pub mod checker;
pub mod executor;
pub mod processor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{Checker, HttpChecker};
pub use executor::{Capabilities, MonitoringExecutor};
pub use scheduler::MonitoringScheduler;
pub use types::{CheckState, Outcome};
