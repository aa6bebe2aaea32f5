pub mod monitor_job;
pub mod warning_throttle;
