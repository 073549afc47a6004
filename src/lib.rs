#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod display;
pub mod history;
pub mod log_line;
pub mod monitor;
pub mod mqtt;
pub mod night;
pub mod payload;
pub mod telemetry;
pub mod topic;
pub mod update;
