pub mod cli;
pub mod config;
pub mod core;
pub mod exit;
pub mod logs;
pub mod monitor;
pub mod platform;
pub mod report;
pub mod scan;
pub mod ui;
