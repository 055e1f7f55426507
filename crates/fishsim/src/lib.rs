//! Headless runner for fish gait batches
//!
//! Loads the layered configuration, builds a school of in-memory rigs and
//! writes a RON report of the run.

pub mod config;
pub mod report;
pub mod school;

pub use config::FishSimConfig;
pub use report::RunReport;
pub use school::School;
