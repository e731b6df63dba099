//! CLI Commands

pub mod clean;
pub mod report;
pub mod run;
