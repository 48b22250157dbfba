//! CLI command implementations

pub mod action;
pub mod approval;
pub mod case;
pub mod completions;
pub mod export;
pub mod init;
pub mod rca;
pub mod report;
pub mod status;
pub mod team;
