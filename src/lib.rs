//! QCT: Quality Case Toolkit
//!
//! A lifecycle engine for non-conformance and corrective/preventive action
//! (CAPA) cases: root-cause analysis, remedial actions, approval sign-off
//! and red/amber/green health, backed by a local SQLite store.

pub mod cli;
pub mod core;
pub mod entities;
pub mod lifecycle;
pub mod logging;
