//! `patchmail`: turn pull requests into mailing-list patch series.
//!
//! This crate provides the engine that exports a commit range as mails,
//! fills in the cover letter, threads resubmissions as v2, v3, … with
//! range-diffs, and records what was sent.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod repo;
pub mod series;
pub mod store;
pub mod transport;
