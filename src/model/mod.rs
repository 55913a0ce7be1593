//! Core data model types: mails, addresses, and persisted series metadata.

pub mod address;
pub mod mail;
pub mod metadata;
