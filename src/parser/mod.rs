//! Mail text parsing: splitting format-patch exports and header handling.

pub mod header;
pub mod mbox;
