//! Key/value annotations that remember what was sent.
//!
//! Series metadata is keyed by pull-request URL or branch name, mail metadata
//! by Message-ID. Values are JSON strings.

pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PatchError, Result};

/// Minimal key/value interface. Writes are last-write-wins.
pub trait AnnotationStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Typed helpers on top of [`AnnotationStore`].
pub trait AnnotationStoreExt: AnnotationStore {
    /// Read and deserialize the value under `key`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store `value` under `key`.
    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Fail with [`PatchError::StaleMetadata`] unless `key` still holds
    /// `expected`.
    fn ensure_unchanged(&self, key: &str, expected: Option<&str>) -> Result<()> {
        if self.get(key)?.as_deref() == expected {
            Ok(())
        } else {
            Err(PatchError::StaleMetadata {
                key: key.to_string(),
            })
        }
    }

    /// Write `value` only if `key` still holds `expected`.
    fn compare_and_set(&mut self, key: &str, expected: Option<&str>, value: &str) -> Result<()> {
        self.ensure_unchanged(key, expected)?;
        self.set(key, value)
    }
}

impl<S: AnnotationStore + ?Sized> AnnotationStoreExt for S {}
