//! Storage - Content-Addressed Upload Targets
//!
//! A store accepts bytes plus a filename and answers with where the bytes
//! live and their SHA-256 hash.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};
use crate::hashing::sha256_hex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub hash: String,
}

pub trait ContentStore {
    fn upload(&self, bytes: &[u8], filename: &str) -> Result<StoredObject>;
}

/// Writes objects into a directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl ContentStore for LocalStore {
    fn upload(&self, bytes: &[u8], filename: &str) -> Result<StoredObject> {
        let path = self.root.join(filename);
        fs::write(&path, bytes)?;
        Ok(StoredObject {
            path: path.display().to_string(),
            hash: sha256_hex(bytes),
        })
    }
}

/// In-process store, addressed as `memory://<filename>`.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(filename).cloned()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ContentStore for MemoryStore {
    fn upload(&self, bytes: &[u8], filename: &str) -> Result<StoredObject> {
        let mut objects = self.objects.lock().map_err(|_| GenerationError::Upload {
            filename: filename.to_string(),
            reason: "memory store lock poisoned".into(),
        })?;
        objects.insert(filename.to_string(), bytes.to_vec());
        Ok(StoredObject {
            path: format!("memory://{}", filename),
            hash: sha256_hex(bytes),
        })
    }
}

/// Uploads to a primary store and keeps a copy in a mirror. The primary's
/// address is the one reported.
pub struct MirroredStore {
    primary: Box<dyn ContentStore>,
    mirror: Box<dyn ContentStore>,
}

impl MirroredStore {
    pub fn new(primary: Box<dyn ContentStore>, mirror: Box<dyn ContentStore>) -> Self {
        Self { primary, mirror }
    }
}

impl ContentStore for MirroredStore {
    fn upload(&self, bytes: &[u8], filename: &str) -> Result<StoredObject> {
        self.mirror.upload(bytes, filename)?;
        self.primary.upload(bytes, filename)
    }
}

/// Bounded retry with exponential backoff around a store upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 250 }
fn default_multiplier() -> u32 { 2 }

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            multiplier: 1,
        }
    }

    pub fn upload(&self, store: &dyn ContentStore, bytes: &[u8], filename: &str) -> Result<StoredObject> {
        let attempts = self.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.initial_backoff_ms);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match store.upload(bytes, filename) {
                Ok(stored) => return Ok(stored),
                Err(e) => {
                    warn!("upload of {} failed (attempt {}/{}): {}", filename, attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts && !backoff.is_zero() {
                        thread::sleep(backoff);
                        backoff = backoff.saturating_mul(self.multiplier.max(1));
                    }
                }
            }
        }

        Err(match last_error {
            Some(upload @ GenerationError::Upload { .. }) => upload,
            Some(other) => GenerationError::Upload {
                filename: filename.to_string(),
                reason: other.to_string(),
            },
            None => GenerationError::Upload {
                filename: filename.to_string(),
                reason: "no upload attempted".into(),
            },
        })
    }
}
