//! Collection Manifest - Run-Level Listing of Every Edition

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::hashing::compute_manifest_hash;
use crate::metadata::MetadataRecord;
use crate::storage::{ContentStore, RetryPolicy};
use crate::ENGINE_VERSION;

pub const MANIFEST_FILENAME: &str = "_metadata.json";

/// Inclusive bounds of the editions actually generated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EditionRange {
    pub first: u32,
    pub last: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionManifest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub first_edition: u32,
    pub last_edition: u32,
    pub count: usize,
    /// Hash over name, description, bounds and records.
    pub manifest_hash: String,
    pub editions: Vec<MetadataRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSummary {
    pub id: String,
    pub path: String,
    pub hash: String,
    pub manifest_hash: String,
    pub range: EditionRange,
    pub count: usize,
}

pub trait ManifestCompiler {
    fn compile(&self, records: &[MetadataRecord], range: EditionRange) -> Result<ManifestSummary>;
}

/// Writes the manifest as pretty JSON to a content store.
pub struct JsonManifestCompiler<'a> {
    store: &'a dyn ContentStore,
    retry: RetryPolicy,
    name: String,
    description: String,
}

impl<'a> JsonManifestCompiler<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        retry: RetryPolicy,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            store,
            retry,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn build(&self, records: &[MetadataRecord], range: EditionRange) -> Result<CollectionManifest> {
        let manifest_hash = compute_manifest_hash(&(
            &self.name,
            &self.description,
            range,
            records,
        ))?;

        Ok(CollectionManifest {
            id: Uuid::new_v4().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            first_edition: range.first,
            last_edition: range.last,
            count: records.len(),
            manifest_hash,
            editions: records.to_vec(),
        })
    }
}

impl ManifestCompiler for JsonManifestCompiler<'_> {
    fn compile(&self, records: &[MetadataRecord], range: EditionRange) -> Result<ManifestSummary> {
        let manifest = self.build(records, range)?;
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        let stored = self.retry.upload(self.store, &bytes, MANIFEST_FILENAME)?;
        info!(
            "manifest {} compiled: editions {}..={} ({} records)",
            stored.path, range.first, range.last, manifest.count
        );

        Ok(ManifestSummary {
            id: manifest.id,
            path: stored.path,
            hash: stored.hash,
            manifest_hash: manifest.manifest_hash,
            range,
            count: manifest.count,
        })
    }
}
