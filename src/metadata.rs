//! Metadata - Per-Edition Records and the Run Collection

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dna::Dna;
use crate::layers::Attribute;
use crate::rarity::RarityTier;
use crate::storage::StoredObject;
use crate::ENGINE_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub name: String,
    pub description: String,
    pub image: String,
    pub image_hash: String,
    pub dna: String,
    pub edition: u32,
    pub tier: RarityTier,
    /// Unix millis.
    pub date: i64,
    pub attributes: Vec<Attribute>,
    pub compiler: String,
}

pub struct MetadataSynthesizer {
    description: String,
}

impl MetadataSynthesizer {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn synthesize(
        &self,
        edition: u32,
        tier: &RarityTier,
        dna: &Dna,
        attributes: Vec<Attribute>,
        image: &StoredObject,
    ) -> MetadataRecord {
        MetadataRecord {
            name: format!("#{}", edition),
            description: self.description.clone(),
            image: image.path.clone(),
            image_hash: image.hash.clone(),
            dna: dna.to_string(),
            edition,
            tier: tier.clone(),
            date: Utc::now().timestamp_millis(),
            attributes,
            compiler: format!("editions-core {}", ENGINE_VERSION),
        }
    }
}

/// Records of the current run, keyed and ordered by edition number.
#[derive(Debug, Default)]
pub struct MetadataCollection {
    records: BTreeMap<u32, MetadataRecord>,
}

impl MetadataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its edition. Returns the replaced one.
    pub fn upsert(&mut self, record: MetadataRecord) -> Option<MetadataRecord> {
        self.records.insert(record.edition, record)
    }

    pub fn get(&self, edition: u32) -> Option<&MetadataRecord> {
        self.records.get(&edition)
    }

    pub fn records(&self) -> Vec<MetadataRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(edition: u32) -> StoredObject {
        StoredObject {
            path: format!("memory://{}.png", edition),
            hash: "ab".repeat(32),
        }
    }

    fn attributes() -> Vec<Attribute> {
        vec![Attribute {
            trait_type: "eyes".into(),
            value: "Red".into(),
        }]
    }

    #[test]
    fn test_record_fields() {
        let record = MetadataSynthesizer::new("Rekt City survivors").synthesize(
            17,
            &"rare".into(),
            &Dna::new(vec![0, 2]),
            attributes(),
            &stored(17),
        );
        assert_eq!(record.name, "#17");
        assert_eq!(record.dna, "0-2");
        assert_eq!(record.image, "memory://17.png");
        assert!(record.compiler.starts_with("editions-core"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["attributes"][0]["trait_type"], "eyes");
        assert_eq!(json["imageHash"], "ab".repeat(32));
    }

    #[test]
    fn test_upsert_replaces_same_edition() {
        let synth = MetadataSynthesizer::new("");
        let mut collection = MetadataCollection::new();
        let first = synth.synthesize(3, &"common".into(), &Dna::new(vec![0]), attributes(), &stored(3));
        let again = synth.synthesize(3, &"rare".into(), &Dna::new(vec![1]), attributes(), &stored(3));
        let other = synth.synthesize(2, &"common".into(), &Dna::new(vec![1]), attributes(), &stored(2));

        assert!(collection.upsert(first).is_none());
        assert!(collection.upsert(again).is_some());
        collection.upsert(other);

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(3).unwrap().tier.as_str(), "rare");
        let editions: Vec<_> = collection.records().iter().map(|r| r.edition).collect();
        assert_eq!(editions, vec![2, 3]);
    }
}
