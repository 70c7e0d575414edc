//! Generation Config - The Collection Contract
//!
//! Loaded from JSON by the caller. The engine only consumes a validated copy.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dna::DEFAULT_MAX_DNA_ATTEMPTS;
use crate::error::Result;
use crate::layers::Layer;
use crate::rarity::TierWeight;
use crate::storage::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub start_edition: u32,
    pub end_edition: u32,
    pub rarity_weights: Vec<TierWeight>,
    /// Ordered bottom to top.
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub background: Background,
    #[serde(default = "default_signature_position")]
    pub signature_position: [i32; 2],
    #[serde(default = "default_max_dna_attempts")]
    pub max_dna_attempts: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub engine_min_version: Option<String>,
    #[serde(default)]
    pub upload: RetryPolicy,
}

fn default_signature_position() -> [i32; 2] { [40, 40] }
fn default_max_dna_attempts() -> u32 { DEFAULT_MAX_DNA_ATTEMPTS }

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    /// Pastel color drawn per edition.
    #[default]
    Random,
    Solid(String),
    None,
}

impl GenerationConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Number of editions in the inclusive range, zero when inverted.
    pub fn edition_count(&self) -> u32 {
        if self.end_edition < self.start_edition {
            0
        } else {
            self.end_edition - self.start_edition + 1
        }
    }
}
