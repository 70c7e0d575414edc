//! Rarity Tiers - Weighted Tier Resolution
//!
//! Tiers are ordered by configuration only. Weights are relative and need not
//! sum to anything in particular.

use std::fmt;

use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

/// A named weight class, e.g. `common` or `legendary`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RarityTier(String);

impl RarityTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RarityTier {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the collection-wide tier table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierWeight {
    pub tier: RarityTier,
    pub weight: u32,
}

impl TierWeight {
    pub fn new(tier: impl Into<String>, weight: u32) -> Self {
        Self {
            tier: RarityTier::new(tier),
            weight,
        }
    }
}

/// Build a cumulative-weight distribution. Draws are uniform over the total
/// and land on the first entry whose cumulative bound exceeds the draw, so
/// zero-weight entries are never chosen.
pub(crate) fn weighted_index(weights: &[u32]) -> std::result::Result<WeightedIndex<u64>, WeightedError> {
    WeightedIndex::new(weights.iter().map(|&w| u64::from(w)))
}

/// Picks the tier for an edition.
#[derive(Debug, Clone)]
pub struct RarityResolver {
    tiers: Vec<RarityTier>,
    distribution: WeightedIndex<u64>,
}

impl RarityResolver {
    pub fn new(table: &[TierWeight]) -> Result<Self> {
        if table.is_empty() {
            return Err(GenerationError::Configuration(
                "rarity weight table is empty".into(),
            ));
        }

        let weights: Vec<u32> = table.iter().map(|t| t.weight).collect();
        let distribution = weighted_index(&weights).map_err(|e| match e {
            WeightedError::AllWeightsZero => {
                GenerationError::Configuration("all rarity weights are zero".into())
            }
            other => GenerationError::Configuration(format!("invalid rarity weights: {}", other)),
        })?;

        Ok(Self {
            tiers: table.iter().map(|t| t.tier.clone()).collect(),
            distribution,
        })
    }

    /// Draw one tier from the injected random source.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> &RarityTier {
        &self.tiers[self.distribution.sample(rng)]
    }

    /// Tiers in configuration order, including zero-weight ones.
    pub fn tiers(&self) -> &[RarityTier] {
        &self.tiers
    }
}
