//! Dna - Trait Combinations and Per-Tier Uniqueness
//!
//! A dna holds one option index per layer, in layer z-order. Uniqueness is
//! scoped to a tier: the same dna may be issued once under each tier.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};
use crate::layers::{Layer, WeightedLayerSelector};
use crate::rarity::RarityTier;

pub const DEFAULT_MAX_DNA_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dna(Vec<usize>);

impl Dna {
    pub fn new(genes: Vec<usize>) -> Self {
        Self(genes)
    }

    pub fn genes(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Dna {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, gene) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{}", gene)?;
        }
        Ok(())
    }
}

/// Composes a candidate dna, one weighted pick per layer.
pub struct DnaBuilder;

impl DnaBuilder {
    pub fn build<R: Rng + ?Sized>(layers: &[Layer], tier: &RarityTier, rng: &mut R) -> Result<Dna> {
        layers
            .iter()
            .map(|layer| WeightedLayerSelector::select(layer, tier, rng))
            .collect::<Result<Vec<_>>>()
            .map(Dna::new)
    }
}

/// Number of distinct dna reachable for `tier`. Saturates instead of overflowing.
pub fn combination_space(layers: &[Layer], tier: &RarityTier) -> u128 {
    layers.iter().fold(1u128, |acc, layer| {
        acc.saturating_mul(layer.eligible_options(tier).len() as u128)
    })
}

/// Dna issued so far in a run, per tier. Grows monotonically.
#[derive(Debug, Default)]
pub struct UniquenessRegistry {
    issued: HashMap<RarityTier, HashSet<Dna>>,
}

impl UniquenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tier: &RarityTier, dna: &Dna) -> bool {
        self.issued.get(tier).map_or(false, |set| set.contains(dna))
    }

    pub fn register(&mut self, tier: &RarityTier, dna: Dna) -> Result<()> {
        let set = self.issued.entry(tier.clone()).or_default();
        if set.contains(&dna) {
            return Err(GenerationError::DuplicateDna {
                tier: tier.clone(),
                dna: dna.to_string(),
            });
        }
        set.insert(dna);
        Ok(())
    }

    pub fn issued_count(&self, tier: &RarityTier) -> usize {
        self.issued.get(tier).map_or(0, HashSet::len)
    }

    pub fn issued(&self, tier: &RarityTier) -> impl Iterator<Item = &Dna> {
        self.issued.get(tier).into_iter().flatten()
    }

    pub fn total(&self) -> usize {
        self.issued.values().map(HashSet::len).sum()
    }
}

/// Produces dna never issued before for the tier, with a bounded retry budget.
#[derive(Debug, Clone, Copy)]
pub struct DnaGenerator {
    max_attempts: u32,
}

impl DnaGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Random draws first; once those keep colliding, a direct draw among the
    /// unissued dna. Fails only when every reachable dna of the tier is issued.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        tier: &RarityTier,
        layers: &[Layer],
        registry: &mut UniquenessRegistry,
        rng: &mut R,
    ) -> Result<Dna> {
        let issued = registry.issued_count(tier);
        let space = combination_space(layers, tier);
        if space > 0 && issued as u128 >= space {
            return Err(GenerationError::CombinationSpaceExhausted {
                tier: tier.clone(),
                requested: issued + 1,
                issued,
            });
        }

        for attempt in 1..=self.max_attempts {
            let candidate = DnaBuilder::build(layers, tier, rng)?;
            if registry.contains(tier, &candidate) {
                debug!(
                    "found duplicate DNA {} ({}), recalculate... attempt {}/{}",
                    candidate, tier, attempt, self.max_attempts
                );
                continue;
            }
            registry.register(tier, candidate.clone())?;
            return Ok(candidate);
        }

        match draw_unissued(layers, tier, registry, rng)? {
            Some(dna) => {
                info!(
                    "no new DNA for {} after {} random attempts, drew {} from the {} unissued",
                    tier,
                    self.max_attempts,
                    dna,
                    space - issued as u128
                );
                registry.register(tier, dna.clone())?;
                Ok(dna)
            }
            None => Err(GenerationError::CombinationSpaceExhausted {
                tier: tier.clone(),
                requested: issued + 1,
                issued,
            }),
        }
    }
}

/// An issued dna inside the reachable space, with the in-layer probability of each gene.
struct IssuedPath<'a> {
    genes: &'a [usize],
    probabilities: Vec<f64>,
}

/// Weighted draw restricted to the unissued dna of `tier`. Layers are picked in
/// order; each option weighs its probability times the unissued share of the
/// combinations below it. `None` when nothing is left.
fn draw_unissued<R: Rng + ?Sized>(
    layers: &[Layer],
    tier: &RarityTier,
    registry: &UniquenessRegistry,
    rng: &mut R,
) -> Result<Option<Dna>> {
    let eligible = layers
        .iter()
        .map(|layer| {
            let options = layer.eligible_options(tier);
            if options.is_empty() {
                return Err(GenerationError::NoAvailableOption {
                    layer: layer.name.clone(),
                    tier: tier.clone(),
                });
            }
            let total: f64 = options.iter().map(|&(_, w)| f64::from(w)).sum();
            Ok(options
                .into_iter()
                .map(|(idx, w)| (idx, f64::from(w) / total))
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>>>()?;

    // suffix_count[i]: combinations of layers i.. (saturating)
    let mut suffix_count = vec![1u128; layers.len() + 1];
    for i in (0..layers.len()).rev() {
        suffix_count[i] = suffix_count[i + 1].saturating_mul(eligible[i].len() as u128);
    }

    let mut remaining: Vec<IssuedPath> = registry
        .issued(tier)
        .filter(|dna| dna.len() == layers.len())
        .filter_map(|dna| {
            let probabilities = dna
                .genes()
                .iter()
                .zip(&eligible)
                .map(|(&gene, options)| {
                    options.iter().find(|&&(idx, _)| idx == gene).map(|&(_, p)| p)
                })
                .collect::<Option<Vec<_>>>()?;
            Some(IssuedPath {
                genes: dna.genes(),
                probabilities,
            })
        })
        .collect();

    let mut genes = Vec::with_capacity(layers.len());
    for (i, options) in eligible.iter().enumerate() {
        let weights: Vec<f64> = options
            .iter()
            .map(|&(idx, p)| {
                let below: Vec<&IssuedPath> = remaining.iter().filter(|path| path.genes[i] == idx).collect();
                if suffix_count[i + 1] <= below.len() as u128 {
                    return 0.0;
                }
                let taken: f64 = below
                    .iter()
                    .map(|path| path.probabilities[i + 1..].iter().product::<f64>())
                    .sum();
                // Floor keeps a branch with free dna drawable despite rounding.
                (p * (1.0 - taken)).max(f64::MIN_POSITIVE)
            })
            .collect();

        if weights.iter().all(|&w| w == 0.0) {
            return Ok(None);
        }
        let distribution = WeightedIndex::new(&weights)
            .map_err(|e| GenerationError::Configuration(format!("layer '{}': {}", layers[i].name, e)))?;
        let gene = options[distribution.sample(rng)].0;
        genes.push(gene);
        remaining.retain(|path| path.genes[i] == gene);
    }

    Ok(Some(Dna::new(genes)))
}

impl Default for DnaGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DNA_ATTEMPTS)
    }
}
