//! Layers - Trait Options, Weighted Selection and Dna Resolution
//!
//! A layer's position in the configured list is its z-index. Resolution from
//! dna to drawable elements is pure and never touches a drawing backend.

use std::collections::BTreeMap;

use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dna::Dna;
use crate::error::{GenerationError, Result};
use crate::rarity::{weighted_index, RarityTier};

/// One compositing slot, e.g. "background" or "eyes".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub name: String,
    /// Directory prefix for the option files of this layer.
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub position: [i32; 2],
    /// Draw size; `None` draws at canvas size.
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    pub options: Vec<LayerOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LayerOption {
    pub name: String,
    pub file: String,
    /// Tier -> selection weight. Absent or zero means unavailable in that tier.
    #[serde(default)]
    pub weights: BTreeMap<RarityTier, u32>,
}

impl LayerOption {
    pub fn weight_for(&self, tier: &RarityTier) -> u32 {
        self.weights.get(tier).copied().unwrap_or(0)
    }
}

impl Layer {
    /// Asset reference for an option, relative to the asset root.
    pub fn asset_reference(&self, option: &LayerOption) -> String {
        let location = self.location.trim_end_matches('/');
        if location.is_empty() {
            option.file.clone()
        } else {
            format!("{}/{}", location, option.file)
        }
    }

    /// `(option index, weight)` for every option with a positive weight in `tier`.
    pub fn eligible_options(&self, tier: &RarityTier) -> Vec<(usize, u32)> {
        self.options
            .iter()
            .enumerate()
            .map(|(idx, opt)| (idx, opt.weight_for(tier)))
            .filter(|&(_, weight)| weight > 0)
            .collect()
    }
}

/// Picks one option of a layer for a tier.
pub struct WeightedLayerSelector;

impl WeightedLayerSelector {
    pub fn select<R: Rng + ?Sized>(layer: &Layer, tier: &RarityTier, rng: &mut R) -> Result<usize> {
        let eligible = layer.eligible_options(tier);
        if eligible.is_empty() {
            return Err(GenerationError::NoAvailableOption {
                layer: layer.name.clone(),
                tier: tier.clone(),
            });
        }

        let weights: Vec<u32> = eligible.iter().map(|&(_, w)| w).collect();
        let distribution = weighted_index(&weights).map_err(|e| {
            GenerationError::Configuration(format!("layer '{}': {}", layer.name, e))
        })?;

        Ok(eligible[distribution.sample(rng)].0)
    }
}

/// A layer slot paired with its chosen option, ready for drawing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedElement {
    pub z_index: usize,
    pub layer: String,
    pub asset: String,
    pub name: String,
    pub position: [i32; 2],
    pub size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

/// Maps dna to concrete assets and attributes.
pub struct LayerResolver;

impl LayerResolver {
    /// Elements in layer z-order.
    pub fn resolve_elements(dna: &Dna, layers: &[Layer]) -> Result<Vec<ResolvedElement>> {
        Ok(Self::chosen(dna, layers)?
            .into_iter()
            .enumerate()
            .map(|(z_index, (layer, option))| ResolvedElement {
                z_index,
                layer: layer.name.clone(),
                asset: layer.asset_reference(option),
                name: option.name.clone(),
                position: layer.position,
                size: layer.size,
            })
            .collect())
    }

    /// `layer name -> option name` pairs in layer z-order.
    pub fn resolve_attributes(dna: &Dna, layers: &[Layer]) -> Result<Vec<Attribute>> {
        Ok(Self::chosen(dna, layers)?
            .into_iter()
            .map(|(layer, option)| Attribute {
                trait_type: layer.name.clone(),
                value: option.name.clone(),
            })
            .collect())
    }

    fn chosen<'a>(dna: &Dna, layers: &'a [Layer]) -> Result<Vec<(&'a Layer, &'a LayerOption)>> {
        if dna.len() != layers.len() {
            return Err(GenerationError::MalformedDna(format!(
                "expected {} genes, got {}",
                layers.len(),
                dna.len()
            )));
        }

        dna.genes()
            .iter()
            .zip(layers)
            .map(|(&gene, layer)| {
                layer
                    .options
                    .get(gene)
                    .map(|option| (layer, option))
                    .ok_or_else(|| {
                        GenerationError::MalformedDna(format!(
                            "gene {} out of range for layer '{}' ({} options)",
                            gene,
                            layer.name,
                            layer.options.len()
                        ))
                    })
            })
            .collect()
    }
}
