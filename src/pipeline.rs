//! Edition Pipeline - Single Entry Point for a Generation Run
//!
//! Editions are produced strictly in order. The uniqueness registry and the
//! metadata collection belong to one pipeline instance and are never shared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::compositor::{random_pastel, EditionCompositor};
use crate::config::{Background, GenerationConfig};
use crate::dna::{Dna, DnaGenerator, UniquenessRegistry};
use crate::error::{GenerationError, Result};
use crate::hashing::compute_run_hash;
use crate::layers::{Attribute, LayerResolver};
use crate::manifest::{EditionRange, ManifestCompiler, ManifestSummary};
use crate::metadata::{MetadataCollection, MetadataSynthesizer};
use crate::rarity::{RarityResolver, RarityTier};
use crate::storage::{ContentStore, StoredObject};
use crate::validation::Validator;
use crate::ENGINE_VERSION;

/// Cooperative stop flag, checked between editions.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditionRecord {
    pub edition: u32,
    pub tier: RarityTier,
    pub dna: Dna,
    pub attributes: Vec<Attribute>,
    pub image: StoredObject,
    pub metadata: StoredObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub seed: Option<u64>,
    pub run_hash: Option<String>,
    pub editions: Vec<EditionRecord>,
    pub manifest: ManifestSummary,
}

pub struct EditionPipeline<R = StdRng> {
    config: GenerationConfig,
    resolver: RarityResolver,
    generator: DnaGenerator,
    synthesizer: MetadataSynthesizer,
    registry: UniquenessRegistry,
    metadata: MetadataCollection,
    rng: R,
    seed: Option<u64>,
    cancel: CancellationToken,
}

impl EditionPipeline<StdRng> {
    /// Seeded from `config.seed`, or from entropy when unset.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut pipeline = Self::with_rng(config, StdRng::seed_from_u64(seed))?;
        pipeline.seed = Some(seed);
        Ok(pipeline)
    }
}

impl<R: Rng> EditionPipeline<R> {
    /// Validates the config; any error-level violation aborts here.
    pub fn with_rng(config: GenerationConfig, rng: R) -> Result<Self> {
        Validator::new().validate(&config).into_result()?;
        let resolver = RarityResolver::new(&config.rarity_weights)?;

        Ok(Self {
            generator: DnaGenerator::new(config.max_dna_attempts),
            synthesizer: MetadataSynthesizer::new(config.description.clone()),
            resolver,
            config,
            registry: UniquenessRegistry::new(),
            metadata: MetadataCollection::new(),
            rng,
            seed: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn registry(&self) -> &UniquenessRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataCollection {
        &self.metadata
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every edition in `startEdition..=endEdition`, then compile the manifest.
    /// The first failing edition stops the run.
    pub fn run(
        &mut self,
        compositor: &mut EditionCompositor<'_>,
        store: &dyn ContentStore,
        manifest: &dyn ManifestCompiler,
    ) -> Result<RunReport> {
        let (start, end) = (self.config.start_edition, self.config.end_edition);
        let mut editions = Vec::with_capacity(self.config.edition_count() as usize);

        for edition in start..=end {
            if self.cancel.is_cancelled() {
                return Err(GenerationError::Cancelled { edition });
            }
            editions.push(self.generate_edition(edition, compositor, store)?);
        }

        let last = editions.last().map_or(start, |record| record.edition);
        let summary = manifest.compile(&self.metadata.records(), EditionRange { first: start, last })?;

        Ok(RunReport {
            seed: self.seed,
            run_hash: self.run_hash()?,
            editions,
            manifest: summary,
        })
    }

    /// Generate, composite and store a single edition.
    pub fn generate_edition(
        &mut self,
        edition: u32,
        compositor: &mut EditionCompositor<'_>,
        store: &dyn ContentStore,
    ) -> Result<EditionRecord> {
        let tier = self.resolver.resolve(&mut self.rng).clone();
        info!(
            "Mutating {} of {} - rarity: {}",
            edition, self.config.end_edition, tier
        );

        self.build_edition(edition, &tier, compositor, store)
            .map_err(|e| e.in_edition(edition, &tier))
    }

    fn build_edition(
        &mut self,
        edition: u32,
        tier: &RarityTier,
        compositor: &mut EditionCompositor<'_>,
        store: &dyn ContentStore,
    ) -> Result<EditionRecord> {
        let layers = &self.config.layers;
        let dna = self
            .generator
            .generate(tier, layers, &mut self.registry, &mut self.rng)?;
        info!("- dna: {}", dna);

        let elements = LayerResolver::resolve_elements(&dna, layers)?;
        let attributes = LayerResolver::resolve_attributes(&dna, layers)?;

        let background = match &self.config.background {
            Background::Random => Some(random_pastel(&mut self.rng)),
            Background::Solid(color) => Some(color.clone()),
            Background::None => None,
        };
        let image_bytes = compositor.compose(edition, &elements, background.as_deref())?;
        let image = self
            .config
            .upload
            .upload(store, &image_bytes, &format!("{}.png", edition))?;

        let record = self
            .synthesizer
            .synthesize(edition, tier, &dna, attributes.clone(), &image);
        let metadata_bytes = serde_json::to_vec_pretty(&record)?;
        let metadata = self
            .config
            .upload
            .upload(store, &metadata_bytes, &format!("{}.json", edition))?;
        self.metadata.upsert(record);

        info!("edition {} stored at {} ({})", edition, image.path, image.hash);
        Ok(EditionRecord {
            edition,
            tier: tier.clone(),
            dna,
            attributes,
            image,
            metadata,
        })
    }

    fn run_hash(&self) -> Result<Option<String>> {
        match self.seed {
            Some(seed) => Ok(Some(compute_run_hash(&self.config, seed, ENGINE_VERSION)?)),
            None => Ok(None),
        }
    }
}
