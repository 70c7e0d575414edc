//! Editions Core - Generative Edition Engine
//!
//! # Guarantees
//! 1. Dna Is Unique Per Tier
//! 2. Dna Length Equals Layer Count
//! 3. Attributes Follow Layer Z-Order
//! 4. Editions Are Contiguous
//! 5. Same Seed, Same Collection

pub mod error;
pub mod rarity;
pub mod layers;
pub mod dna;
pub mod config;
pub mod validation;
pub mod hashing;
pub mod compositor;
pub mod storage;
pub mod metadata;
pub mod manifest;
pub mod pipeline;

pub use error::{GenerationError, Result};
pub use rarity::{RarityResolver, RarityTier, TierWeight};
pub use layers::{Attribute, Layer, LayerOption, LayerResolver, ResolvedElement, WeightedLayerSelector};
pub use dna::{combination_space, Dna, DnaBuilder, DnaGenerator, UniquenessRegistry};
pub use config::{Background, GenerationConfig};
pub use validation::{ConfigRule, ConfigViolation, ValidationReport, Validator, ViolationSeverity};
pub use hashing::{canonical_json, compute_manifest_hash, compute_run_hash, sha256_hex};
pub use compositor::{AssetLoader, DrawingBackend, EditionCompositor, FsAssetLoader, ImageHandle, RecordingBackend};
pub use storage::{ContentStore, LocalStore, MemoryStore, MirroredStore, RetryPolicy, StoredObject};
pub use metadata::{MetadataCollection, MetadataRecord, MetadataSynthesizer};
pub use manifest::{CollectionManifest, EditionRange, JsonManifestCompiler, ManifestCompiler, ManifestSummary};
pub use pipeline::{CancellationToken, EditionPipeline, EditionRecord, RunReport};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
