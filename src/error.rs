//! Error Taxonomy
//!
//! Every abort carries enough context to name the offending tier, layer or
//! edition. Nothing is swallowed.

use thiserror::Error;

use crate::rarity::RarityTier;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Layer '{layer}' has no option available for tier '{tier}'")]
    NoAvailableOption { layer: String, tier: RarityTier },

    #[error("Malformed dna: {0}")]
    MalformedDna(String),

    #[error("Dna {dna} already issued for tier '{tier}'")]
    DuplicateDna { tier: RarityTier, dna: String },

    #[error("Combination space exhausted for tier '{tier}': request {requested} exceeds the {issued} reachable dna already issued")]
    CombinationSpaceExhausted {
        tier: RarityTier,
        requested: usize,
        issued: usize,
    },

    #[error("Failed to load asset '{asset}': {reason}")]
    AssetLoad { asset: String, reason: String },

    #[error("Upload of '{filename}' failed: {reason}")]
    Upload { filename: String, reason: String },

    #[error("Run cancelled before edition {edition}")]
    Cancelled { edition: u32 },

    #[error("Edition {edition} (tier '{tier}') failed: {source}")]
    EditionFailed {
        edition: u32,
        tier: RarityTier,
        #[source]
        source: Box<GenerationError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// Attach edition context to a failure raised inside one edition.
    pub fn in_edition(self, edition: u32, tier: &RarityTier) -> Self {
        match self {
            already @ GenerationError::EditionFailed { .. } => already,
            other => GenerationError::EditionFailed {
                edition,
                tier: tier.clone(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying failure, looking through edition context.
    pub fn root(&self) -> &GenerationError {
        match self {
            GenerationError::EditionFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
