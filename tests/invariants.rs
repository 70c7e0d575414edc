//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees of a generation run.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use editions_core::{
    compositor::{AssetLoader, ImageHandle},
    Background, Dna, EditionCompositor, EditionPipeline, EditionRecord, FsAssetLoader,
    GenerationConfig, GenerationError, JsonManifestCompiler, Layer, LayerOption, LayerResolver,
    LocalStore, MemoryStore, RarityTier, RecordingBackend, RetryPolicy, RunReport, TierWeight,
    WeightedLayerSelector,
};

struct EchoLoader;

impl AssetLoader for EchoLoader {
    fn load(&self, reference: &str) -> editions_core::Result<ImageHandle> {
        Ok(ImageHandle::new(reference, reference.as_bytes().to_vec()))
    }
}

fn option(name: &str, weights: &[(&str, u32)]) -> LayerOption {
    LayerOption {
        name: name.to_string(),
        file: format!("{}.png", name.to_lowercase()),
        weights: weights.iter().map(|&(t, w)| (RarityTier::from(t), w)).collect(),
    }
}

fn layer(name: &str, options: Vec<LayerOption>) -> Layer {
    Layer {
        name: name.to_string(),
        location: name.to_string(),
        position: [0, 0],
        size: None,
        options,
    }
}

fn create_test_config(start: u32, end: u32) -> GenerationConfig {
    let all = [("common", 10), ("rare", 5), ("legendary", 1)];
    GenerationConfig {
        name: "Rekt City".to_string(),
        description: "Meet the survivors".to_string(),
        width: 64,
        height: 64,
        start_edition: start,
        end_edition: end,
        rarity_weights: vec![
            TierWeight::new("common", 70),
            TierWeight::new("rare", 25),
            TierWeight::new("legendary", 5),
        ],
        layers: vec![
            layer("background", vec![
                option("Sky", &all), option("Sand", &all), option("Void", &[("legendary", 1)]),
                option("Dusk", &all), option("Dawn", &all),
            ]),
            layer("body", vec![
                option("Lean", &all), option("Bulky", &all), option("Ghost", &[("rare", 2), ("legendary", 3)]),
                option("Tall", &all), option("Short", &all),
            ]),
            layer("eyes", vec![
                option("Red", &all), option("Blue", &all), option("Laser", &[("legendary", 1)]),
                option("Green", &all), option("Gray", &all),
            ]),
        ],
        background: Background::Random,
        signature_position: [40, 40],
        max_dna_attempts: 1_000,
        seed: Some(42),
        engine_min_version: Some("1.0.0".to_string()),
        upload: RetryPolicy::none(),
    }
}

fn run_in_memory(config: GenerationConfig) -> (editions_core::Result<RunReport>, MemoryStore) {
    let store = MemoryStore::new();
    let result = {
        let mut pipeline = EditionPipeline::new(config.clone()).unwrap();
        let mut backend = RecordingBackend::new();
        let mut compositor =
            EditionCompositor::new(&EchoLoader, &mut backend, config.width, config.height, config.signature_position);
        let manifest = JsonManifestCompiler::new(&store, RetryPolicy::none(), &config.name, &config.description);
        pipeline.run(&mut compositor, &store, &manifest)
    };
    (result, store)
}

fn by_tier(editions: &[EditionRecord]) -> HashMap<RarityTier, Vec<Dna>> {
    let mut grouped: HashMap<RarityTier, Vec<Dna>> = HashMap::new();
    for record in editions {
        grouped.entry(record.tier.clone()).or_default().push(record.dna.clone());
    }
    grouped
}

#[test]
fn invariant_dna_unique_per_tier() {
    let (result, _) = run_in_memory(create_test_config(1, 12));
    let report = result.unwrap();

    for (tier, dnas) in by_tier(&report.editions) {
        let unique: HashSet<_> = dnas.iter().collect();
        assert_eq!(unique.len(), dnas.len(), "duplicate dna in tier {}", tier);
    }
}

#[test]
fn invariant_dna_length_and_attribute_order() {
    let config = create_test_config(1, 10);
    let (result, _) = run_in_memory(config.clone());
    let layer_names: Vec<_> = config.layers.iter().map(|l| l.name.as_str()).collect();

    for record in result.unwrap().editions {
        assert_eq!(record.dna.len(), config.layers.len());
        let traits: Vec<_> = record.attributes.iter().map(|a| a.trait_type.as_str()).collect();
        assert_eq!(traits, layer_names);
    }
}

#[test]
fn invariant_editions_contiguous_with_metadata() {
    let (result, store) = run_in_memory(create_test_config(5, 8));
    let report = result.unwrap();

    let editions: Vec<_> = report.editions.iter().map(|r| r.edition).collect();
    assert_eq!(editions, vec![5, 6, 7, 8]);

    for edition in 5..=8 {
        let bytes = store.get(&format!("{}.json", edition)).expect("metadata uploaded");
        let metadata: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(metadata["edition"], edition);
        assert_eq!(metadata["name"], format!("#{}", edition));
        assert!(store.get(&format!("{}.png", edition)).is_some());
    }

    assert_eq!(report.manifest.count, 4);
    assert_eq!(report.manifest.range.last, 8);
}

#[test]
fn invariant_same_seed_same_collection() {
    let (a, _) = run_in_memory(create_test_config(1, 8));
    let (b, _) = run_in_memory(create_test_config(1, 8));
    let (a, b) = (a.unwrap(), b.unwrap());

    let summary = |r: &RunReport| -> Vec<(u32, RarityTier, Dna, String)> {
        r.editions
            .iter()
            .map(|e| (e.edition, e.tier.clone(), e.dna.clone(), e.image.hash.clone()))
            .collect()
    };
    assert_eq!(summary(&a), summary(&b));
    assert_eq!(a.run_hash, b.run_hash);
}

#[test]
fn invariant_selector_deterministic_for_seed() {
    let config = create_test_config(1, 1);
    let tier = RarityTier::from("legendary");
    let draw = |seed: u64| -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..100)
            .map(|_| WeightedLayerSelector::select(&config.layers[1], &tier, &mut rng).unwrap())
            .collect()
    };
    assert_eq!(draw(9), draw(9));
}

#[test]
fn invariant_exhaustion_after_combination_space() {
    // One tier, 2 x 2 = 4 combinations, 5 editions requested.
    let mut config = create_test_config(1, 5);
    config.rarity_weights = vec![TierWeight::new("common", 1)];
    config.layers = vec![
        layer("background", vec![option("Sky", &[("common", 1)]), option("Sand", &[("common", 1)])]),
        layer("eyes", vec![option("Red", &[("common", 1)]), option("Blue", &[("common", 1)])]),
    ];

    let (result, store) = run_in_memory(config);
    let err = result.unwrap_err();

    match &err {
        GenerationError::EditionFailed { edition, tier, .. } => {
            assert_eq!(*edition, 5);
            assert_eq!(tier.as_str(), "common");
        }
        other => panic!("unexpected error: {}", other),
    }
    match err.root() {
        GenerationError::CombinationSpaceExhausted { tier, issued, .. } => {
            assert_eq!(tier.as_str(), "common");
            assert_eq!(*issued, 4);
        }
        other => panic!("unexpected root: {}", other),
    }
    for edition in 1..=4 {
        assert!(store.get(&format!("{}.png", edition)).is_some());
    }
}

#[test]
fn invariant_skewed_weights_fill_combination_space() {
    // 1000:1 weights leave the rare corner (Shiny, Shiny) at ~1e-6 per random draw.
    let skewed = || vec![option("Plain", &[("common", 1_000)]), option("Shiny", &[("common", 1)])];
    let mut config = create_test_config(1, 4);
    config.rarity_weights = vec![TierWeight::new("common", 1)];
    config.layers = vec![layer("background", skewed()), layer("eyes", skewed())];
    config.max_dna_attempts = 20;

    let (result, _) = run_in_memory(config);
    let report = result.unwrap();

    let unique: HashSet<_> = report.editions.iter().map(|r| r.dna.clone()).collect();
    assert_eq!(unique.len(), 4);
    assert!(unique.contains(&Dna::new(vec![1, 1])));
}

#[test]
fn invariant_resolution_idempotent() {
    let config = create_test_config(1, 1);
    let dna = Dna::new(vec![1, 2, 0]);

    let first = LayerResolver::resolve_elements(&dna, &config.layers).unwrap();
    let second = LayerResolver::resolve_elements(&dna, &config.layers).unwrap();
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());

    let attrs_a = LayerResolver::resolve_attributes(&dna, &config.layers).unwrap();
    let attrs_b = LayerResolver::resolve_attributes(&dna, &config.layers).unwrap();
    assert_eq!(attrs_a, attrs_b);
    assert_eq!(attrs_a[1].value, "Ghost");
}

#[test]
fn invariant_local_run_writes_artifacts() {
    let assets = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = create_test_config(1, 3);
    for layer in &config.layers {
        std::fs::create_dir_all(assets.path().join(&layer.location)).unwrap();
        for opt in &layer.options {
            std::fs::write(assets.path().join(layer.asset_reference(opt)), opt.name.as_bytes()).unwrap();
        }
    }

    let store = LocalStore::new(output.path()).unwrap();
    let loader = FsAssetLoader::new(assets.path());
    let mut backend = RecordingBackend::new();
    let mut compositor = EditionCompositor::new(&loader, &mut backend, 64, 64, [40, 40]);
    let manifest = JsonManifestCompiler::new(&store, RetryPolicy::none(), "Rekt City", "");
    let mut pipeline = EditionPipeline::new(config).unwrap();

    let report = pipeline.run(&mut compositor, &store, &manifest).unwrap();
    assert_eq!(report.editions.len(), 3);
    for name in ["1.png", "1.json", "2.png", "3.json", "_metadata.json"] {
        assert!(output.path().join(name).exists(), "missing {}", name);
    }
    assert_eq!(pipeline.registry().total(), 3);
}
