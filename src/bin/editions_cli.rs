//! Editions CLI - Generate a collection from a layer config
//!
//! Commands: validate, capacity, generate, preview
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on validation or generation failure

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use editions_core::{
    combination_space, EditionCompositor, EditionPipeline, FsAssetLoader, GenerationConfig,
    GenerationError, JsonManifestCompiler, LocalStore, MemoryStore, MirroredStore,
    RecordingBackend, Validator, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "editions-cli")]
#[command(about = "Editions CLI - Generative Edition Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the collection config (JSON)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory that layer locations are relative to
    #[arg(short, long, default_value = "layers")]
    layers_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config
    Validate,

    /// Show the combination space of every tier
    Capacity,

    /// Generate the whole collection
    Generate {
        /// Output directory for images, metadata and manifest
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Also keep a copy of every artifact here
        #[arg(long)]
        mirror: Option<PathBuf>,

        /// Override the config seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Generate a single edition in memory and print it
    Preview {
        /// Edition number used for the signature and filenames
        #[arg(short, long)]
        edition: u32,

        /// Override the config seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match GenerationConfig::load_from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            print_json(&serde_json::json!({
                "success": false,
                "error": format!("Failed to load config: {}", e),
            }));
            return ExitCode::FAILURE;
        }
    };

    info!("editions-core v{} - collection '{}'", ENGINE_VERSION, config.name);

    match cli.command {
        Commands::Validate => {
            let report = Validator::new().validate(&config);
            print_json(&report);
            if report.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)  // Validation failure
            }
        }

        Commands::Capacity => {
            let tiers: Vec<_> = config
                .rarity_weights
                .iter()
                .map(|t| serde_json::json!({
                    "tier": t.tier,
                    "weight": t.weight,
                    "combinations": combination_space(&config.layers, &t.tier).to_string(),
                }))
                .collect();
            print_json(&serde_json::json!({
                "requested": config.edition_count(),
                "tiers": tiers,
            }));
            ExitCode::SUCCESS
        }

        Commands::Generate { output, mirror, seed } => {
            match generate(config, &cli.layers_dir, &output, mirror.as_deref(), seed) {
                Ok(report) => {
                    print_json(&serde_json::json!({ "success": true, "report": report }));
                    ExitCode::SUCCESS
                }
                Err(e) => fail(e),
            }
        }

        Commands::Preview { edition, seed } => match preview(config, &cli.layers_dir, edition, seed) {
            Ok(output) => {
                print_json(&output);
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
    }
}

fn generate(
    mut config: GenerationConfig,
    layers_dir: &Path,
    output: &Path,
    mirror: Option<&Path>,
    seed: Option<u64>,
) -> Result<editions_core::RunReport, GenerationError> {
    if seed.is_some() {
        config.seed = seed;
    }
    let (width, height, signature) = (config.width, config.height, config.signature_position);
    let (name, description, retry) = (config.name.clone(), config.description.clone(), config.upload.clone());

    let local = LocalStore::new(output)?;
    let store: Box<dyn editions_core::ContentStore> = match mirror {
        Some(dir) => Box::new(MirroredStore::new(Box::new(local), Box::new(LocalStore::new(dir)?))),
        None => Box::new(local),
    };

    let mut pipeline = EditionPipeline::new(config)?;
    let loader = FsAssetLoader::new(layers_dir);
    let mut backend = RecordingBackend::new();
    let mut compositor = EditionCompositor::new(&loader, &mut backend, width, height, signature);
    let manifest = JsonManifestCompiler::new(store.as_ref(), retry, name, description);

    pipeline.run(&mut compositor, store.as_ref(), &manifest)
}

fn preview(
    mut config: GenerationConfig,
    layers_dir: &Path,
    edition: u32,
    seed: Option<u64>,
) -> Result<serde_json::Value, GenerationError> {
    if seed.is_some() {
        config.seed = seed;
    }
    let (width, height, signature) = (config.width, config.height, config.signature_position);

    let mut pipeline = EditionPipeline::new(config)?;
    let loader = FsAssetLoader::new(layers_dir);
    let mut backend = RecordingBackend::new();
    let mut compositor = EditionCompositor::new(&loader, &mut backend, width, height, signature);
    let store = MemoryStore::new();

    let record = pipeline.generate_edition(edition, &mut compositor, &store)?;
    let image = store.get(&format!("{}.png", edition)).unwrap_or_default();
    let metadata = pipeline.metadata().get(edition).cloned();

    Ok(serde_json::json!({
        "success": true,
        "seed": pipeline.seed(),
        "edition": record,
        "metadata": metadata,
        "data_base64": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &image),
    }))
}

fn fail(e: GenerationError) -> ExitCode {
    print_json(&serde_json::json!({
        "success": false,
        "error": e.to_string(),
    }));
    ExitCode::from(2)
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!(r#"{{"success": false, "error": "{}"}}"#, e),
    }
}
