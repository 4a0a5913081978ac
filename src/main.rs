//! graphmodel CLI - inspect cached graph models
//!
//! Reads a model document and its weight blob from a directory-backed
//! artifact cache and reports what a loader would see.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use rs_graphmodel::{
    utils::{device_label, format_bytes, format_shape, get_device},
    ArtifactSource, BlobWeightDecoder, CacheArtifactLoader, FsCache, LoadOptions,
    ModelArtifactBundle, SignatureDef,
};

#[derive(Parser)]
#[command(name = "graphmodel")]
#[command(author, version, about = "Inspect cached computation-graph models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Root directory of the artifact cache
    #[arg(long, env = "GRAPHMODEL_CACHE_DIR")]
    cache_dir: PathBuf,

    /// Cache key of the model document
    #[arg(long, default_value = "model.json")]
    topology: String,

    /// Cache key of the weight blob
    #[arg(long, default_value = "weights.bin")]
    weights: String,

    /// Prefix prepended to both keys
    #[arg(long)]
    key_prefix: Option<String>,

    /// JSON file with load options (command-line flags take precedence)
    #[arg(long)]
    options: Option<PathBuf>,
}

impl SourceArgs {
    fn load_options(&self) -> anyhow::Result<LoadOptions> {
        let mut options = match self.options {
            Some(ref path) => LoadOptions::from_file(path)?,
            None => LoadOptions::default(),
        };
        if let Some(ref prefix) = self.key_prefix {
            options = options.with_key_prefix(prefix.clone());
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the topology, signature and weight manifest of a model
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Decode every weight and list it
    Weights {
        #[command(flatten)]
        source: SourceArgs,

        /// Fail if the weight blob is longer than the manifest describes
        #[arg(long)]
        strict: bool,

        /// GPU device ID (CPU if not specified or unavailable)
        #[arg(long)]
        device: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rs_graphmodel=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { source } => {
            let options = source.load_options()?;
            let bundle = read_bundle(&source, &options).await?;
            show_info(&bundle)?;
        }

        Commands::Weights {
            source,
            strict,
            device,
        } => {
            let mut options = source.load_options()?;
            if strict {
                options = options.with_strict(true);
            }
            if let Some(id) = device {
                options = options.with_device_id(id);
            }
            let bundle = read_bundle(&source, &options).await?;
            list_weights(&bundle, &options)?;
        }
    }

    Ok(())
}

async fn read_bundle(source: &SourceArgs, options: &LoadOptions) -> anyhow::Result<ModelArtifactBundle> {
    let cache = FsCache::new(&source.cache_dir);
    let loader = CacheArtifactLoader::new(&cache, &source.topology, &source.weights, options);

    println!("Reading model: {}", loader.topology_key());
    let bundle = loader.load().await?;
    Ok(bundle)
}

fn print_signature(signature: &SignatureDef) {
    println!("\nSignature");
    println!("=========");
    for (key, tensor) in &signature.inputs {
        let shape = tensor
            .tensor_shape
            .as_ref()
            .and_then(|s| s.dims())
            .map_or_else(|| "?".to_string(), |dims| format_shape(&dims));
        println!(
            "  in  {} -> {} {} {}",
            key,
            tensor.node_name().unwrap_or(key),
            tensor.dtype.as_deref().unwrap_or("?"),
            shape
        );
    }
    for (key, tensor) in &signature.outputs {
        println!(
            "  out {} -> {} {}",
            key,
            tensor.node_name().unwrap_or(key),
            tensor.dtype.as_deref().unwrap_or("?")
        );
    }
}

fn show_info(bundle: &ModelArtifactBundle) -> anyhow::Result<()> {
    let topology = bundle.topology()?;

    println!("Model Information");
    println!("=================");
    println!("Format: {}", bundle.format.as_deref().unwrap_or("unknown"));
    println!("Generated by: {}", bundle.generated_by.as_deref().unwrap_or("unknown"));
    println!("Converted by: {}", bundle.converted_by.as_deref().unwrap_or("unknown"));
    println!("Version: {}", topology.version_string());
    println!("Nodes: {}", topology.node_count());

    let placeholders: Vec<&str> = topology
        .nodes_with_op("Placeholder")
        .map(|n| n.name.as_str())
        .collect();
    println!("Placeholders: {}", placeholders.join(", "));

    match bundle.initializer()? {
        Some(init) => println!("Initializer nodes: {}", init.node_count()),
        None => println!("Initializer: none"),
    }

    if let Some(signature) = bundle.resolve_signature()? {
        print_signature(&signature);
    }

    println!("\nWeights");
    println!("=======");
    println!("Entries: {}", bundle.weight_specs.len());
    match bundle.weight_bytes_required() {
        Some(required) => println!("Manifest size: {}", format_bytes(required as u64)),
        None => println!("Manifest size: unknown (variable-length weights)"),
    }
    println!("Blob size: {}", format_bytes(bundle.weight_data.len() as u64));

    Ok(())
}

fn list_weights(bundle: &ModelArtifactBundle, options: &LoadOptions) -> anyhow::Result<()> {
    let required = bundle.weight_bytes_required();
    let trailing = required.map_or(0, |required| bundle.weight_data.len().saturating_sub(required));
    if trailing > 0 {
        if options.strict {
            anyhow::bail!("weight blob has {} bytes beyond the manifest", trailing);
        }
        tracing::warn!("Ignoring {} trailing bytes in weight blob", trailing);
    }

    let decoder = BlobWeightDecoder::from_options(options);
    let device = get_device(options.device_id)?;
    println!("Using device: {}", device_label(&device));

    let pb = ProgressBar::new(bundle.weight_specs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
    );

    let mut rows = Vec::with_capacity(bundle.weight_specs.len());
    for spec in &bundle.weight_specs {
        pb.set_message(spec.name.clone());

        let bytes = BlobWeightDecoder::weight_bytes(spec, &bundle.weight_data)?;
        let tensor = decoder.decode_weight(spec, bytes)?.to_device(&device)?;
        rows.push((spec.name.clone(), spec.dtype, tensor.dtype(), format_shape(tensor.dims())));

        pb.inc(1);
    }
    pb.finish_and_clear();

    for (name, dtype, stored, shape) in &rows {
        println!("{:<48} {:<9} {:<5} {}", name, dtype.as_str(), stored.as_str(), shape);
    }
    match required {
        Some(required) => println!("\n{} weights, {}", rows.len(), format_bytes(required as u64)),
        None => println!("\n{} weights", rows.len()),
    }

    Ok(())
}
