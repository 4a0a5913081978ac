//! # rs-graphmodel
//!
//! Loads a serialized computation-graph model (a JSON topology document plus a
//! flat weight blob) from a local key/value cache and orchestrates its
//! execution.
//!
//! ## Core Concept
//!
//! - **Artifact acquisition**: two cache reads (topology document, weight blob)
//!   are reassembled into a [`ModelArtifactBundle`]
//! - **Weight decoding**: the manifest slices the blob into named tensors, which
//!   become a shared [`WeightStore`]
//! - **Orchestration**: [`GraphModel`] owns the primary executor, an optional
//!   initializer executor and the [`ResourceManager`] both of them share
//!
//! Graph building and graph execution are supplied by the caller through the
//! [`GraphEngine`] and [`GraphExecutor`] traits.
//!
//! ## Example
//!
//! ```ignore
//! use rs_graphmodel::{load_graph_model, MemoryCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = MemoryCache::new();
//!     // ... populate the cache ...
//!     let mut model = load_graph_model(
//!         MyEngine::default(),
//!         &cache,
//!         Some("model/model.json"),
//!         Some("model/weights.bin"),
//!         None,
//!     )
//!     .await?;
//!     let output = model.predict(input_tensor, None)?;
//!     model.dispose();
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod cache;
pub mod config;
pub mod executor;
pub mod model;
pub mod utils;
pub mod weights;

// Re-exports for convenience
pub use artifacts::{
    DataType, GraphDef, ModelArtifactBundle, ModelJson, NodeDef, SignatureDef, WeightSpec,
};
pub use cache::{ArtifactCache, ArtifactSource, CacheArtifactLoader, FsCache, MemoryCache};
pub use config::{LoadOptions, PredictConfig};
pub use executor::{GraphEngine, GraphExecutor, Resource, ResourceId, ResourceManager, TensorInfo};
pub use model::{load_graph_model, GraphModel, ModelInput, OutputNames, Prediction};
pub use weights::{BlobWeightDecoder, NamedTensorMap, WeightDecoder, WeightStore};

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum GraphModelError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found in artifact cache: {0}")]
    NotFound(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Model has not been loaded")]
    ModelNotLoaded,

    #[error("Unsupported weight dtype: {0}")]
    UnsupportedDtype(String),

    #[error("Graph engine error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Candle error: {0}")]
    CandleError(#[from] candle_core::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GraphModelError {
    /// Wrap an error raised by an external graph builder or executor.
    pub fn engine(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        GraphModelError::Engine(err.into())
    }
}

pub type Result<T> = std::result::Result<T, GraphModelError>;
