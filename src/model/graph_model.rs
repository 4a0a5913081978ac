//! The graph model orchestrator.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::io::{normalize_inputs, normalize_outputs, ModelInput, OutputNames, Prediction};
use crate::artifacts::{GraphDef, ModelArtifactBundle, SignatureDef, UNKNOWN_VERSION};
use crate::cache::{ArtifactCache, ArtifactSource, CacheArtifactLoader};
use crate::config::{LoadOptions, PredictConfig};
use crate::executor::{GraphEngine, GraphExecutor, ResourceManager, TensorInfo};
use crate::weights::{BlobWeightDecoder, NamedTensorMap, WeightDecoder, WeightStore};

/// Executors and metadata built from a bundle, not yet committed to the model
struct Prepared<X> {
    executor: X,
    initializer: Option<X>,
    version: String,
    signature: Option<SignatureDef>,
    metadata: Option<Map<String, Value>>,
}

/// A computation-graph model loaded from an artifact cache.
///
/// The model owns one primary executor, an optional initializer executor and
/// the resource manager both executors share. Executors exist only after a
/// successful load.
pub struct GraphModel<E: GraphEngine, D: WeightDecoder = BlobWeightDecoder> {
    engine: E,
    decoder: D,
    topology_key: String,
    weights_key: String,
    options: LoadOptions,
    executor: Option<E::Executor>,
    initializer: Option<E::Executor>,
    resource_manager: Arc<ResourceManager>,
    version: String,
    signature: Option<SignatureDef>,
    metadata: Option<Map<String, Value>>,
}

impl<E: GraphEngine> GraphModel<E> {
    /// Create an unloaded model using the blob weight decoder
    pub fn new(
        engine: E,
        topology_key: impl Into<String>,
        weights_key: impl Into<String>,
        options: LoadOptions,
    ) -> Self {
        let decoder = BlobWeightDecoder::from_options(&options);
        Self::with_decoder(engine, decoder, topology_key, weights_key, options)
    }
}

impl<E: GraphEngine, D: WeightDecoder> GraphModel<E, D> {
    /// Create an unloaded model with a custom weight decoder
    pub fn with_decoder(
        engine: E,
        decoder: D,
        topology_key: impl Into<String>,
        weights_key: impl Into<String>,
        options: LoadOptions,
    ) -> Self {
        Self {
            engine,
            decoder,
            topology_key: topology_key.into(),
            weights_key: weights_key.into(),
            options,
            executor: None,
            initializer: None,
            resource_manager: Arc::new(ResourceManager::new()),
            version: UNKNOWN_VERSION.to_string(),
            signature: None,
            metadata: None,
        }
    }

    /// Load the model from an artifact cache using the configured keys
    pub async fn load<C: ArtifactCache>(&mut self, cache: &C) -> crate::Result<()> {
        let loader = CacheArtifactLoader::new(cache, &self.topology_key, &self.weights_key, &self.options);
        self.load_from(&loader).await
    }

    /// Load the model from any artifact source.
    ///
    /// Returns once the initializer graph, if any, has finished running.
    pub async fn load_from<S: ArtifactSource>(&mut self, source: &S) -> crate::Result<()> {
        self.ensure_unloaded()?;
        tracing::info!("Loading graph model from '{}'", source.name());

        let bundle = source.load().await?;
        let mut prepared = self.prepare(bundle)?;

        let initialized = match prepared.initializer.as_mut() {
            Some(initializer) => initializer.execute_async(&NamedTensorMap::new(), &[]).await.map(drop),
            None => Ok(()),
        };

        self.finish(prepared, initialized)
    }

    /// Load the model from an already retrieved bundle without suspending.
    ///
    /// The initializer graph, if any, runs through the blocking execution path.
    pub fn load_sync(&mut self, bundle: ModelArtifactBundle) -> crate::Result<()> {
        self.ensure_unloaded()?;

        let mut prepared = self.prepare(bundle)?;

        let initialized = match prepared.initializer.as_mut() {
            Some(initializer) => initializer.execute(&NamedTensorMap::new(), &[]).map(drop),
            None => Ok(()),
        };

        self.finish(prepared, initialized)
    }

    fn ensure_unloaded(&self) -> crate::Result<()> {
        if self.is_loaded() {
            return Err(crate::GraphModelError::Validation(format!(
                "model '{}' is already loaded",
                self.topology_key
            )));
        }
        Ok(())
    }

    /// Build the executors for a bundle and wire weights and resources into them
    fn prepare(&self, bundle: ModelArtifactBundle) -> crate::Result<Prepared<E::Executor>> {
        let signature = bundle.resolve_signature()?;
        let topology = bundle.topology()?;

        let graph = self.engine.build_graph(&topology, signature.as_ref())?;
        let version = topology.version_string();
        tracing::debug!("Built graph with {} nodes (version {})", topology.node_count(), version);

        let named = self.decoder.decode(&bundle.weight_specs, &bundle.weight_data)?;
        let weights = Arc::new(WeightStore::from_named(named));

        let mut executor = self.engine.create_executor(graph);
        executor.set_weight_map(Arc::clone(&weights));
        executor.set_resource_manager(Arc::clone(&self.resource_manager));

        let initializer = bundle
            .initializer()
            .and_then(|init| init.map(|init| self.build_initializer(&init, &weights)).transpose());
        let initializer = match initializer {
            Ok(initializer) => initializer,
            Err(e) => {
                executor.dispose();
                return Err(e);
            }
        };

        Ok(Prepared {
            executor,
            initializer,
            version,
            signature,
            metadata: bundle.user_defined_metadata,
        })
    }

    fn build_initializer(&self, init: &GraphDef, weights: &Arc<WeightStore>) -> crate::Result<E::Executor> {
        let graph = self.engine.build_graph(init, None)?;
        tracing::debug!("Built initializer graph with {} nodes", init.node_count());

        let mut initializer = self.engine.create_executor(graph);
        initializer.set_weight_map(Arc::clone(weights));
        initializer.set_resource_manager(Arc::clone(&self.resource_manager));
        Ok(initializer)
    }

    /// Commit prepared executors, or tear them down if initialization failed
    fn finish(&mut self, prepared: Prepared<E::Executor>, initialized: crate::Result<()>) -> crate::Result<()> {
        let Prepared {
            mut executor,
            initializer,
            version,
            signature,
            metadata,
        } = prepared;

        if let Err(e) = initialized {
            tracing::warn!("Initializer graph failed, discarding executors: {}", e);
            executor.dispose();
            if let Some(mut initializer) = initializer {
                initializer.dispose();
            }
            self.resource_manager.dispose();
            return Err(e);
        }

        tracing::info!(
            "Loaded graph model '{}' (version {}, {} inputs, {} outputs{})",
            self.topology_key,
            version,
            executor.input_nodes().len(),
            executor.output_nodes().len(),
            if initializer.is_some() { ", initialized" } else { "" }
        );

        self.executor = Some(executor);
        self.initializer = initializer;
        self.version = version;
        self.signature = signature;
        self.metadata = metadata;
        Ok(())
    }

    /// Run the primary graph on the calling thread.
    ///
    /// Without `outputs`, every declared output is computed. A single result
    /// tensor is returned unwrapped.
    pub fn execute(
        &mut self,
        inputs: impl Into<ModelInput>,
        outputs: Option<OutputNames>,
    ) -> crate::Result<Prediction> {
        let executor = self.executor.as_mut().ok_or(crate::GraphModelError::ModelNotLoaded)?;

        let inputs = normalize_inputs(inputs.into(), executor.input_nodes())?;
        let outputs = normalize_outputs(outputs, executor.output_nodes());

        let tensors = executor.execute(&inputs, &outputs)?;
        Ok(Prediction::from_tensors(tensors))
    }

    /// Suspending counterpart of `execute`
    pub async fn execute_async(
        &mut self,
        inputs: impl Into<ModelInput>,
        outputs: Option<OutputNames>,
    ) -> crate::Result<Prediction> {
        let executor = self.executor.as_mut().ok_or(crate::GraphModelError::ModelNotLoaded)?;

        let inputs = normalize_inputs(inputs.into(), executor.input_nodes())?;
        let outputs = normalize_outputs(outputs, executor.output_nodes());

        let tensors = executor.execute_async(&inputs, &outputs).await?;
        Ok(Prediction::from_tensors(tensors))
    }

    /// Compute every declared output. `config` is accepted and ignored.
    pub fn predict(
        &mut self,
        inputs: impl Into<ModelInput>,
        _config: Option<&PredictConfig>,
    ) -> crate::Result<Prediction> {
        self.execute(inputs, None)
    }

    /// Release the executors, then every entry in the resource manager.
    ///
    /// Afterwards the model behaves as never loaded.
    pub fn dispose(&mut self) {
        if let Some(mut executor) = self.executor.take() {
            executor.dispose();
        }
        if let Some(mut initializer) = self.initializer.take() {
            initializer.dispose();
        }
        let released = self.resource_manager.dispose();
        tracing::debug!("Disposed graph model '{}' ({} resources released)", self.topology_key, released);
    }

    pub fn is_loaded(&self) -> bool {
        self.executor.is_some()
    }

    /// Input node names (empty until loaded)
    pub fn input_nodes(&self) -> &[String] {
        self.executor.as_ref().map(|e| e.input_nodes()).unwrap_or(&[])
    }

    /// Output node names (empty until loaded)
    pub fn output_nodes(&self) -> &[String] {
        self.executor.as_ref().map(|e| e.output_nodes()).unwrap_or(&[])
    }

    pub fn inputs(&self) -> Vec<TensorInfo> {
        self.executor.as_ref().map(|e| e.inputs()).unwrap_or_default()
    }

    pub fn outputs(&self) -> Vec<TensorInfo> {
        self.executor.as_ref().map(|e| e.outputs()).unwrap_or_default()
    }

    /// Weights shared by the model's executors
    pub fn weights(&self) -> Option<&Arc<WeightStore>> {
        self.executor.as_ref().and_then(|e| e.weight_map())
    }

    /// `<producer>.<minConsumer>` of the loaded topology, `n/a` if unknown
    pub fn model_version(&self) -> &str {
        &self.version
    }

    pub fn signature(&self) -> Option<&SignatureDef> {
        self.signature.as_ref()
    }

    /// User-defined metadata from the model document
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    pub fn resource_manager(&self) -> &Arc<ResourceManager> {
        &self.resource_manager
    }

    pub fn executor(&self) -> Option<&E::Executor> {
        self.executor.as_ref()
    }

    pub fn initializer(&self) -> Option<&E::Executor> {
        self.initializer.as_ref()
    }

    pub fn topology_key(&self) -> &str {
        &self.topology_key
    }

    pub fn weights_key(&self) -> &str {
        &self.weights_key
    }
}

fn require_key<'a>(key: Option<&'a str>, what: &str) -> crate::Result<&'a str> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(crate::GraphModelError::Validation(format!(
            "a {} key is required to load a graph model",
            what
        ))),
    }
}

/// Construct a model and load it from `cache`.
///
/// Missing or blank keys fail before the cache is touched.
pub async fn load_graph_model<E: GraphEngine, C: ArtifactCache>(
    engine: E,
    cache: &C,
    topology_key: Option<&str>,
    weights_key: Option<&str>,
    options: Option<LoadOptions>,
) -> crate::Result<GraphModel<E>> {
    let topology_key = require_key(topology_key, "topology")?;
    let weights_key = require_key(weights_key, "weights")?;

    let mut model = GraphModel::new(engine, topology_key, weights_key, options.unwrap_or_default());
    model.load(cache).await?;
    Ok(model)
}
