//! Graph building and execution boundary.
//!
//! The model orchestrator never interprets graph operations itself. A
//! `GraphEngine` turns a topology into an executable graph and wraps it in a
//! `GraphExecutor`; the orchestrator wires weights and the shared
//! `ResourceManager` into each executor it creates.

mod resource_manager;
#[cfg(test)]
pub(crate) mod stub;

pub use resource_manager::{Resource, ResourceId, ResourceManager};

use std::future::Future;
use std::sync::Arc;

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::artifacts::{DataType, GraphDef, SignatureDef};
use crate::weights::{NamedTensorMap, WeightStore};

/// Declared input or output of an executable graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorInfo {
    /// Graph node name
    pub name: String,
    /// Dimension sizes (-1 unknown), `None` if the rank is unknown
    pub shape: Option<Vec<i64>>,
    pub dtype: DataType,
}

/// Builds executable graphs and the executors that run them
pub trait GraphEngine: Send + Sync {
    /// Built, ready-to-run form of a topology
    type Graph: Send;
    type Executor: GraphExecutor;

    /// Build a graph from a topology.
    ///
    /// A signature restricts the declared inputs/outputs to the ones it names.
    fn build_graph(
        &self,
        topology: &GraphDef,
        signature: Option<&SignatureDef>,
    ) -> crate::Result<Self::Graph>;

    /// Wrap a built graph in a fresh executor with no weights or resources attached
    fn create_executor(&self, graph: Self::Graph) -> Self::Executor;
}

/// Runs one executable graph.
///
/// An executor is usable for repeated executions until `dispose` is called,
/// after which its behavior is up to the implementation.
pub trait GraphExecutor: Send {
    /// Input node names, in the order positional inputs are bound
    fn input_nodes(&self) -> &[String];

    /// Output node names, in declared order
    fn output_nodes(&self) -> &[String];

    fn inputs(&self) -> Vec<TensorInfo>;

    fn outputs(&self) -> Vec<TensorInfo>;

    fn weight_map(&self) -> Option<&Arc<WeightStore>>;

    fn set_weight_map(&mut self, weights: Arc<WeightStore>);

    fn resource_manager(&self) -> Option<&Arc<ResourceManager>>;

    fn set_resource_manager(&mut self, manager: Arc<ResourceManager>);

    /// Run the graph to completion on the calling thread.
    ///
    /// Returns one tensor per requested output, in request order.
    fn execute(&mut self, inputs: &NamedTensorMap, outputs: &[String]) -> crate::Result<Vec<Tensor>>;

    /// Suspending execution entry point.
    ///
    /// Engines without a cooperative execution path can keep the default,
    /// which runs the blocking path inside the returned future.
    fn execute_async(
        &mut self,
        inputs: &NamedTensorMap,
        outputs: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Tensor>>> + Send {
        async move { self.execute(inputs, outputs) }
    }

    /// Release the graph and any per-executor state
    fn dispose(&mut self);
}
