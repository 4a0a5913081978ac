//! Deterministic in-process engine used by the unit tests.
//!
//! Semantics:
//! - inputs are the signature inputs, or every `Placeholder` node
//! - outputs are the signature outputs, or every node no other node consumes
//! - output `k` evaluates to `sum_j (j + 1) * input_j + k` over the declared inputs
//! - each `HashTableV2` node registers a table resource under its name
//! - a `Fail` node makes every execution fail

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use candle_core::Tensor;

use super::{GraphEngine, GraphExecutor, Resource, ResourceManager, TensorInfo};
use crate::artifacts::{DataType, GraphDef, SignatureDef};
use crate::weights::{NamedTensorMap, WeightStore};

/// Call counters shared by an engine and every executor it creates
#[derive(Debug, Default)]
pub struct StubStats {
    pub graphs_built: AtomicUsize,
    pub executions: AtomicUsize,
    pub async_executions: AtomicUsize,
    pub disposals: AtomicUsize,
    pub tables_released: AtomicUsize,
}

impl StubStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StubEngine {
    pub stats: Arc<StubStats>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct StubGraph {
    inputs: Vec<TensorInfo>,
    outputs: Vec<TensorInfo>,
    tables: Vec<String>,
    fails: bool,
}

fn node_dtype(topology: &GraphDef, name: &str) -> DataType {
    topology
        .node
        .iter()
        .find(|n| n.name == name)
        .and_then(|n| n.attr.get("dtype"))
        .and_then(|attr| attr.get("type"))
        .and_then(|t| t.as_str())
        .map_or(DataType::Float32, |t| match t {
            "DT_INT32" => DataType::Int32,
            "DT_BOOL" => DataType::Bool,
            _ => DataType::Float32,
        })
}

fn consumed_nodes(topology: &GraphDef) -> HashSet<&str> {
    topology
        .node
        .iter()
        .flat_map(|n| n.input.iter())
        .map(|input| {
            let input = input.trim_start_matches('^');
            input.split(':').next().unwrap_or(input)
        })
        .collect()
}

impl GraphEngine for StubEngine {
    type Graph = StubGraph;
    type Executor = StubExecutor;

    fn build_graph(&self, topology: &GraphDef, signature: Option<&SignatureDef>) -> crate::Result<StubGraph> {
        self.stats.graphs_built.fetch_add(1, Ordering::SeqCst);

        let info = |name: String, shape: Option<Vec<i64>>| TensorInfo {
            dtype: node_dtype(topology, &name),
            name,
            shape,
        };

        let (inputs, outputs) = match signature {
            Some(sig) => {
                let tensors = |map: &std::collections::BTreeMap<String, crate::artifacts::SignatureTensor>| {
                    map.iter()
                        .map(|(key, t)| {
                            let name = t.node_name().unwrap_or(key).to_string();
                            info(name, t.tensor_shape.as_ref().and_then(|s| s.dims()))
                        })
                        .collect::<Vec<_>>()
                };
                (tensors(&sig.inputs), tensors(&sig.outputs))
            }
            None => {
                let consumed = consumed_nodes(topology);
                let inputs = topology
                    .nodes_with_op("Placeholder")
                    .map(|n| info(n.name.clone(), None))
                    .collect();
                let outputs = topology
                    .node
                    .iter()
                    .filter(|n| !consumed.contains(n.name.as_str()) && n.op != "HashTableV2")
                    .map(|n| info(n.name.clone(), None))
                    .collect();
                (inputs, outputs)
            }
        };

        Ok(StubGraph {
            inputs,
            outputs,
            tables: topology.nodes_with_op("HashTableV2").map(|n| n.name.clone()).collect(),
            fails: topology.nodes_with_op("Fail").next().is_some(),
        })
    }

    fn create_executor(&self, graph: StubGraph) -> StubExecutor {
        StubExecutor {
            input_names: graph.inputs.iter().map(|t| t.name.clone()).collect(),
            output_names: graph.outputs.iter().map(|t| t.name.clone()).collect(),
            graph,
            weights: None,
            resources: None,
            stats: Arc::clone(&self.stats),
        }
    }
}

/// Table resource registered by `HashTableV2` nodes
pub struct StubTable {
    pub entries: HashMap<String, i64>,
    stats: Arc<StubStats>,
}

impl Resource for StubTable {
    fn release(&mut self) {
        self.entries.clear();
        self.stats.tables_released.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct StubExecutor {
    graph: StubGraph,
    input_names: Vec<String>,
    output_names: Vec<String>,
    weights: Option<Arc<WeightStore>>,
    resources: Option<Arc<ResourceManager>>,
    stats: Arc<StubStats>,
}

impl StubExecutor {
    fn run(&self, inputs: &NamedTensorMap, outputs: &[String]) -> crate::Result<Vec<Tensor>> {
        if self.graph.fails {
            return Err(crate::GraphModelError::engine("graph contains a failing node"));
        }

        if !self.graph.tables.is_empty() {
            let manager = self
                .resources
                .as_ref()
                .ok_or_else(|| crate::GraphModelError::engine("no resource manager attached"))?;
            for table in &self.graph.tables {
                manager.add_resource(
                    table.clone(),
                    Box::new(StubTable {
                        entries: HashMap::from([("initialized".to_string(), 1)]),
                        stats: Arc::clone(&self.stats),
                    }),
                );
            }
        }

        let mut bound = Vec::with_capacity(self.input_names.len());
        for name in &self.input_names {
            let tensor = inputs
                .get(name)
                .ok_or_else(|| crate::GraphModelError::engine(format!("missing input '{}'", name)))?;
            bound.push(tensor);
        }

        outputs
            .iter()
            .map(|name| -> crate::Result<Tensor> {
                let k = self
                    .output_names
                    .iter()
                    .position(|o| o == name)
                    .ok_or_else(|| crate::GraphModelError::engine(format!("unknown output '{}'", name)))?;

                let mut acc = match bound.first() {
                    Some(first) => first.zeros_like()?,
                    None => Tensor::new(0f32, &candle_core::Device::Cpu)?,
                };
                for (j, tensor) in bound.iter().enumerate() {
                    acc = (acc + tensor.affine((j + 1) as f64, 0.0)?)?;
                }
                Ok(acc.affine(1.0, k as f64)?)
            })
            .collect()
    }
}

impl GraphExecutor for StubExecutor {
    fn input_nodes(&self) -> &[String] {
        &self.input_names
    }

    fn output_nodes(&self) -> &[String] {
        &self.output_names
    }

    fn inputs(&self) -> Vec<TensorInfo> {
        self.graph.inputs.clone()
    }

    fn outputs(&self) -> Vec<TensorInfo> {
        self.graph.outputs.clone()
    }

    fn weight_map(&self) -> Option<&Arc<WeightStore>> {
        self.weights.as_ref()
    }

    fn set_weight_map(&mut self, weights: Arc<WeightStore>) {
        self.weights = Some(weights);
    }

    fn resource_manager(&self) -> Option<&Arc<ResourceManager>> {
        self.resources.as_ref()
    }

    fn set_resource_manager(&mut self, manager: Arc<ResourceManager>) {
        self.resources = Some(manager);
    }

    fn execute(&mut self, inputs: &NamedTensorMap, outputs: &[String]) -> crate::Result<Vec<Tensor>> {
        self.stats.executions.fetch_add(1, Ordering::SeqCst);
        self.run(inputs, outputs)
    }

    async fn execute_async(&mut self, inputs: &NamedTensorMap, outputs: &[String]) -> crate::Result<Vec<Tensor>> {
        self.stats.async_executions.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.run(inputs, outputs)
    }

    fn dispose(&mut self) {
        self.stats.disposals.fetch_add(1, Ordering::SeqCst);
        self.weights = None;
        self.resources = None;
    }
}
