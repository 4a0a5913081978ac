//! Graph topology and signature descriptors as stored in the model document.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Version string reported when the topology carries no producer version
pub const UNKNOWN_VERSION: &str = "n/a";

/// Raw graph topology: the node list before it is built into an executable graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
    pub node: Vec<NodeDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionDef>,

    /// Function library, passed through to the graph builder untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<Value>,
}

/// A single graph node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,

    pub op: String,

    #[serde(default)]
    pub input: Vec<String>,

    #[serde(default)]
    pub attr: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Producer/consumer versions embedded in the topology
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_consumer: Option<i64>,

    #[serde(default)]
    pub bad_consumers: Vec<i64>,
}

impl GraphDef {
    /// Interpret a raw topology value as a graph descriptor
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        GraphDef::deserialize(value).map_err(|e| {
            crate::GraphModelError::Deserialization(format!(
                "model topology is not a graph descriptor: {}",
                e
            ))
        })
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.node.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// Nodes using the given op
    pub fn nodes_with_op<'a>(&'a self, op: &'a str) -> impl Iterator<Item = &'a NodeDef> + 'a {
        self.node.iter().filter(move |n| n.op == op)
    }

    /// Module version formatted as `<producer>.<minConsumer>`.
    ///
    /// A missing `minConsumer` reads as 0; a missing producer yields `n/a`.
    pub fn version_string(&self) -> String {
        match self.versions.as_ref().and_then(|v| v.producer.map(|p| (p, v.min_consumer))) {
            Some((producer, min_consumer)) => {
                format!("{}.{}", producer, min_consumer.unwrap_or(0))
            }
            None => UNKNOWN_VERSION.to_string(),
        }
    }
}

/// Declared input/output contract of a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDef {
    #[serde(default)]
    pub inputs: BTreeMap<String, SignatureTensor>,

    #[serde(default)]
    pub outputs: BTreeMap<String, SignatureTensor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

impl SignatureDef {
    /// Graph node names of the declared inputs, in key order
    pub fn input_node_names(&self) -> Vec<String> {
        self.inputs.iter().map(|(key, t)| t.node_name().unwrap_or(key).to_string()).collect()
    }

    /// Graph node names of the declared outputs, in key order
    pub fn output_node_names(&self) -> Vec<String> {
        self.outputs.iter().map(|(key, t)| t.node_name().unwrap_or(key).to_string()).collect()
    }
}

/// One signature entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureTensor {
    /// Tensor name, usually `<node>:<output index>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensor_shape: Option<TensorShape>,
}

impl SignatureTensor {
    /// Node name with any `:<index>` suffix removed
    pub fn node_name(&self) -> Option<&str> {
        self.name.as_deref().map(|name| match name.rsplit_once(':') {
            Some((node, index)) if index.parse::<u32>().is_ok() => node,
            _ => name,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TensorShape {
    #[serde(default)]
    pub dim: Vec<Dim>,

    #[serde(default)]
    pub unknown_rank: bool,
}

impl TensorShape {
    /// Dimension sizes (-1 for unknown), `None` when the rank itself is unknown
    pub fn dims(&self) -> Option<Vec<i64>> {
        if self.unknown_rank {
            None
        } else {
            Some(self.dim.iter().map(|d| d.size).collect())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dim {
    /// Sizes are written as JSON numbers or as numeric strings (int64 in protobuf JSON)
    #[serde(default, deserialize_with = "size_from_number_or_string")]
    pub size: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn size_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Number(i64),
        Text(String),
    }

    match RawSize::deserialize(deserializer)? {
        RawSize::Number(size) => Ok(size),
        RawSize::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}
