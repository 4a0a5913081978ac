//! Model artifacts: the cached model document and the bundle assembled from it.
//!
//! This module provides:
//! - `ModelJson`: the structured topology document as stored in the cache
//! - `ModelArtifactBundle`: topology, flattened weight specs and weight blob
//! - Topology, signature and weight manifest descriptors

mod manifest;
mod topology;

pub use manifest::{
    flatten_manifest, DataType, Quantization, QuantizationDtype, WeightSpec, WeightsManifestEntry,
    WeightsManifestGroup,
};
pub use topology::{
    Dim, GraphDef, NodeDef, SignatureDef, SignatureTensor, TensorShape, VersionDef,
    UNKNOWN_VERSION,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// The model document stored under the topology key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelJson {
    /// Raw topology; interpreted as a graph descriptor at load time
    pub model_topology: Value,

    /// Weight groups, in blob order
    pub weights_manifest: Vec<WeightsManifestGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureDef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_defined_metadata: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_initializer: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_config: Option<Value>,
}

impl ModelJson {
    /// Parse a model document from raw bytes.
    ///
    /// The bytes must be UTF-8 (a leading byte-order mark is skipped).
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| {
            crate::GraphModelError::Deserialization(format!("model document is not UTF-8: {}", e))
        })?;

        serde_json::from_str(text).map_err(|e| {
            crate::GraphModelError::Deserialization(format!("invalid model document: {}", e))
        })
    }
}

/// Everything needed to build a model, assembled once by an artifact source.
#[derive(Debug, Clone)]
pub struct ModelArtifactBundle {
    pub model_topology: Value,
    pub weight_specs: Vec<WeightSpec>,
    pub weight_data: Vec<u8>,
    pub format: Option<String>,
    pub generated_by: Option<String>,
    pub converted_by: Option<String>,
    pub signature: Option<SignatureDef>,
    pub user_defined_metadata: Option<Map<String, Value>>,
    pub model_initializer: Option<Value>,
    pub training_config: Option<Value>,
}

impl ModelArtifactBundle {
    /// Assemble a bundle from a parsed document and its weight blob
    pub fn from_model_json(json: ModelJson, weight_data: Vec<u8>) -> crate::Result<Self> {
        let weight_specs = flatten_manifest(&json.weights_manifest)?;

        Ok(Self {
            model_topology: json.model_topology,
            weight_specs,
            weight_data,
            format: json.format,
            generated_by: json.generated_by,
            converted_by: json.converted_by,
            signature: json.signature,
            user_defined_metadata: json.user_defined_metadata,
            model_initializer: json.model_initializer,
            training_config: json.training_config,
        })
    }

    /// The primary topology as a graph descriptor
    pub fn topology(&self) -> crate::Result<GraphDef> {
        GraphDef::from_value(&self.model_topology)
    }

    /// The initializer topology, when present with at least one node
    pub fn initializer(&self) -> crate::Result<Option<GraphDef>> {
        let has_nodes = self
            .model_initializer
            .as_ref()
            .and_then(|init| init.get("node"))
            .and_then(Value::as_array)
            .is_some_and(|nodes| !nodes.is_empty());

        match self.model_initializer {
            Some(ref init) if has_nodes => GraphDef::from_value(init).map(Some),
            _ => Ok(None),
        }
    }

    /// Resolve the signature used to build the graph.
    ///
    /// A signature embedded in the user metadata wins over the top-level one.
    pub fn resolve_signature(&self) -> crate::Result<Option<SignatureDef>> {
        let embedded = self
            .user_defined_metadata
            .as_ref()
            .and_then(|meta| meta.get("signature"))
            .filter(|sig| !sig.is_null());

        match embedded {
            Some(sig) => SignatureDef::deserialize(sig).map(Some).map_err(|e| {
                crate::GraphModelError::Deserialization(format!(
                    "invalid signature in user metadata: {}",
                    e
                ))
            }),
            None => Ok(self.signature.clone()),
        }
    }

    /// Bytes the manifest expects in the weight blob.
    ///
    /// `None` when a variable-length weight makes the total unknowable
    /// without reading the blob.
    pub fn weight_bytes_required(&self) -> Option<usize> {
        self.weight_specs.last().map_or(Some(0), WeightSpec::end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "format": "graph-model",
            "generatedBy": "2.15.0",
            "convertedBy": "TensorFlow.js Converter v4.17.0",
            "modelTopology": {
                "node": [
                    {"name": "x", "op": "Placeholder"},
                    {"name": "y", "op": "Identity", "input": ["x"]}
                ],
                "versions": {"producer": 1645}
            },
            "weightsManifest": [
                {"paths": ["group1-shard1of1.bin"], "weights": [
                    {"name": "w", "shape": [2], "dtype": "float32"}
                ]}
            ],
            "signature": {
                "inputs": {"x": {"name": "x:0", "dtype": "DT_FLOAT"}},
                "outputs": {"y": {"name": "y:0", "dtype": "DT_FLOAT"}}
            }
        })
    }

    fn bundle(doc: Value) -> ModelArtifactBundle {
        let bytes = serde_json::to_vec(&doc).unwrap();
        let json = ModelJson::from_slice(&bytes).unwrap();
        ModelArtifactBundle::from_model_json(json, vec![0; 8]).unwrap()
    }

    #[test]
    fn test_bundle_from_document() {
        let bundle = bundle(document());

        assert_eq!(bundle.format.as_deref(), Some("graph-model"));
        assert_eq!(bundle.converted_by.as_deref(), Some("TensorFlow.js Converter v4.17.0"));
        assert_eq!(bundle.weight_specs.len(), 1);
        assert_eq!(bundle.weight_bytes_required(), Some(8));
        assert_eq!(bundle.topology().unwrap().version_string(), "1645.0");
        assert!(bundle.initializer().unwrap().is_none());
    }

    #[test]
    fn test_bom_is_skipped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend(serde_json::to_vec(&document()).unwrap());
        assert!(ModelJson::from_slice(&bytes).is_ok());
    }

    #[test]
    fn test_multibyte_text_survives_decoding() {
        let mut doc = document();
        doc["userDefinedMetadata"] = json!({"description": "模型 für Übersetzung"});

        let bundle = bundle(doc);
        let meta = bundle.user_defined_metadata.unwrap();
        assert_eq!(meta["description"], "模型 für Übersetzung");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            ModelJson::from_slice(b"{not json"),
            Err(crate::GraphModelError::Deserialization(_))
        ));
        assert!(matches!(
            ModelJson::from_slice(&[0xff, 0xfe, 0x00]),
            Err(crate::GraphModelError::Deserialization(_))
        ));

        let missing_manifest = json!({"modelTopology": {"node": []}});
        let bytes = serde_json::to_vec(&missing_manifest).unwrap();
        assert!(ModelJson::from_slice(&bytes).is_err());
    }

    #[test]
    fn test_signature_precedence() {
        let top_level = bundle(document());
        let sig = top_level.resolve_signature().unwrap().unwrap();
        assert_eq!(sig.input_node_names(), ["x"]);

        let mut doc = document();
        doc["userDefinedMetadata"] = json!({
            "signature": {"inputs": {"image": {"name": "image:0"}}, "outputs": {}}
        });
        let embedded = bundle(doc).resolve_signature().unwrap().unwrap();
        assert_eq!(embedded.input_node_names(), ["image"]);

        let mut doc = document();
        doc.as_object_mut().unwrap().remove("signature");
        doc["userDefinedMetadata"] = json!({"signature": null});
        assert!(bundle(doc).resolve_signature().unwrap().is_none());
    }

    #[test]
    fn test_string_weights_yield_a_bundle() {
        let mut doc = document();
        doc["weightsManifest"] = json!([
            {"paths": ["group1-shard1of1.bin"], "weights": [
                {"name": "w", "shape": [2], "dtype": "float32"},
                {"name": "vocab", "shape": [2], "dtype": "string"}
            ]}
        ]);

        let bundle = bundle(doc);
        assert_eq!(bundle.weight_specs.len(), 2);
        assert_eq!(bundle.weight_specs[1].dtype, DataType::String);
        assert_eq!(bundle.weight_bytes_required(), None);
    }

    #[test]
    fn test_initializer_requires_nodes() {
        let mut doc = document();
        doc["modelInitializer"] = json!({"versions": {"producer": 1}});
        assert!(bundle(doc).initializer().unwrap().is_none());

        let mut doc = document();
        doc["modelInitializer"] = json!({"node": []});
        assert!(bundle(doc).initializer().unwrap().is_none());

        let mut doc = document();
        doc["modelInitializer"] = json!({"node": [{"name": "table", "op": "HashTableV2"}]});
        let init = bundle(doc).initializer().unwrap().unwrap();
        assert_eq!(init.node_count(), 1);
    }
}
