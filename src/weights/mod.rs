//! Weight decoding and the shared weight store.
//!
//! This module provides:
//! - `WeightDecoder`: turns weight specs plus a raw blob into named tensors
//! - `BlobWeightDecoder`: decoder for the concatenated little-endian layout
//! - `WeightStore`: the decoded weights as seen by graph executors

mod decoder;
mod quantization;

pub use decoder::BlobWeightDecoder;
pub use quantization::{create_dequantizer, AffineDequantizer, Dequantizer, Float16Dequantizer};

use std::collections::HashMap;

use candle_core::Tensor;

use crate::artifacts::WeightSpec;

/// Tensors keyed by node name
pub type NamedTensorMap = HashMap<String, Tensor>;

/// Converts a weight spec list and raw blob into named tensors
pub trait WeightDecoder: Send + Sync {
    fn decode(&self, specs: &[WeightSpec], blob: &[u8]) -> crate::Result<NamedTensorMap>;
}

/// Decoded weights keyed by name, each held as a list of tensors.
///
/// Built once per load and shared by reference between the primary and
/// initializer executors.
#[derive(Debug, Clone, Default)]
pub struct WeightStore {
    tensors: HashMap<String, Vec<Tensor>>,
}

impl WeightStore {
    /// Wrap every decoded tensor as a one-element list
    pub fn from_named(weights: NamedTensorMap) -> Self {
        let tensors = weights
            .into_iter()
            .map(|(name, tensor)| (name, vec![tensor]))
            .collect();
        Self { tensors }
    }

    /// All tensors stored under a name
    pub fn get(&self, name: &str) -> Option<&[Tensor]> {
        self.tensors.get(name).map(Vec::as_slice)
    }

    /// First tensor stored under a name
    pub fn first(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name).and_then(|list| list.first())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Weight names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Tensor])> {
        self.tensors.iter().map(|(name, list)| (name.as_str(), list.as_slice()))
    }
}
