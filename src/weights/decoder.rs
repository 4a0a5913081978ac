//! Weight decoding for the concatenated little-endian blob layout.

use std::collections::HashMap;

use candle_core::{Device, Tensor};

use super::quantization::create_dequantizer;
use super::{NamedTensorMap, WeightDecoder};
use crate::artifacts::{DataType, WeightSpec};
use crate::config::LoadOptions;
use crate::utils::get_device;

/// Decodes weights stored back to back in manifest order.
#[derive(Debug, Clone, Default)]
pub struct BlobWeightDecoder {
    /// Reject trailing bytes after the last weight
    strict: bool,
    /// Accelerator ordinal, resolved when decoding
    device_id: Option<usize>,
}

impl BlobWeightDecoder {
    /// Create a new decoder
    pub fn new(strict: bool, device_id: Option<usize>) -> Self {
        Self { strict, device_id }
    }

    /// Create a decoder from loader options
    pub fn from_options(options: &LoadOptions) -> Self {
        Self::new(options.strict, options.device_id)
    }

    /// Byte range of a weight inside the blob
    pub fn weight_bytes<'a>(spec: &WeightSpec, blob: &'a [u8]) -> crate::Result<&'a [u8]> {
        let range = match spec.byte_range() {
            Some(range) => range,
            None if spec.dtype == DataType::String => {
                return Err(crate::GraphModelError::UnsupportedDtype(format!(
                    "{} (weight '{}')",
                    spec.dtype, spec.name
                )))
            }
            None => {
                return Err(crate::GraphModelError::Deserialization(format!(
                    "weight '{}' follows a variable-length weight and has no known position in the blob",
                    spec.name
                )))
            }
        };

        let len = blob.len();
        blob.get(range.clone()).ok_or_else(|| {
            crate::GraphModelError::Deserialization(format!(
                "weight blob too short for '{}': needs bytes {}..{}, blob has {}",
                spec.name, range.start, range.end, len
            ))
        })
    }

    /// Decode a single weight to a CPU tensor
    pub fn decode_weight(&self, spec: &WeightSpec, bytes: &[u8]) -> crate::Result<Tensor> {
        if let Some(ref quantization) = spec.quantization {
            return create_dequantizer(quantization, spec.dtype)?.dequantize(bytes, &spec.shape);
        }

        let shape = spec.shape.as_slice();
        let tensor = match spec.dtype {
            DataType::Float32 => {
                let values: Vec<f32> = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Tensor::from_vec(values, shape, &Device::Cpu)?
            }
            DataType::Int32 => {
                // Candle has no i32, widen
                let values: Vec<i64> = bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
                    .collect();
                Tensor::from_vec(values, shape, &Device::Cpu)?
            }
            DataType::Bool => {
                let values: Vec<u8> = bytes.iter().map(|&b| u8::from(b != 0)).collect();
                Tensor::from_vec(values, shape, &Device::Cpu)?
            }
            DataType::Complex64 | DataType::String => {
                return Err(crate::GraphModelError::UnsupportedDtype(format!(
                    "{} (weight '{}')",
                    spec.dtype, spec.name
                )));
            }
        };

        Ok(tensor)
    }
}

impl WeightDecoder for BlobWeightDecoder {
    fn decode(&self, specs: &[WeightSpec], blob: &[u8]) -> crate::Result<NamedTensorMap> {
        let device = get_device(self.device_id)?;
        let mut tensors = HashMap::with_capacity(specs.len());

        for spec in specs {
            let bytes = Self::weight_bytes(spec, blob)?;
            let tensor = self.decode_weight(spec, bytes)?;
            tensors.insert(spec.name.clone(), tensor.to_device(&device)?);
        }

        let consumed = specs.iter().filter_map(WeightSpec::end).max().unwrap_or(0);
        if consumed < blob.len() {
            let trailing = blob.len() - consumed;
            if self.strict {
                return Err(crate::GraphModelError::Deserialization(format!(
                    "weight blob has {} bytes beyond the {} described by the manifest",
                    trailing, consumed
                )));
            }
            tracing::warn!("Ignoring {} trailing bytes in weight blob", trailing);
        }

        tracing::debug!("Decoded {} weights ({} bytes)", tensors.len(), consumed);
        Ok(tensors)
    }
}
