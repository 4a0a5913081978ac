//! Dequantization of quantized manifest entries.
//!
//! Two storage schemes appear in weight manifests:
//! - uint8/uint16 affine: `value = q * scale + min`
//! - float16: half precision widened to f32

use candle_core::{Device, Tensor};
use half::f16;

use crate::artifacts::{DataType, Quantization, QuantizationDtype};

/// Trait for dequantization implementations
pub trait Dequantizer: Send + Sync {
    /// Rebuild a CPU tensor from its stored bytes
    fn dequantize(&self, bytes: &[u8], shape: &[usize]) -> crate::Result<Tensor>;
}

/// Affine uint8/uint16 dequantizer
#[derive(Debug, Clone)]
pub struct AffineDequantizer {
    storage: QuantizationDtype,
    scale: f32,
    min: f32,
    /// Round and store as integers (original dtype int32)
    integer: bool,
}

impl AffineDequantizer {
    pub fn new(storage: QuantizationDtype, scale: f32, min: f32, integer: bool) -> Self {
        Self {
            storage,
            scale,
            min,
            integer,
        }
    }

    fn raw_values(&self, bytes: &[u8]) -> Vec<f32> {
        match self.storage {
            QuantizationDtype::Uint8 => bytes.iter().map(|&q| q as f32).collect(),
            _ => bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
                .collect(),
        }
    }
}

impl Dequantizer for AffineDequantizer {
    fn dequantize(&self, bytes: &[u8], shape: &[usize]) -> crate::Result<Tensor> {
        let values = self
            .raw_values(bytes)
            .into_iter()
            .map(|q| q * self.scale + self.min);

        let tensor = if self.integer {
            let values: Vec<i64> = values.map(|v| v.round() as i64).collect();
            Tensor::from_vec(values, shape, &Device::Cpu)?
        } else {
            Tensor::from_vec(values.collect::<Vec<f32>>(), shape, &Device::Cpu)?
        };

        Ok(tensor)
    }
}

/// Half-precision dequantizer
#[derive(Debug, Clone, Default)]
pub struct Float16Dequantizer;

impl Dequantizer for Float16Dequantizer {
    fn dequantize(&self, bytes: &[u8], shape: &[usize]) -> crate::Result<Tensor> {
        let values: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect();

        Ok(Tensor::from_vec(values, shape, &Device::Cpu)?)
    }
}

/// Create a dequantizer for a manifest entry of the given dtype
pub fn create_dequantizer(
    quantization: &Quantization,
    dtype: DataType,
) -> crate::Result<Box<dyn Dequantizer>> {
    match quantization.dtype {
        QuantizationDtype::Float16 => match dtype {
            DataType::Float32 => Ok(Box::new(Float16Dequantizer)),
            other => Err(crate::GraphModelError::UnsupportedDtype(format!(
                "float16 quantization of {} weights",
                other
            ))),
        },
        storage => {
            let integer = match dtype {
                DataType::Float32 => false,
                DataType::Int32 => true,
                other => {
                    return Err(crate::GraphModelError::UnsupportedDtype(format!(
                        "affine quantization of {} weights",
                        other
                    )))
                }
            };

            let (scale, min) = quantization.scale.zip(quantization.min).ok_or_else(|| {
                crate::GraphModelError::Deserialization(
                    "affine quantization requires both scale and min".to_string(),
                )
            })?;

            Ok(Box::new(AffineDequantizer::new(storage, scale, min, integer)))
        }
    }
}
