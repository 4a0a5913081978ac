//! Weight manifest entries and their flattening into ordered weight specs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a stored tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float32,
    Int32,
    Bool,
    Complex64,
    String,
}

impl DataType {
    /// Bytes per element in an unquantized blob, `None` for variable-length types
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            DataType::Float32 | DataType::Int32 => Some(4),
            DataType::Bool => Some(1),
            DataType::Complex64 => Some(8),
            DataType::String => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Float32 => "float32",
            DataType::Int32 => "int32",
            DataType::Bool => "bool",
            DataType::Complex64 => "complex64",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of a quantized weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationDtype {
    Uint8,
    Uint16,
    Float16,
}

impl QuantizationDtype {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            QuantizationDtype::Uint8 => 1,
            QuantizationDtype::Uint16 | QuantizationDtype::Float16 => 2,
        }
    }
}

/// Quantization parameters attached to a manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    /// Storage type in the blob
    pub dtype: QuantizationDtype,

    /// Affine scale (uint8/uint16 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,

    /// Affine offset (uint8/uint16 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,

    /// Type the values had before quantization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_dtype: Option<DataType>,
}

/// One weight as listed in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsManifestEntry {
    pub name: String,

    #[serde(default)]
    pub shape: Vec<usize>,

    pub dtype: DataType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
}

/// A manifest group. `paths` names the shard files the group was written to;
/// the cached blob already holds every shard concatenated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsManifestGroup {
    #[serde(default)]
    pub paths: Vec<String>,

    pub weights: Vec<WeightsManifestEntry>,
}

/// A flattened weight spec with its byte range inside the weight blob.
///
/// Variable-length (string) weights have no size known from the manifest, so
/// they and every weight after them carry no byte range.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DataType,
    pub quantization: Option<Quantization>,
    /// Byte offset into the weight blob
    pub offset: Option<usize>,
    /// Number of bytes the weight occupies in the blob
    pub byte_len: Option<usize>,
}

impl WeightSpec {
    /// Number of elements, `None` if the shape overflows
    pub fn numel(&self) -> Option<usize> {
        checked_numel(&self.shape)
    }

    /// End of the byte range (exclusive)
    pub fn end(&self) -> Option<usize> {
        self.offset?.checked_add(self.byte_len?)
    }

    /// Byte range inside the blob, when the manifest locates it
    pub fn byte_range(&self) -> Option<std::ops::Range<usize>> {
        Some(self.offset?..self.end()?)
    }
}

fn checked_numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
}

fn overflow(name: &str) -> crate::GraphModelError {
    crate::GraphModelError::Deserialization(format!(
        "weight '{}' is too large to be located in the blob",
        name
    ))
}

/// Flatten manifest groups into one ordered spec list.
///
/// Offsets are assigned cumulatively in manifest order, so the relative order
/// of entries across groups decides where each weight lives in the blob.
pub fn flatten_manifest(groups: &[WeightsManifestGroup]) -> crate::Result<Vec<WeightSpec>> {
    let mut specs = Vec::with_capacity(groups.iter().map(|g| g.weights.len()).sum());
    let mut offset = Some(0usize);

    for group in groups {
        for entry in &group.weights {
            let byte_len = entry_byte_len(entry)?;
            specs.push(WeightSpec {
                name: entry.name.clone(),
                shape: entry.shape.clone(),
                dtype: entry.dtype,
                quantization: entry.quantization.clone(),
                offset,
                byte_len,
            });
            offset = match (offset, byte_len) {
                (Some(start), Some(len)) => Some(start.checked_add(len).ok_or_else(|| overflow(&entry.name))?),
                _ => None,
            };
        }
    }

    Ok(specs)
}

/// Stored size of an entry, `None` for variable-length dtypes
fn entry_byte_len(entry: &WeightsManifestEntry) -> crate::Result<Option<usize>> {
    let numel = checked_numel(&entry.shape).ok_or_else(|| overflow(&entry.name))?;

    let elem_size = match entry.quantization {
        Some(ref q) => q.dtype.size_in_bytes(),
        None => match entry.dtype.size_in_bytes() {
            Some(size) => size,
            None => return Ok(None),
        },
    };

    numel
        .checked_mul(elem_size)
        .map(Some)
        .ok_or_else(|| overflow(&entry.name))
}
