//! Caller-facing input, output and result shapes.

use candle_core::Tensor;

use crate::weights::NamedTensorMap;

/// Inputs accepted by `GraphModel::execute`
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// One tensor, bound to the only input node
    Single(Tensor),
    /// Tensors bound positionally to the input nodes
    Batch(Vec<Tensor>),
    /// Tensors keyed by node name, passed through as-is
    Named(NamedTensorMap),
}

impl From<Tensor> for ModelInput {
    fn from(tensor: Tensor) -> Self {
        ModelInput::Single(tensor)
    }
}

impl From<Vec<Tensor>> for ModelInput {
    fn from(tensors: Vec<Tensor>) -> Self {
        ModelInput::Batch(tensors)
    }
}

impl<const N: usize> From<[Tensor; N]> for ModelInput {
    fn from(tensors: [Tensor; N]) -> Self {
        ModelInput::Batch(tensors.into())
    }
}

impl From<NamedTensorMap> for ModelInput {
    fn from(map: NamedTensorMap) -> Self {
        ModelInput::Named(map)
    }
}

/// Requested output node names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputNames {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for OutputNames {
    fn from(name: &str) -> Self {
        OutputNames::One(name.to_string())
    }
}

impl From<String> for OutputNames {
    fn from(name: String) -> Self {
        OutputNames::One(name)
    }
}

impl From<Vec<String>> for OutputNames {
    fn from(names: Vec<String>) -> Self {
        OutputNames::Many(names)
    }
}

impl From<Vec<&str>> for OutputNames {
    fn from(names: Vec<&str>) -> Self {
        OutputNames::Many(names.into_iter().map(str::to_string).collect())
    }
}

impl OutputNames {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OutputNames::One(name) => vec![name],
            OutputNames::Many(names) => names,
        }
    }
}

/// Result of an execution: one tensor is returned unwrapped
#[derive(Debug, Clone)]
pub enum Prediction {
    Single(Tensor),
    Multiple(Vec<Tensor>),
}

impl Prediction {
    /// Shape an executor result, unwrapping a lone tensor
    pub fn from_tensors(tensors: Vec<Tensor>) -> Self {
        match <[Tensor; 1]>::try_from(tensors) {
            Ok([tensor]) => Prediction::Single(tensor),
            Err(tensors) => Prediction::Multiple(tensors),
        }
    }

    pub fn as_single(&self) -> Option<&Tensor> {
        match self {
            Prediction::Single(tensor) => Some(tensor),
            Prediction::Multiple(_) => None,
        }
    }

    pub fn into_single(self) -> Option<Tensor> {
        match self {
            Prediction::Single(tensor) => Some(tensor),
            Prediction::Multiple(_) => None,
        }
    }

    /// All tensors in output order
    pub fn into_vec(self) -> Vec<Tensor> {
        match self {
            Prediction::Single(tensor) => vec![tensor],
            Prediction::Multiple(tensors) => tensors,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Prediction::Single(_) => 1,
            Prediction::Multiple(tensors) => tensors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bind caller inputs to the declared input nodes.
///
/// Positional inputs must match the input node count exactly; named maps are
/// not checked.
pub fn normalize_inputs(inputs: ModelInput, input_nodes: &[String]) -> crate::Result<NamedTensorMap> {
    let tensors = match inputs {
        ModelInput::Named(map) => return Ok(map),
        ModelInput::Single(tensor) => vec![tensor],
        ModelInput::Batch(tensors) => tensors,
    };

    if tensors.len() != input_nodes.len() {
        return Err(crate::GraphModelError::Validation(format!(
            "input tensor count mismatch: expected {}, got {}",
            input_nodes.len(),
            tensors.len()
        )));
    }

    Ok(input_nodes.iter().cloned().zip(tensors).collect())
}

/// Requested outputs, defaulting to every declared output node
pub fn normalize_outputs(outputs: Option<OutputNames>, output_nodes: &[String]) -> Vec<String> {
    match outputs {
        Some(names) => names.into_vec(),
        None => output_nodes.to_vec(),
    }
}
