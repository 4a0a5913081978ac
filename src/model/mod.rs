//! Model orchestration.
//!
//! This module provides:
//! - `GraphModel`: owns the executors of a loaded model and their shared resources
//! - `load_graph_model`: one-shot construct-and-load helper
//! - Input/output normalization types

mod graph_model;
mod io;

pub use graph_model::{load_graph_model, GraphModel};
pub use io::{normalize_inputs, normalize_outputs, ModelInput, OutputNames, Prediction};
