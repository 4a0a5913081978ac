//! Configuration module for loading and prediction options.

mod load_options;

pub use load_options::{LoadOptions, PredictConfig};
