//! Neural network training service core: an MLP engine, a genetic search
//! over network configurations and the trainer that ties them to storage.

pub mod activation;
pub mod chromosome;
pub mod config;
pub mod error;
pub mod layer_topology;
pub mod mlp;
pub mod network;
pub mod neuron;
pub mod params;
pub mod point;
pub mod population;
pub mod store;
pub mod trainer;

pub use activation::*;
pub use chromosome::*;
pub use config::*;
pub use error::*;
pub use layer_topology::*;
pub use mlp::*;
pub use network::*;
pub use neuron::*;
pub use params::*;
pub use point::*;
pub use population::*;
pub use store::*;
pub use trainer::*;

use itertools::Itertools;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `RUST_LOG` sets the filter,
/// `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() -> NetResult<()> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| NetError::Config(format!("tracing init failed: {e}")))
}
