//! Training configuration
//!
//! Loaded in three steps: TOML file (or built-in defaults), `ML_*`
//! environment variables, validation.

use crate::*;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Generations of the genetic search
    pub generations: usize,
    /// Individuals per population
    pub variations: usize,
    pub max_epoch: usize,
    pub min_hidden_layers: usize,
    pub max_hidden_layers: usize,
    /// Share of the points held out for scoring, in [0, 1)
    pub test_set: f32,
    /// Minimum relative change of the error between epochs to keep training
    pub tolerance: f32,
    /// Training requests that can wait before producers block
    pub queue_capacity: usize,
    /// Fixed RNG seed, random when unset
    pub seed: Option<u64>,
    pub store: StoreConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            generations: 5,
            variations: 6,
            max_epoch: 1000,
            min_hidden_layers: 1,
            max_hidden_layers: 5,
            test_set: 0.4,
            tolerance: 0.1,
            queue_capacity: 100,
            seed: None,
            store: StoreConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

impl FromStr for StoreKind {
    type Err = NetError;

    fn from_str(s: &str) -> NetResult<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "file" => Ok(StoreKind::File),
            other => Err(NetError::Config(format!("{} is not a valid store type", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Root directory of the file stores
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: PathBuf::from("."),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> NetResult<()> {
        let mut errors = Vec::new();
        if !(0.0..1.0).contains(&self.test_set) {
            errors.push(format!("test_set must be in [0, 1), got {}", self.test_set));
        }
        if self.variations < 3 {
            errors.push(format!("variations must be at least 3, got {}", self.variations));
        }
        if self.min_hidden_layers < 1 {
            errors.push("min_hidden_layers must be at least 1".to_string());
        }
        if self.max_epoch < 1 {
            errors.push("max_epoch must be at least 1".to_string());
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            errors.push(format!("tolerance can't be negative, got {}", self.tolerance));
        }
        if self.queue_capacity < 1 {
            errors.push("queue_capacity must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NetError::Config(errors.join("; ")))
        }
    }
}

/// Reads the TOML file at `path` (defaults when `None`), applies the
/// environment overrides and validates the result
pub fn load_config(path: Option<&Path>) -> NetResult<TrainingConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|err| NetError::Config(err.to_string()))?
        }
        None => TrainingConfig::default(),
    };
    apply_environment_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Supported environment variables:
/// - `ML_GENERATIONS` -> `generations`
/// - `ML_VARIATIONS` -> `variations`
/// - `ML_MAX_EPOCH` -> `max_epoch`
/// - `ML_MIN_HLAYERS` -> `min_hidden_layers`
/// - `ML_MAX_HLAYERS` -> `max_hidden_layers`
/// - `ML_TEST_SET` -> `test_set`
/// - `ML_TOLERANCE` -> `tolerance`
/// - `ML_QUEUE_CAPACITY` -> `queue_capacity`
/// - `ML_SEED` -> `seed`
/// - `ML_STORE_TYPE` -> `store.kind`
/// - `ML_STORE_PATH` -> `store.path`
pub fn apply_environment_overrides(config: &mut TrainingConfig) {
    apply_overrides(config, |key| env::var(key).ok());
}

/// Same as [`apply_environment_overrides`] with a custom variable source.
/// Values that don't parse are ignored with a warning.
pub fn apply_overrides<F>(config: &mut TrainingConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
        let value = value?;
        match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(key, value = %value, "ignoring unparsable configuration override");
                None
            }
        }
    }

    if let Some(v) = parsed("ML_GENERATIONS", lookup("ML_GENERATIONS")) {
        config.generations = v;
    }
    if let Some(v) = parsed("ML_VARIATIONS", lookup("ML_VARIATIONS")) {
        config.variations = v;
    }
    if let Some(v) = parsed("ML_MAX_EPOCH", lookup("ML_MAX_EPOCH")) {
        config.max_epoch = v;
    }
    if let Some(v) = parsed("ML_MIN_HLAYERS", lookup("ML_MIN_HLAYERS")) {
        config.min_hidden_layers = v;
    }
    if let Some(v) = parsed("ML_MAX_HLAYERS", lookup("ML_MAX_HLAYERS")) {
        config.max_hidden_layers = v;
    }
    if let Some(v) = parsed("ML_TEST_SET", lookup("ML_TEST_SET")) {
        config.test_set = v;
    }
    if let Some(v) = parsed("ML_TOLERANCE", lookup("ML_TOLERANCE")) {
        config.tolerance = v;
    }
    if let Some(v) = parsed("ML_QUEUE_CAPACITY", lookup("ML_QUEUE_CAPACITY")) {
        config.queue_capacity = v;
    }
    if let Some(v) = parsed("ML_SEED", lookup("ML_SEED")) {
        config.seed = Some(v);
    }
    if let Some(v) = parsed("ML_STORE_TYPE", lookup("ML_STORE_TYPE")) {
        config.store.kind = v;
    }
    if let Some(v) = lookup("ML_STORE_PATH") {
        config.store.path = PathBuf::from(v);
    }
}

/// Point and param stores of the configured kind. File stores live in the
/// `points` and `nets` subdirectories of `store.path`.
pub fn open_stores(config: &TrainingConfig) -> NetResult<(Arc<dyn PointStore>, Arc<dyn ParamStore>)> {
    match config.store.kind {
        StoreKind::Memory => Ok((
            Arc::new(MemoryPointStore::default()),
            Arc::new(MemoryParamStore::default()),
        )),
        StoreKind::File => Ok((
            Arc::new(FilePointStore::new(config.store.path.join("points"))?),
            Arc::new(FileParamStore::new(config.store.path.join("nets"))?),
        )),
    }
}
