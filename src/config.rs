//! cfdata global configuration options.

use std::sync::OnceLock;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

/// Global configuration options for the cfdata crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// Every [`Data`](crate::data::Data) takes a snapshot of the global configuration when it is constructed (unless one is given explicitly to a [`DataBuilder`](crate::data::DataBuilder)).
/// Arrays derived from it inherit that snapshot, so changing the global configuration only affects arrays created afterwards.
///
/// # Numerical Tolerance Options
/// ## Absolute Tolerance
/// > default: [`f64::EPSILON`]
///
/// The absolute tolerance used by [`Data::equals`](crate::data::Data::equals), [`Data::isclose`](crate::data::Data::isclose) and the `==`/`!=` binary operations.
///
/// ## Relative Tolerance
/// > default: [`f64::EPSILON`]
///
/// The relative tolerance, scaled by the magnitude of the second operand.
///
/// # Chunking Options
/// ## Chunk Size
/// > default: `134217728` (128 MiB)
///
/// The target size in bytes of a chunk when an array is constructed without explicit chunks.
///
/// ## Split Every
/// > default: `4`
///
/// The default fan-in of hierarchical reductions.
///
/// ## Chunk Concurrent Limit
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of blocks that are evaluated concurrently when an array is computed.
///
/// # Mask Options
/// ## Hardmask
/// > default: [`true`]
///
/// The default mask hardness of new arrays.
///
/// ## Fill Policy
/// > default: [`FillPolicy::NetcdfDefault`]
///
/// How the default fill value of an array is chosen.
///
/// # Computation Options
/// ## Compute Policy
/// > default: [`ComputePolicy::CheapOnly`]
///
/// Whether implicit materialisation (e.g. [`Data::first_element`](crate::data::Data::first_element)) may compute a graph which is more than slicing and copying.
///
/// ## Debug
/// > default: [`false`]
///
/// If enabled, implicit materialisation is always allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    atol: f64,
    rtol: f64,
    chunk_size: usize,
    split_every: usize,
    chunk_concurrent_limit: usize,
    hardmask: bool,
    fill_policy: FillPolicy,
    compute_policy: ComputePolicy,
    debug: bool,
}

/// How the default fill value of an array is chosen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Use the netCDF default fill value of the data type.
    NetcdfDefault,
    /// Use NaN for floating point data types, otherwise the netCDF default.
    Nan,
}

/// Whether implicit materialisation of a lazy graph is allowed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputePolicy {
    /// Only graphs consisting of slicing, copying, concatenation and reshaping may be computed implicitly.
    CheapOnly,
    /// Any graph may be computed implicitly.
    Always,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            atol: f64::EPSILON,
            rtol: f64::EPSILON,
            chunk_size: 128 * 1024 * 1024,
            split_every: 4,
            chunk_concurrent_limit: std::thread::available_parallelism()
                .map_or(1, std::num::NonZeroUsize::get),
            hardmask: true,
            fill_policy: FillPolicy::NetcdfDefault,
            compute_policy: ComputePolicy::CheapOnly,
            debug: false,
        }
    }
}

impl Config {
    /// Get the [absolute tolerance](#absolute-tolerance) configuration.
    #[must_use]
    pub fn atol(&self) -> f64 {
        self.atol
    }

    /// Set the [absolute tolerance](#absolute-tolerance) configuration.
    pub fn set_atol(&mut self, atol: f64) -> &mut Self {
        self.atol = atol;
        self
    }

    /// Get the [relative tolerance](#relative-tolerance) configuration.
    #[must_use]
    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    /// Set the [relative tolerance](#relative-tolerance) configuration.
    pub fn set_rtol(&mut self, rtol: f64) -> &mut Self {
        self.rtol = rtol;
        self
    }

    /// Get the [chunk size](#chunk-size) configuration.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Set the [chunk size](#chunk-size) configuration.
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> &mut Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Get the [split every](#split-every) configuration.
    #[must_use]
    pub fn split_every(&self) -> usize {
        self.split_every
    }

    /// Set the [split every](#split-every) configuration.
    pub fn set_split_every(&mut self, split_every: usize) -> &mut Self {
        self.split_every = split_every.max(2);
        self
    }

    /// Get the [chunk concurrent limit](#chunk-concurrent-limit) configuration.
    #[must_use]
    pub fn chunk_concurrent_limit(&self) -> usize {
        self.chunk_concurrent_limit
    }

    /// Set the [chunk concurrent limit](#chunk-concurrent-limit) configuration.
    pub fn set_chunk_concurrent_limit(&mut self, concurrent_limit: usize) -> &mut Self {
        self.chunk_concurrent_limit = concurrent_limit.max(1);
        self
    }

    /// Get the [hardmask](#hardmask) configuration.
    #[must_use]
    pub fn hardmask(&self) -> bool {
        self.hardmask
    }

    /// Set the [hardmask](#hardmask) configuration.
    pub fn set_hardmask(&mut self, hardmask: bool) -> &mut Self {
        self.hardmask = hardmask;
        self
    }

    /// Get the [fill policy](#fill-policy) configuration.
    #[must_use]
    pub fn fill_policy(&self) -> FillPolicy {
        self.fill_policy
    }

    /// Set the [fill policy](#fill-policy) configuration.
    pub fn set_fill_policy(&mut self, fill_policy: FillPolicy) -> &mut Self {
        self.fill_policy = fill_policy;
        self
    }

    /// Get the [compute policy](#compute-policy) configuration.
    #[must_use]
    pub fn compute_policy(&self) -> ComputePolicy {
        self.compute_policy
    }

    /// Set the [compute policy](#compute-policy) configuration.
    pub fn set_compute_policy(&mut self, compute_policy: ComputePolicy) -> &mut Self {
        self.compute_policy = compute_policy;
        self
    }

    /// Get the [debug](#debug) configuration.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Set the [debug](#debug) configuration.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global cfdata configuration.
///
/// # Deadlocks
/// Deadlocks if the global config is already mutably held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
}

/// Returns a mutable reference to the global cfdata configuration.
///
/// # Deadlocks
/// Deadlocks if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.atol(), f64::EPSILON);
        assert_eq!(config.rtol(), f64::EPSILON);
        assert_eq!(config.chunk_size(), 134_217_728);
        assert!(config.hardmask());
        assert_eq!(config.compute_policy(), ComputePolicy::CheapOnly);
        assert!(config.chunk_concurrent_limit() >= 1);
    }

    #[test]
    fn config_setters_clamp() {
        let mut config = Config::default();
        config.set_split_every(0).set_chunk_size(0).set_atol(1e-3);
        assert_eq!(config.split_every(), 2);
        assert_eq!(config.chunk_size(), 1);
        assert_eq!(config.atol(), 1e-3);
    }

    #[test]
    fn config_json() {
        let config: Config =
            serde_json::from_str(r#"{"atol": 0.5, "fill_policy": "nan", "debug": true}"#).unwrap();
        assert_eq!(config.atol(), 0.5);
        assert_eq!(config.fill_policy(), FillPolicy::Nan);
        assert!(config.debug());
        assert_eq!(config.rtol(), f64::EPSILON);
    }

    #[test]
    fn config_global() {
        let atol = global_config().atol();
        assert!(atol > 0.0);
        let snapshot = global_config().clone();
        assert_eq!(snapshot.atol(), atol);
    }
}
