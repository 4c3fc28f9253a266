use crate::common::Result;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Environment variables with this prefix override file and default settings,
/// e.g. `QUERYRT_WORKERS=8`.
pub const ENV_PREFIX: &str = "QUERYRT";
/// Worker threads are named `{DEFAULT_THREAD_NAME}-{index}` unless configured.
pub const DEFAULT_THREAD_NAME: &str = "queryrt-worker";
/// Used when the platform can't report its available parallelism.
pub const FALLBACK_WORKERS: usize = 4;

/// Tunables of the shared worker pool. Generated programs never see these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads. 0 means one per available core.
    pub workers: usize,
    /// Maximum number of queued tasks before `submit` blocks. 0 means unbounded.
    /// Tasks submitted by a worker into its own full queue run inline instead.
    pub queue_capacity: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 0,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Loads the configuration from defaults, then the optional file, then the
    /// environment. Later sources override earlier ones.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("workers", defaults.workers as i64)?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default("thread_name", defaults.thread_name)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The configured worker count, resolving 0 to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(FALLBACK_WORKERS),
            n => n,
        }
    }

    /// The queue bound, if any.
    pub fn queue_bound(&self) -> Option<usize> {
        match self.queue_capacity {
            0 => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_errors;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_defaults() {
        let config = RuntimeConfig::load(None).unwrap();
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
        assert!(config.resolved_workers() >= 1);
    }

    #[test]
    fn test_load_from_file() {
        let file = config_file("workers = 3\nqueue_capacity = 16\nthread_name = \"branch\"\n");
        let config = RuntimeConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.resolved_workers(), 3);
        assert_eq!(config.queue_bound(), Some(16));
        assert_eq!(config.thread_name, "branch");
    }

    #[test]
    fn test_file_keeps_unset_defaults() {
        let file = config_file("workers = 2\n");
        let config = RuntimeConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_bound(), None);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_errors!(RuntimeConfig::load(Some(&missing)));
    }

    #[test]
    fn test_malformed_file_errors() {
        let file = config_file("workers = \"many\"\n");
        assert_errors!(RuntimeConfig::load(Some(file.path())));
    }
}
