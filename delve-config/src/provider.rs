use crate::{ConfigLoadError, DelveConfig, DelveConfigLoader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Source of configuration snapshots.
///
/// Callers take one snapshot per request and read only that, so a reload
/// never changes settings halfway through a run.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> Arc<DelveConfig>;
}

/// Always hands out the same configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    config: Arc<DelveConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: DelveConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn current(&self) -> Arc<DelveConfig> {
        Arc::clone(&self.config)
    }
}

/// Configuration backed by a file that can be re-read on demand.
#[derive(Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
    current: RwLock<Arc<DelveConfig>>,
}

impl FileConfigProvider {
    /// Load `path` (plus environment overrides); fails if it does not load.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigLoadError> {
        let path = path.into();
        let config = Self::read(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. On failure the previous snapshot stays current.
    pub fn reload(&self) -> Result<Arc<DelveConfig>, ConfigLoadError> {
        match Self::read(&self.path) {
            Ok(config) => {
                let fresh = Arc::new(config);
                let mut slot = self.current.write().unwrap_or_else(|p| p.into_inner());
                *slot = Arc::clone(&fresh);
                tracing::info!(path = %self.path.display(), "config.reloaded");
                Ok(fresh)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "config.reload_failed; keeping previous configuration"
                );
                Err(e)
            }
        }
    }

    fn read(path: &Path) -> Result<DelveConfig, ConfigLoadError> {
        DelveConfigLoader::new().with_file(path).load()
    }
}

impl ConfigProvider for FileConfigProvider {
    fn current(&self) -> Arc<DelveConfig> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }
}
