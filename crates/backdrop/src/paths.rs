use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "BACKDROP_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Backdrop";
const APPLICATION: &str = "backdrop";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// Resolves the config directory from `BACKDROP_CONFIG_DIR` or the
    /// platform's per-user config location.
    pub fn discover() -> Result<Self> {
        if let Some(dir) = env::var_os(ENV_CONFIG_DIR).filter(|value| !value.is_empty()) {
            return Ok(Self {
                config_dir: PathBuf::from(dir),
            });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }
}

/// The explicitly requested file, or the default one under [`AppPaths`].
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(AppPaths::discover()?.config_file()),
    }
}
