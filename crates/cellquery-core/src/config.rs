//! User configuration (`config.toml`).

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

pub const DEFAULT_MAX_EXPRESSION_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra names a unit may not be called (checked case-insensitively).
    pub reserved_names: Vec<String>,
    /// Only pass free variables the host has a binding for.
    pub restrict_free_variables: bool,
    pub max_expression_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reserved_names: Vec::new(),
            restrict_free_variables: true,
            max_expression_bytes: DEFAULT_MAX_EXPRESSION_BYTES,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Config> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Config> {
        let content = read_limited(path, MAX_CONFIG_FILE_BYTES)?;
        let config = Config::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// Read a text file, refusing anything larger than `max` bytes.
pub(crate) fn read_limited(path: &Path, max: u64) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > max {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                max
            ),
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}
