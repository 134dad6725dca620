//! Configuration loading for blocwatch.
//!
//! The config file lives at `~/.blocwatch/config.toml`. A missing file means
//! defaults; a file that exists but cannot be read or parsed is an error.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use blocwatch_watch::AnalyzerConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct BlocwatchConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "blocwatch_watch=debug".
    pub filter: Option<String>,
}

impl BlocwatchConfig {
    /// Load from the default location. Missing file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config.expanded())
    }

    /// Default config file path.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Directory holding the config file and logs.
    #[must_use]
    pub fn dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".blocwatch"))
    }

    /// Expand `${VAR}` references in the analyzer command line.
    fn expanded(mut self) -> Self {
        let analyzer = &mut self.analyzer;
        analyzer.command = expand_env_vars(&analyzer.command);
        analyzer.entrypoint = analyzer
            .entrypoint
            .take()
            .map(|p| PathBuf::from(expand_env_vars(&p.to_string_lossy())));
        for arg in &mut analyzer.args {
            *arg = expand_env_vars(arg);
        }
        for value in analyzer.env.values_mut() {
            *value = expand_env_vars(value);
        }
        self
    }
}

fn config_path() -> Option<PathBuf> {
    BlocwatchConfig::dir().map(|dir| dir.join("config.toml"))
}

/// Replace `${VAR}` with the variable's value; unset variables expand to "".
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, |var| env::var(var).ok())
}

fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty()
            && let Some(replacement) = lookup(var)
        {
            out.push_str(&replacement);
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
