//! Compiler configuration parsed from `shapec.toml` files.

use std::path::Path;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "shapec.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub language: Option<LanguageConfig>,
    #[serde(default)]
    pub limits: Limits,
    /// Bindings wrapped around every checked program, outermost first.
    #[serde(default)]
    pub prelude: Vec<PreludeBinding>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("this configuration requires language version {required}, but this is {actual}")]
    UnsupportedVersion { required: VersionReq, actual: Version },
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_contents = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&file_contents)?;
        config.check_version()?;
        Ok(config)
    }

    /// Checks that the requested language version is satisfied by this
    /// compiler.
    pub fn check_version(&self) -> Result<(), ConfigError> {
        let Some(LanguageConfig { version: required }) = &self.language else {
            return Ok(());
        };

        let actual = language_version();
        match required.matches(&actual) {
            true => Ok(()),
            false => Err(ConfigError::UnsupportedVersion {
                required: required.clone(),
                actual,
            }),
        }
    }
}

/// The language version implemented by this compiler.
pub fn language_version() -> Version {
    // the crate version is always valid semver
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Version::new(0, 0, 0))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "language")]
pub struct LanguageConfig {
    pub version: VersionReq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// How many levels of nested implicit candidates may be resolved.
    pub implicit_depth: usize,
    /// How many identifier definitions the partial evaluator may unfold.
    pub evaluation_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            implicit_depth: 8,
            evaluation_depth: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreludeBinding {
    pub name: Box<str>,
    /// The source text of the bound expression.
    pub value: Box<str>,
}
