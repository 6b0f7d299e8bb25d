// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Settings are layered, with later layers winning:
//!
//! 1. Built-in defaults.
//! 2. Settings file at `$XDG_CONFIG_HOME/pickplan/config.toml`.
//! 3. Git configuration, i.e., `pickplan.dir` and `pickplan.pattern`.
//!
//! A settings file looks like this:
//!
//! ```toml
//! dir = "$HOME/plans"
//! patterns = ['\(cherry picked from commit ([0-9a-f]+)\)']
//! ```
//!
//! The `pickplan.pattern` Git setting is multi-valued. When it is set at all,
//! its values replace the pattern list of earlier layers.

use crate::{
    backend::{Backend, BackendError},
    detect::{DetectError, PatternDetector, DEFAULT_PATTERN},
    path::{default_plan_dir, plan_file, settings_file, NoWayHome},
};

use serde::Deserialize;
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Git setting naming plan directory.
pub const DIR_KEY: &str = "pickplan.dir";

/// Git setting listing provenance patterns.
pub const PATTERN_KEY: &str = "pickplan.pattern";

/// Settings file layout.
///
/// Every field is optional, missing fields leave earlier layers alone.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    /// Directory holding default plan files.
    pub dir: Option<PathBuf>,

    /// Regular expressions capturing commit ids of applied commits.
    pub patterns: Option<Vec<String>>,
}

impl FromStr for SettingsFile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut file: SettingsFile = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on plan directory field.
        if let Some(dir) = file.dir.take() {
            file.dir = Some(expand_path(dir.to_string_lossy())?);
        }

        Ok(file)
    }
}

/// Resolved settings.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Settings {
    /// Directory holding default plan files.
    pub dir: PathBuf,

    /// Regular expressions capturing commit ids of applied commits.
    pub patterns: Vec<String>,
}

impl Settings {
    /// Construct settings from built-in defaults.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if no default plan directory can
    ///   be determined.
    pub fn try_default() -> Result<Self> {
        Ok(Self::new(default_plan_dir()?))
    }

    /// Construct settings with default patterns for target plan directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            patterns: vec![DEFAULT_PATTERN.into()],
        }
    }

    /// Load every settings layer.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if default paths cannot be
    ///   determined.
    /// - Return [`ConfigError::Read`] if settings file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    /// - Return [`ConfigError::Backend`] if Git configuration cannot be read.
    #[instrument(skip(backend), level = "debug")]
    pub fn load(backend: &impl Backend) -> Result<Self> {
        let settings = Self::try_default()?;
        let path = settings_file()?;
        let settings = match read_settings_file(&path)? {
            Some(file) => settings.with_file(file),
            None => settings,
        };

        settings.with_backend(backend)
    }

    /// Layer settings file on top.
    pub fn with_file(mut self, file: SettingsFile) -> Self {
        if let Some(dir) = file.dir {
            self.dir = dir;
        }

        if let Some(patterns) = file.patterns {
            self.patterns = patterns;
        }

        self
    }

    /// Layer Git configuration on top.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Backend`] if Git configuration cannot be read.
    /// - Return [`ConfigError::ShellExpansion`] if plan directory cannot be
    ///   expanded.
    pub fn with_backend(mut self, backend: &impl Backend) -> Result<Self> {
        if let Some(dir) = backend.config_value(DIR_KEY)? {
            self.dir = expand_path(dir)?;
        }

        let patterns = backend.config_values(PATTERN_KEY)?;
        if !patterns.is_empty() {
            self.patterns = patterns;
        }

        Ok(self)
    }

    /// Default plan file for currently checked out branch.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Backend`] if current branch is unknown.
    pub fn default_plan_file(&self, backend: &impl Backend) -> Result<PathBuf> {
        Ok(plan_file(&self.dir, backend.current_branch()?))
    }

    /// Build provenance detector from configured patterns.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Detect`] if a pattern is invalid.
    pub fn detector(&self) -> Result<PatternDetector> {
        Ok(PatternDetector::new(&self.patterns)?)
    }
}

fn read_settings_file(path: &Path) -> Result<Option<SettingsFile>> {
    if !path.exists() {
        debug!("no settings file at {:?}", path.display());
        return Ok(None);
    }

    let data = read_to_string(path).map_err(|err| ConfigError::Read {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(Some(data.parse()?))
}

fn expand_path(path: impl AsRef<str>) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Settings file cannot be read from.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Default paths cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Configured pattern is unusable.
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Git configuration cannot be read.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
