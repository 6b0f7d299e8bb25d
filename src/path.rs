// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where plan files and the settings file live when the user does
//! not say otherwise.

use std::path::{Path, PathBuf};

/// Determine default absolute path to plan directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/pickplan` as the default
/// directory for plan files. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_plan_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("pickplan"))
        .ok_or(NoWayHome)
}

/// Determine absolute path to settings file.
///
/// Uses `$XDG_CONFIG_HOME/pickplan/config.toml`. The file is optional.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn settings_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("pickplan").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Path of the plan file for a branch inside a plan directory.
///
/// Branch names containing slashes map onto subdirectories.
pub fn plan_file(dir: impl AsRef<Path>, branch: impl AsRef<str>) -> PathBuf {
    dir.as_ref().join(format!("{}.plan", branch.as_ref()))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
