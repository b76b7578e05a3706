// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the per-project hook configuration, relative to the project root.
pub const CONFIG_FILE: &str = "firmware.toml";

/// The handful of build-framework variables the hooks care about.
///
/// The host build system knows these as substitution variables; `xtask`
/// takes them once, from its flags or the environment, and they are passed
/// around explicitly from there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildEnv {
    /// Directory the build framework writes its outputs into.
    pub build_dir: PathBuf,
    /// Name of the build environment (board / target) being built.
    pub name: String,
    /// Root of the firmware project.
    pub project_dir: PathBuf,
}

impl BuildEnv {
    pub fn new(
        build_dir: impl Into<PathBuf>,
        name: impl Into<String>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            build_dir: build_dir.into(),
            name: name.into(),
            project_dir: project_dir.into(),
        }
    }

    /// Resolves `path` against the project root unless it is already
    /// absolute.
    pub fn project_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.project_dir.join(path)
    }

    /// Resolves `path` against the build output directory unless it is
    /// already absolute.
    pub fn build_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.build_dir.join(path)
    }
}

/// Project-wide settings for the hooks, read from `firmware.toml`.
///
/// Every section and field is optional; anything left out takes the value
/// the firmware project has always used.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    pub version: VersionConfig,
    pub archive: ArchiveConfig,
    pub filter: FilterConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct VersionConfig {
    /// Generated header, relative to the project root.
    pub header: PathBuf,
    /// Macro the header defines.
    pub define: String,
    /// Tag pattern handed to `git describe --match`.
    #[serde(rename = "match")]
    pub tag_match: String,
    /// Use the abbreviated HEAD hash rather than a describe string.
    pub short: bool,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            header: PathBuf::from("src").join("rats_version.h"),
            define: "RATS_VERSION".to_string(),
            tag_match: "v*".to_string(),
            short: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Archive directory, relative to the project root.
    pub dir: PathBuf,
    /// Build output to archive, relative to the build directory.
    pub artifact: PathBuf,
    /// Stamp archived images with the build time. Without the stamp each
    /// build overwrites the previous image of the same version.
    pub timestamp: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("hex"),
            artifact: PathBuf::from("firmware.hex"),
            timestamp: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Glob patterns of sources to keep out of the build.
    pub exclude: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["*/pro-rf-duplex.cpp".to_string()],
        }
    }
}

impl HookConfig {
    /// Loads `firmware.toml` from `project_dir`, or the defaults if the
    /// project doesn't have one.
    pub fn load(project_dir: &Path) -> Result<Self> {
        Ok(toml_from_file(&project_dir.join(CONFIG_FILE))?.unwrap_or_default())
    }
}

/// Parse the contents of a file as toml.
///
/// Returns:
///
/// - `Ok(Some(x))` if the file exists and the contents deserialized
///   correctly.
/// - `Ok(None)` if the file does not exist.
/// - `Err(e)` if the file couldn't be read or deserialization failed.
pub fn toml_from_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("reading {}", path.display()))
        }
        Ok(t) => t,
    };

    let rval = toml::from_str(&text)
        .with_context(|| format!("deserializing {}", path.display()))?;
    Ok(Some(rval))
}
