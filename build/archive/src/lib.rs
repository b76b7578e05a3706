// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keeps a copy of every firmware image we build.
//!
//! Each archived image is named `{env}-{timestamp}-{version}.{ext}`, so the
//! archive directory only ever grows; nothing here deletes an old image.
//! Projects that turn the timestamp off get `{env}_{version}.{ext}` instead,
//! and a rebuild of the same version replaces its image.
//! Archiving is best effort: a build that didn't produce an image is
//! reported, not failed.

use anyhow::{Context, Result};
use build_util::{ArchiveConfig, BuildEnv};
use build_version::Version;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// `strftime` format of the timestamp in archive names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Extension used when the artifact doesn't have one.
const DEFAULT_EXTENSION: &str = "hex";

/// What happened to the build output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Copied { from: PathBuf, to: PathBuf, bytes: u64 },
    /// The build didn't leave an artifact where we expected one.
    Missing { artifact: PathBuf },
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Name of an archived image. Without a timestamp the name only depends on
/// the environment and version, and a later build overwrites an earlier one.
pub fn archive_name(
    env: &str,
    timestamp: Option<&str>,
    version: &str,
    extension: &str,
) -> String {
    match timestamp {
        Some(ts) => format!("{}-{}-{}.{}", env, ts, version, extension),
        None => format!("{}_{}.{}", env, version, extension),
    }
}

/// Copies the build's artifact into the archive directory, named for
/// `version` and, if the config asks for it, stamped with `now`.
pub fn archive(
    build_env: &BuildEnv,
    config: &ArchiveConfig,
    version: &Version,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let artifact = build_env.build_path(&config.artifact);
    let dest_dir = build_env.project_path(&config.dir);
    let stamp = config.timestamp.then(|| timestamp(now));
    let name = archive_name(
        &build_env.name,
        stamp.as_deref(),
        version.as_str(),
        extension(&artifact),
    );
    copy_into(&artifact, &dest_dir, &name)
}

fn extension(artifact: &Path) -> &str {
    artifact
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(DEFAULT_EXTENSION)
}

fn copy_into(artifact: &Path, dest_dir: &Path, name: &str) -> Result<Outcome> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    if !artifact.is_file() {
        return Ok(Outcome::Missing {
            artifact: artifact.to_path_buf(),
        });
    }

    let dest = dest_dir.join(name);
    let bytes = fs::copy(artifact, &dest).with_context(|| {
        format!("copying {} to {}", artifact.display(), dest.display())
    })?;
    Ok(Outcome::Copied {
        from: artifact.to_path_buf(),
        to: dest,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn version(s: &str) -> Version {
        Version::from(s)
    }

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn name_with_timestamp() {
        assert_eq!(
            archive_name("esp32", Some("20240101-120000"), "abc1234", "hex"),
            "esp32-20240101-120000-abc1234.hex"
        );
    }

    #[test]
    fn name_without_timestamp() {
        assert_eq!(
            archive_name("teensy41", None, "v1.0.0-dirty", "hex"),
            "teensy41_v1.0.0-dirty.hex"
        );
        assert_eq!(
            archive_name("esp32", None, "abc1234", "hex"),
            "esp32_abc1234.hex"
        );
    }

    #[test]
    fn timestamp_is_utc_compact() {
        assert_eq!(timestamp(new_year()), "20240101-120000");
    }

    #[test]
    fn missing_artifact_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let env = BuildEnv::new(dir.path().join("build"), "esp32", dir.path());
        let config = ArchiveConfig::default();

        let outcome =
            archive(&env, &config, &version("abc1234"), new_year()).unwrap();

        assert_eq!(
            outcome,
            Outcome::Missing {
                artifact: dir.path().join("build").join("firmware.hex")
            }
        );
        assert_eq!(fs::read_dir(dir.path().join("hex")).unwrap().count(), 0);
    }

    #[test]
    fn copies_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        fs::create_dir_all(&build).unwrap();
        let image = b":10000000DEADBEEF\n:00000001FF\n";
        fs::write(build.join("firmware.hex"), image).unwrap();
        let env = BuildEnv::new(&build, "esp32", dir.path());

        let outcome = archive(
            &env,
            &ArchiveConfig::default(),
            &version("abc1234"),
            new_year(),
        )
        .unwrap();

        let dest = dir
            .path()
            .join("hex")
            .join("esp32-20240101-120000-abc1234.hex");
        assert_eq!(
            outcome,
            Outcome::Copied {
                from: build.join("firmware.hex"),
                to: dest.clone(),
                bytes: image.len() as u64,
            }
        );
        assert_eq!(fs::read(dest).unwrap(), image);
    }

    #[test]
    fn archives_accumulate() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("firmware.hex"), b"image").unwrap();
        let env = BuildEnv::new(&build, "esp32", dir.path());
        let config = ArchiveConfig::default();
        let v = version("abc1234");

        archive(&env, &config, &v, new_year()).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 1).unwrap();
        archive(&env, &config, &v, later).unwrap();

        assert_eq!(fs::read_dir(dir.path().join("hex")).unwrap().count(), 2);
    }

    #[test]
    fn extension_follows_artifact() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("firmware.bin"), b"image").unwrap();
        let env = BuildEnv::new(&build, "esp32", dir.path());
        let config = ArchiveConfig {
            artifact: PathBuf::from("firmware.bin"),
            ..ArchiveConfig::default()
        };

        match archive(&env, &config, &version("v2.0.0"), new_year()).unwrap() {
            Outcome::Copied { to, .. } => assert_eq!(
                to.file_name().unwrap(),
                "esp32-20240101-120000-v2.0.0.bin"
            ),
            other => panic!("expected a copy, got {:?}", other),
        }
    }

    #[test]
    fn untimestamped_archive_overwrites() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        fs::create_dir_all(&build).unwrap();
        let env = BuildEnv::new(&build, "esp32", dir.path());
        let config = ArchiveConfig {
            timestamp: false,
            ..ArchiveConfig::default()
        };
        let v = version("abc1234");

        fs::write(build.join("firmware.hex"), b"first").unwrap();
        archive(&env, &config, &v, new_year()).unwrap();
        fs::write(build.join("firmware.hex"), b"second").unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 1).unwrap();
        let outcome = archive(&env, &config, &v, later).unwrap();

        let dest = dir.path().join("hex").join("esp32_abc1234.hex");
        assert_eq!(
            outcome,
            Outcome::Copied {
                from: build.join("firmware.hex"),
                to: dest.clone(),
                bytes: 6,
            }
        );
        assert_eq!(fs::read(dest).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path().join("hex")).unwrap().count(), 1);
    }
}
