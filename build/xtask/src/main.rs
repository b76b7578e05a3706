// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use build_archive::Outcome;
use build_filter::SourceFilter;
use build_util::{BuildEnv, HookConfig};
use build_version::header::write_header;
use build_version::{SystemRunner, Version};

mod status;

use status::ColorChoice;

#[derive(Debug, Parser)]
#[clap(max_term_width = 80, about = "build hooks for the firmware project")]
struct Xtask {
    /// Root of the firmware project.
    #[clap(
        long,
        env = "PROJECT_DIR",
        default_value = ".",
        global = true,
        parse(from_os_str)
    )]
    project_dir: PathBuf,

    /// Directory the build writes its outputs into.
    #[clap(long, env = "BUILD_DIR", global = true, parse(from_os_str))]
    build_dir: Option<PathBuf>,

    /// Name of the build environment being built.
    #[clap(long = "env", env = "BUILD_ENV", global = true)]
    env_name: Option<String>,

    #[clap(long, arg_enum, default_value = "auto", global = true)]
    color: ColorChoice,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the version of the working tree.
    Version {
        /// Print the abbreviated commit hash instead of a describe string.
        #[clap(long)]
        short: bool,
    },

    /// Regenerate the version header (pre-build hook).
    Header {
        /// Header to write, overriding firmware.toml.
        #[clap(long, parse(from_os_str))]
        out: Option<PathBuf>,

        /// Macro to define, overriding firmware.toml.
        #[clap(long)]
        define: Option<String>,
    },

    /// Copy the firmware image into the archive (post-build hook).
    Archive {
        /// Image to archive, relative to the build directory.
        #[clap(long, parse(from_os_str))]
        artifact: Option<PathBuf>,

        /// Archive directory, relative to the project directory.
        #[clap(long, parse(from_os_str))]
        dir: Option<PathBuf>,
    },

    /// Print the sources that should be compiled, one per line.
    Filter {
        #[clap(required = true, parse(from_os_str))]
        sources: Vec<PathBuf>,
    },
}

impl Xtask {
    fn build_env(&self) -> Result<BuildEnv> {
        let build_dir = self.build_dir.clone().ok_or_else(|| {
            anyhow!("no build directory; pass --build-dir or set BUILD_DIR")
        })?;
        let name = self.env_name.clone().ok_or_else(|| {
            anyhow!("no build environment; pass --env or set BUILD_ENV")
        })?;
        Ok(BuildEnv::new(build_dir, name, &self.project_dir))
    }

    fn resolve_version(&self, config: &HookConfig, short: bool) -> Version {
        let runner = SystemRunner::in_dir(&self.project_dir);
        let version = build_version::resolve(
            &runner,
            &config.version.tag_match,
            short || config.version.short,
        );
        if version.is_unknown() {
            status::warn("could not determine version from git");
        }
        version
    }
}

fn main() {
    let xtask = Xtask::parse();
    xtask.color.apply();

    if let Err(e) = run(xtask) {
        status::error(&e);
        std::process::exit(1);
    }
}

fn run(xtask: Xtask) -> Result<()> {
    let config = HookConfig::load(&xtask.project_dir)?;

    match &xtask.cmd {
        Command::Version { short } => {
            println!("{}", xtask.resolve_version(&config, *short));
        }
        Command::Header { out, define } => {
            let path = xtask
                .project_dir
                .join(out.as_ref().unwrap_or(&config.version.header));
            let define = define.as_ref().unwrap_or(&config.version.define);
            let version = xtask.resolve_version(&config, false);

            write_header(&path, define, &version)?;
            status::status(
                "Generated",
                format!(
                    "{}: #define {} \"{}\"",
                    path.display(),
                    define,
                    version
                ),
            );
        }
        Command::Archive { artifact, dir } => {
            let build_env = xtask.build_env()?;
            let mut archive = config.archive.clone();
            if let Some(artifact) = artifact {
                archive.artifact = artifact.clone();
            }
            if let Some(dir) = dir {
                archive.dir = dir.clone();
            }
            let version = xtask.resolve_version(&config, false);

            match build_archive::archive(
                &build_env,
                &archive,
                &version,
                chrono::Utc::now(),
            )? {
                Outcome::Copied { from, to, bytes } => status::status(
                    "Archived",
                    format!(
                        "{} to {} ({} bytes)",
                        from.display(),
                        to.display(),
                        bytes
                    ),
                ),
                Outcome::Missing { artifact } => status::warn(format!(
                    "{} not found, nothing archived",
                    artifact.display()
                )),
            }
        }
        Command::Filter { sources } => {
            let filter = SourceFilter::from_config(&config.filter);
            filter_sources(&filter, sources, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}

/// Writes each source that survives `filter` to `out`, one per line, and
/// reports the ones it drops.
fn filter_sources(
    filter: &SourceFilter,
    sources: &[PathBuf],
    out: &mut impl Write,
) -> Result<()> {
    for source in sources {
        match filter.apply(source.as_path()).into_option() {
            Some(path) => writeln!(out, "{}", path.display())?,
            None => status::status(
                "Excluding",
                format!("{} from build", source.display()),
            ),
        }
    }
    Ok(())
}
