// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Works out which version of the firmware is being built.
//!
//! Version resolution is deliberately infallible: if git can't tell us
//! anything (no git on the `PATH`, not a checkout, no commits, ...) the
//! version is the literal string `unknown` and the build carries on. Nothing
//! in a firmware build should fail just because version metadata is missing.

use anyhow::{bail, Context, Result};
use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

pub mod header;

/// Version reported when source control can't be queried.
pub const UNKNOWN: &str = "unknown";

/// Tag pattern used when the project doesn't configure one.
pub const DEFAULT_TAG_MATCH: &str = "v*";

/// Something that can run an external program and hand back its stdout.
pub trait CommandRunner {
    /// Runs `program` with `args`. Anything other than a clean exit is an
    /// error.
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// Runs commands for real, optionally from a fixed working directory.
#[derive(Clone, Debug, Default)]
pub struct SystemRunner {
    dir: Option<PathBuf>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every command from `dir` rather than the current directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }

        let out = cmd
            .output()
            .with_context(|| format!("could not run {}", program))?;
        if !out.status.success() {
            bail!("{} returned status {}", program, out.status);
        }
        String::from_utf8(out.stdout)
            .with_context(|| format!("{} produced non-UTF-8 output", program))
    }
}

/// Stands in for a real program: every call gets the same canned result.
///
/// The arguments of each call are recorded so callers can check what would
/// have been run.
#[derive(Debug, Default)]
pub struct FixedRunner {
    output: Option<String>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FixedRunner {
    /// Every call succeeds with `output` on stdout.
    pub fn succeeding(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            calls: RefCell::default(),
        }
    }

    /// Every call fails as if the program exited non-zero.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Program and arguments of every call made so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for FixedRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        self.calls.borrow_mut().push(call);

        match &self.output {
            Some(out) => Ok(out.clone()),
            None => bail!("{} returned status exit status: 1", program),
        }
    }
}

/// A resolved firmware version: a git describe string, an abbreviated
/// commit hash, or [`UNKNOWN`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn unknown() -> Self {
        Version(UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    /// Turns raw command output into a version, falling back to
    /// [`UNKNOWN`] on failure or if git printed nothing useful.
    fn from_output(output: Result<String>) -> Self {
        match output {
            Ok(out) if !out.trim().is_empty() => {
                Version(out.trim().to_string())
            }
            _ => Self::unknown(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Takes `s` as the version as-is, for callers that already know it.
impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version(s.to_string())
    }
}

/// Describes the working tree: nearest tag matching `tag_match`, falling
/// back to an abbreviated hash when no tag matches, with `-dirty` appended
/// when there are uncommitted changes.
///
/// Never fails; see the crate docs.
pub fn describe(runner: &dyn CommandRunner, tag_match: &str) -> Version {
    Version::from_output(runner.run(
        "git",
        &["describe", "--tags", "--always", "--dirty", "--match", tag_match],
    ))
}

/// Abbreviated hash of `HEAD`. Never fails; see the crate docs.
pub fn short_hash(runner: &dyn CommandRunner) -> Version {
    Version::from_output(runner.run("git", &["rev-parse", "--short", "HEAD"]))
}

/// Picks between [`describe`] and [`short_hash`].
pub fn resolve(
    runner: &dyn CommandRunner,
    tag_match: &str,
    short: bool,
) -> Version {
    if short {
        short_hash(runner)
    } else {
        describe(runner, tag_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_output_is_trimmed_only() {
        let runner = FixedRunner::succeeding("  v1.2.3-4-gabcdef0\n");
        let version = describe(&runner, DEFAULT_TAG_MATCH);
        assert_eq!(version.as_str(), "v1.2.3-4-gabcdef0");
        assert!(!version.is_unknown());
    }

    #[test]
    fn describe_asks_for_matching_tags() {
        let runner = FixedRunner::succeeding("v2.0.0\n");
        describe(&runner, "v*");
        assert_eq!(
            runner.calls(),
            vec![vec![
                "git", "describe", "--tags", "--always", "--dirty", "--match",
                "v*"
            ]]
        );
    }

    #[test]
    fn failed_describe_is_unknown() {
        let runner = FixedRunner::failing();
        assert_eq!(describe(&runner, DEFAULT_TAG_MATCH).as_str(), UNKNOWN);
        assert_eq!(short_hash(&runner).as_str(), UNKNOWN);
    }

    #[test]
    fn empty_output_is_unknown() {
        let runner = FixedRunner::succeeding("\n");
        assert!(describe(&runner, DEFAULT_TAG_MATCH).is_unknown());
    }

    #[test]
    fn short_hash_uses_rev_parse() {
        let runner = FixedRunner::succeeding("abc1234\n");
        let version = resolve(&runner, DEFAULT_TAG_MATCH, true);
        assert_eq!(version.to_string(), "abc1234");
        assert_eq!(
            runner.calls(),
            vec![vec!["git", "rev-parse", "--short", "HEAD"]]
        );
    }

    #[test]
    fn known_versions_convert() {
        assert_eq!(Version::from("v1.0.0").as_str(), "v1.0.0");
        assert_eq!(Version::from(UNKNOWN), Version::unknown());
    }

    #[test]
    fn missing_program_is_unknown() {
        let runner = SystemRunner::new();
        let out = runner.run("this-program-does-not-exist-anywhere", &[]);
        assert!(out.is_err());
        assert!(Version::from_output(out).is_unknown());
    }
}
