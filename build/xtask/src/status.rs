// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-log output, formatted like cargo's own status lines so that it
//! blends in with the rest of the build.

use clap::ArgEnum;
use colored::Colorize;

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn apply(self) {
        let enable = match self {
            ColorChoice::Auto => atty::is(atty::Stream::Stderr),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };
        colored::control::set_override(enable);
    }
}

/// Prints `verb` right-aligned and highlighted, followed by `msg`.
pub fn status(verb: &str, msg: impl std::fmt::Display) {
    eprintln!("{:>12} {}", verb.green().bold(), msg);
}

pub fn warn(msg: impl std::fmt::Display) {
    eprintln!("{}: {}", "warning".yellow().bold(), msg);
}

pub fn error(err: &anyhow::Error) {
    eprintln!("{}: {:?}", "error".red().bold(), err);
}
