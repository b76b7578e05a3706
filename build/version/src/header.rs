// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The generated C header that carries the version into the firmware.

use anyhow::{Context, Result};
use std::fmt::Write;
use std::fs;
use std::path::Path;

use crate::Version;

/// Renders a header defining `define` as the version, as a string literal,
/// wrapped in a `{define}_H` include guard.
pub fn render_header(define: &str, version: &Version) -> String {
    let mut out = String::new();
    // Writing to a String can't fail.
    let _ = writeln!(out, "#ifndef {}_H", define);
    let _ = writeln!(out, "#define {}_H", define);
    let _ = writeln!(
        out,
        "#define {} \"{}\"",
        define,
        escape_c(version.as_str())
    );
    let _ = writeln!(out, "#endif // {}_H", define);
    out
}

/// Writes the header to `path`, creating its directory if needed.
///
/// The file is rewritten on every call, even if nothing changed, so anything
/// including it is rebuilt with the current version.
pub fn write_header(
    path: &Path,
    define: &str,
    version: &Version,
) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, render_header(define, version))
        .with_context(|| format!("writing {}", path.display()))
}

fn escape_c(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
