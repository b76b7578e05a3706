// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keeps particular source files out of the firmware build.
//!
//! The build framework hands every candidate source to the filter; whatever
//! comes back as [`Disposition::Keep`] is compiled, anything else is
//! dropped.

use build_util::FilterConfig;
use std::path::Path;

/// Verdict on one candidate source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition<T> {
    /// Pass the candidate through untouched.
    Keep(T),
    /// Leave it out of the build.
    Exclude,
}

impl<T> Disposition<T> {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Disposition::Exclude)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Disposition::Keep(t) => Some(t),
            Disposition::Exclude => None,
        }
    }
}

/// A shell-style pattern over source paths.
///
/// `*` matches any run of characters, path separators included, and `?`
/// matches exactly one. `[...]` matches one character from a set of
/// characters and `a-z` ranges; `[!...]` or `[^...]` matches one character
/// outside it. A `[` with no closing `]` is literal, as is everything else.
/// Backslashes in candidate paths are treated as `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    tokens: Vec<Token>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(char),
    Any,
    Star,
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::Any => true,
            Token::Star => false,
            Token::Class { negated, ranges } => {
                let hit = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
                hit != *negated
            }
        }
    }
}

impl Pattern {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => tokens.push(Token::Star),
                '?' => tokens.push(Token::Any),
                '[' => {
                    if let Some((class, next)) = parse_class(&chars, i + 1) {
                        tokens.push(class);
                        i = next;
                        continue;
                    }
                    tokens.push(Token::Literal('['));
                }
                c => tokens.push(Token::Literal(c)),
            }
            i += 1;
        }
        Self { tokens }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let candidate: Vec<char> = path
            .to_string_lossy()
            .chars()
            .map(|c| if c == '\\' { '/' } else { c })
            .collect();
        wildcard_match(&self.tokens, &candidate)
    }
}

/// Parses the body of a `[...]` class starting just past the `[`. Returns
/// the class and the index after its `]`, or `None` if it never closes.
/// A `]` straight after the opening (or after `!`/`^`) is a member.
fn parse_class(chars: &[char], mut i: usize) -> Option<(Token, usize)> {
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }
    let body_start = i;
    let mut ranges = Vec::new();
    loop {
        let c = *chars.get(i)?;
        if c == ']' && i > body_start {
            return Some((Token::Class { negated, ranges }, i + 1));
        }
        match (chars.get(i + 1), chars.get(i + 2)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                ranges.push((c, hi));
                i += 3;
            }
            _ => {
                ranges.push((c, c));
                i += 1;
            }
        }
    }
}

/// Iterative wildcard match; on a mismatch we retry from the most recent
/// `*`, letting it swallow one more character.
fn wildcard_match(pat: &[Token], s: &[char]) -> bool {
    let (mut p, mut i) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while i < s.len() {
        match pat.get(p) {
            Some(Token::Star) => {
                star = Some((p, i));
                p += 1;
            }
            Some(t) if t.matches(s[i]) => {
                p += 1;
                i += 1;
            }
            _ => match star {
                Some((sp, si)) => {
                    p = sp + 1;
                    i = si + 1;
                    star = Some((sp, si + 1));
                }
                None => return false,
            },
        }
    }

    pat[p..].iter().all(|t| *t == Token::Star)
}

/// The set of exclusion patterns registered for a build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceFilter {
    patterns: Vec<Pattern>,
}

impl SourceFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| Pattern::new(p.as_ref()))
                .collect(),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(&config.exclude)
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Decides whether `source` is compiled. A source is excluded if any
    /// pattern matches it.
    pub fn apply<T: AsRef<Path>>(&self, source: T) -> Disposition<T> {
        if self.patterns.iter().any(|p| p.matches(source.as_ref())) {
            Disposition::Exclude
        } else {
            Disposition::Keep(source)
        }
    }
}
