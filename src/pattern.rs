//! `%`-variable patterns used by proxy rules and output naming.
//!
//! A pattern is literal text with `%x` placeholders, where `x` is a single
//! ASCII letter. `%%` produces a literal percent sign, and a `%` not followed
//! by a letter is kept as written, so percent-encoded URLs need no escaping.
//! Which letters are
//! valid depends on where the pattern is used ([`PROXY_VARS`],
//! [`NAMING_VARS`]); patterns are checked against that set when the
//! configuration is loaded, so rendering itself cannot fail.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Variables available to proxy URL templates.
///
/// `d` DOI, `h` hostname, `p` path, `D` directory, `f` file name.
pub const PROXY_VARS: &[char] = &['d', 'h', 'p', 'D', 'f'];

/// Variables available to directory and file naming patterns.
///
/// `i` cite key, `d` DOI, `t` title, `y` year, `a` authors, `o` original file
/// name, `e` extension.
pub const NAMING_VARS: &[char] = &['i', 'd', 't', 'y', 'a', 'o', 'e'];

/// Pattern validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `%x` placeholder names a variable that is not valid here.
    #[error("invalid pattern variable `%{variable}` in `{pattern}` (valid: {valid})")]
    InvalidVar {
        /// The full pattern.
        pattern: String,
        /// The unknown variable letter.
        variable: char,
        /// Comma-separated list of valid variables.
        valid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(char),
}

/// A validated pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Pattern {
    /// Parses `source`, accepting only the variables in `valid_vars`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidVar`] for unknown variables.
    pub fn parse(source: &str, valid_vars: &[char]) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                literal.push(ch);
                continue;
            }
            match chars.next() {
                Some('%') => literal.push('%'),
                Some(variable) if variable.is_ascii_alphabetic() => {
                    if !valid_vars.contains(&variable) {
                        return Err(PatternError::InvalidVar {
                            pattern: source.to_string(),
                            variable,
                            valid: valid_vars
                                .iter()
                                .map(|v| format!("%{v}"))
                                .collect::<Vec<_>>()
                                .join(", "),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Var(variable));
                }
                Some(other) => {
                    literal.push('%');
                    literal.push(other);
                }
                None => literal.push('%'),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The pattern text as written in the configuration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern references `variable`.
    #[must_use]
    pub fn has_var(&self, variable: char) -> bool {
        self.segments.contains(&Segment::Var(variable))
    }

    /// Substitutes values. Returns `None` if any referenced variable has no
    /// value.
    #[must_use]
    pub fn render(&self, values: &PatternValues) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(variable) => out.push_str(values.get(*variable)?),
            }
        }
        Some(out)
    }
}

/// Renders the first pattern whose variables all have values.
#[must_use]
pub fn render_first(patterns: &[Pattern], values: &PatternValues) -> Option<String> {
    patterns.iter().find_map(|pattern| pattern.render(values))
}

/// Variable values for one rendering.
#[derive(Debug, Clone, Default)]
pub struct PatternValues {
    values: HashMap<char, String>,
}

impl PatternValues {
    /// Creates an empty value set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable if `value` is present.
    #[must_use]
    pub fn with(mut self, variable: char, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.values.insert(variable, value.into());
        }
        self
    }

    fn get(&self, variable: char) -> Option<&str> {
        self.values.get(&variable).map(String::as_str)
    }
}
