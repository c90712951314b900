//! `$identifier` string substitution.
//!
//! Supported placeholders:
//!
//! - `$name` and `${name}`: replaced by the value of `name`
//! - `$$`: a literal `$`
//!
//! Identifiers start with a letter or underscore and continue with letters,
//! digits or underscores. Substitution is "safe": a placeholder without a
//! value, or a stray `$`, is left untouched instead of failing.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_a-zA-Z][_a-zA-Z0-9]*)|\{([_a-zA-Z][_a-zA-Z0-9]*)\})")
        .expect("placeholder pattern is a valid regex")
});

/// A substitution pattern such as `"${Environment}-bucket"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution<'a> {
    pattern: &'a str,
}

impl<'a> Substitution<'a> {
    /// Wrap a pattern string.
    pub const fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
        }
    }

    /// Identifiers used by the pattern, in first-use order, without duplicates.
    pub fn identifiers(&self) -> Vec<&'a str> {
        let mut identifiers: Vec<&'a str> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(self.pattern) {
            if let Some(name) = caps.get(2).or_else(|| caps.get(3))
                && !identifiers.contains(&name.as_str())
            {
                identifiers.push(name.as_str());
            }
        }
        identifiers
    }

    /// Replace placeholders with values from `lookup`, leaving unknown ones as is.
    pub fn safe_substitute<'v, F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<&'v str>,
    {
        PLACEHOLDER
            .replace_all(self.pattern, |caps: &Captures<'_>| {
                if caps.get(1).is_some() {
                    return "$".to_string();
                }
                let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
                match lookup(name) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
