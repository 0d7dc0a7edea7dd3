//! Pattern matching for object keys
//!
//! Supports wildcards:
//! - `*` - Matches any run of characters within one path segment (e.g., `split-*.txt`)
//! - `**` - Matches across segments recursively (e.g., `exports/**/part-*.csv`)
//! - `?` - Matches exactly one character within a segment
//! - `[...]` - Character class, `[!...]` negates (e.g., `part-0[0-5].txt`)
//!
//! A pattern without any wildcard is a literal key and only matches itself.

use crate::error::{Result, VfsError};
use regex::Regex;

/// Compiled matcher for object keys
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Exact key, no wildcards
    Literal(String),
    /// Glob compiled to an anchored regex
    Glob { source: String, regex: Regex },
}

impl KeyPattern {
    /// Compile a key pattern
    ///
    /// # Examples
    /// ```
    /// use objfile::KeyPattern;
    ///
    /// let p = KeyPattern::new("data/part-*.txt").unwrap();
    /// assert!(p.matches("data/part-0001.txt"));
    /// assert!(!p.matches("data/nested/part-0001.txt"));
    ///
    /// let p = KeyPattern::new("data/**/part-*.txt").unwrap();
    /// assert!(p.matches("data/nested/part-0001.txt"));
    /// ```
    pub fn new(pattern: &str) -> Result<Self> {
        if !Self::is_glob(pattern) {
            return Ok(KeyPattern::Literal(pattern.to_string()));
        }

        let expr = Self::glob_to_regex(pattern)?;
        let regex = Regex::new(&expr)
            .map_err(|e| VfsError::InvalidUri(format!("bad pattern '{}': {}", pattern, e)))?;

        Ok(KeyPattern::Glob {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether a string contains glob metacharacters
    pub fn is_glob(pattern: &str) -> bool {
        pattern.contains(['*', '?', '['])
    }

    /// Check if a key matches this pattern
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Literal(literal) => literal == key,
            KeyPattern::Glob { regex, .. } => regex.is_match(key),
        }
    }

    /// The pattern text as given
    pub fn as_str(&self) -> &str {
        match self {
            KeyPattern::Literal(literal) => literal,
            KeyPattern::Glob { source, .. } => source,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, KeyPattern::Literal(_))
    }

    /// Leading part of the pattern that contains no wildcard
    ///
    /// Every matching key starts with this prefix, so backends can use it
    /// to prune listings.
    pub fn literal_prefix(&self) -> &str {
        match self {
            KeyPattern::Literal(literal) => literal,
            KeyPattern::Glob { source, .. } => {
                let end = source.find(['*', '?', '[']).unwrap_or(source.len());
                &source[..end]
            }
        }
    }

    /// Translate a glob into an anchored regular expression
    fn glob_to_regex(pattern: &str) -> Result<String> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');

        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => {
                    if chars.get(i + 1) == Some(&'*') {
                        // `**/` may also match zero directories
                        if chars.get(i + 2) == Some(&'/') {
                            expr.push_str("(?:.*/)?");
                            i += 3;
                        } else {
                            expr.push_str(".*");
                            i += 2;
                        }
                    } else {
                        expr.push_str("[^/]*");
                        i += 1;
                    }
                }
                '?' => {
                    expr.push_str("[^/]");
                    i += 1;
                }
                '[' => {
                    let (class, next) = Self::parse_class(&chars, i, pattern)?;
                    expr.push_str(&class);
                    i = next;
                }
                c => {
                    expr.push_str(&regex::escape(&c.to_string()));
                    i += 1;
                }
            }
        }

        expr.push('$');
        Ok(expr)
    }

    /// Parse a `[...]` class starting at `start`, returning the regex class and
    /// the index just past the closing bracket
    fn parse_class(chars: &[char], start: usize, pattern: &str) -> Result<(String, usize)> {
        let mut i = start + 1;
        let mut class = String::from("[");

        if matches!(chars.get(i), Some('!') | Some('^')) {
            class.push('^');
            i += 1;
        }

        // A leading `]` is a literal member
        if chars.get(i) == Some(&']') {
            class.push_str("\\]");
            i += 1;
        }

        while i < chars.len() && chars[i] != ']' {
            match chars[i] {
                '\\' | '[' | '^' | '&' | '~' => {
                    class.push('\\');
                    class.push(chars[i]);
                }
                c => class.push(c),
            }
            i += 1;
        }

        if i >= chars.len() {
            return Err(VfsError::InvalidUri(format!(
                "unterminated character class in pattern '{}'",
                pattern
            )));
        }

        class.push(']');
        Ok((class, i + 1))
    }
}
