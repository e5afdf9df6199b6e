//! Ignore-file handling for build contexts.
//!
//! Implements the `.dockerignore` dialect: one pattern per line, `#` comments,
//! `!` negation, `*`, `?`, `**` and character classes. A rule matches a path
//! when it matches the path itself or any of its parent directories, and the
//! last matching rule wins.

use std::path::Path;

use a3s_forge_core::error::{ForgeError, Result};
use regex::Regex;

/// Name of the ignore file looked up in a build context.
pub const IGNORE_FILE: &str = ".dockerignore";

/// A single compiled ignore rule.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    /// Cleaned pattern text (without `!` and trailing `/`)
    pattern: String,
    /// `!pattern`: re-includes matching paths
    negated: bool,
    /// `pattern/`: only matches directories
    dir_only: bool,
    regex: Regex,
}

impl IgnoreRule {
    /// Parse one ignore-file line. Returns `None` for blanks and comments.
    fn parse(line: &str) -> Result<Option<Self>> {
        let mut text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            return Ok(None);
        }

        let negated = text.starts_with('!');
        if negated {
            text = text[1..].trim();
        }

        let dir_only = text.len() > 1 && text.ends_with('/');
        let pattern = clean_pattern(text);
        if pattern.is_empty() {
            if negated {
                return Err(ForgeError::InvalidIgnorePattern {
                    pattern: line.trim().to_string(),
                    message: "illegal exclusion pattern".to_string(),
                });
            }
            return Ok(None);
        }

        let regex = Regex::new(&pattern_to_regex(&pattern)).map_err(|e| {
            ForgeError::InvalidIgnorePattern {
                pattern: line.trim().to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Some(Self {
            pattern,
            negated,
            dir_only,
            regex,
        }))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// Match against the path itself, then against each parent directory.
    fn matches(&self, path: &str, is_dir: bool) -> bool {
        if (is_dir || !self.dir_only) && self.regex.is_match(path) {
            return true;
        }
        path.match_indices('/')
            .any(|(idx, _)| self.regex.is_match(&path[..idx]))
    }
}

/// Compiled, immutable ignore predicate.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    rules: Vec<IgnoreRule>,
}

impl IgnoreFilter {
    /// A filter that excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile an ordered list of patterns.
    pub fn compile<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for pattern in patterns {
            if let Some(rule) = IgnoreRule::parse(pattern.as_ref())? {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// Compile the contents of an ignore file.
    pub fn parse(content: &str) -> Result<Self> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        Self::compile(content.lines())
    }

    /// Read and compile an ignore file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::pack(path, format!("failed to read ignore file: {}", e))
        })?;
        Self::parse(&content)
    }

    /// Load `<dir>/.dockerignore`, or an empty filter when there is none.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(IGNORE_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "Using ignore file");
            Self::from_file(&path)
        } else {
            Ok(Self::empty())
        }
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any rule can re-include a previously excluded path.
    pub fn has_negations(&self) -> bool {
        self.rules.iter().any(|r| r.negated)
    }

    /// Returns `true` when `path` (relative to the context root) is excluded.
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        let path = normalize_path(path);
        if path.is_empty() {
            return false;
        }

        let mut excluded = false;
        for rule in &self.rules {
            // An exclusion cannot change an excluded path, a negation cannot
            // change an included one.
            if rule.negated != excluded {
                continue;
            }
            if rule.matches(&path, is_dir) {
                excluded = !rule.negated;
            }
        }
        excluded
    }
}

/// Normalize a relative path: `/` separators, no `.`/empty segments, no
/// leading or trailing slash.
fn normalize_path(path: &str) -> String {
    #[cfg(windows)]
    let path = path.replace('\\', "/");

    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically clean a pattern: collapse separators, drop `.`, resolve `..`,
/// strip leading and trailing slashes.
fn clean_pattern(pattern: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in pattern.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !pattern.starts_with('/') {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Translate a cleaned pattern into an anchored regular expression.
fn pattern_to_regex(pattern: &str) -> String {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                    if chars.peek().is_none() {
                        re.push_str(".*");
                    } else {
                        re.push_str("(.*/)?");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '{' | '}' | '$' => {
                re.push('\\');
                re.push(ch);
            }
            '\\' => match chars.next() {
                Some(next) => re.push_str(&regex::escape(&next.to_string())),
                None => re.push_str(r"\\"),
            },
            _ => re.push(ch),
        }
    }

    re.push('$');
    re
}
