use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A single glob from the `file-pattern` setting.
///
/// Only `*` (any run of characters, including none) and `?` (exactly one
/// character) are special; brackets match literally. Matching is
/// case-sensitive and covers the whole name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    source: String,
    compiled: Pattern,
}

impl FilePattern {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        Ok(Self {
            source: source.to_string(),
            compiled: Pattern::new(&glob_source(source))?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        self.compiled.matches_with(name, MATCH_OPTIONS)
    }
}

/// Rewrite into `glob` syntax: brackets become literal classes and runs of
/// `*` collapse, since `**` is only legal as a whole path component.
fn glob_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for ch in source.chars() {
        match ch {
            '[' => out.push_str("[[]"),
            ']' => out.push_str("[]]"),
            '*' if out.ends_with('*') => {}
            other => out.push(other),
        }
    }
    out
}

/// Split a `file-pattern` value on `;`, dropping empty segments.
///
/// Segments are not trimmed: `"*.txt; *.md"` yields `" *.md"` as its second
/// pattern.
pub fn parse_file_patterns(value: &str) -> Vec<FilePattern> {
    value
        .split(';')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| match FilePattern::new(segment) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                tracing::warn!(pattern = segment, %err, "ignoring invalid file pattern");
                None
            }
        })
        .collect()
}

pub fn matches_any(patterns: &[FilePattern], name: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(name))
}
