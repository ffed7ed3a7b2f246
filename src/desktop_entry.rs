//! Minimal reader for freedesktop `.desktop` files.
//!
//! Only the `[Desktop Entry]` group is read. Localised keys (`Name[de]=`)
//! are ignored in favour of the unlocalised value.

use std::path::{Path, PathBuf};

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub path: PathBuf,
    pub name: String,
    pub exec: String,
    pub icon: Option<String>,
    pub comment: Option<String>,
    pub terminal: bool,
    pub mime_types: Vec<String>,
    pub no_display: bool,
}

pub fn parse_desktop_entry(path: &Path, content: &str) -> Option<DesktopEntry> {
    let mut in_group = false;
    let mut entry_type = None;
    let mut name = None;
    let mut exec = None;
    let mut icon = None;
    let mut comment = None;
    let mut terminal = false;
    let mut mime_types = Vec::new();
    let mut no_display = false;
    let mut hidden = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_group {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unescape_value(value.trim());
        match key.trim() {
            "Type" => entry_type = Some(value),
            "Name" => name = Some(value),
            "Exec" => exec = Some(value),
            "Icon" if !value.is_empty() => icon = Some(value),
            "Comment" if !value.is_empty() => comment = Some(value),
            "Terminal" => terminal = value == "true",
            "NoDisplay" => no_display = value == "true",
            "Hidden" => hidden = value == "true",
            "MimeType" => {
                mime_types = value
                    .split(';')
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            _ => {}
        }
    }

    if hidden || entry_type.as_deref() != Some("Application") {
        return None;
    }
    Some(DesktopEntry {
        path: path.to_path_buf(),
        name: name?,
        exec: exec.filter(|e| !e.is_empty())?,
        icon,
        comment,
        terminal,
        mime_types,
        no_display,
    })
}

fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl DesktopEntry {
    pub fn supports(&self, content_type: &str) -> bool {
        self.mime_types.iter().any(|m| m == content_type)
    }

    /// Expand the `Exec` line into an argv, substituting `files` for the
    /// file field codes. Returns `None` when the line is malformed.
    pub fn command_line(&self, files: &[PathBuf]) -> Option<Vec<String>> {
        let mut argv = Vec::new();
        for token in split_exec(&self.exec)? {
            match token.as_str() {
                "%f" => argv.extend(files.first().map(|f| f.display().to_string())),
                "%u" => argv.extend(files.first().map(|f| file_uri(f))),
                "%F" => argv.extend(files.iter().map(|f| f.display().to_string())),
                "%U" => argv.extend(files.iter().map(|f| file_uri(f))),
                "%i" => {
                    if let Some(icon) = &self.icon {
                        argv.push("--icon".to_string());
                        argv.push(icon.clone());
                    }
                }
                _ => {
                    let expanded = self.expand_inline_codes(&token, files);
                    if !expanded.is_empty() || token.is_empty() {
                        argv.push(expanded);
                    }
                }
            }
        }
        if argv.is_empty() {
            None
        } else {
            Some(argv)
        }
    }

    fn expand_inline_codes(&self, token: &str, files: &[PathBuf]) -> String {
        let mut out = String::with_capacity(token.len());
        let mut chars = token.chars();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some('c') => out.push_str(&self.name),
                Some('k') => out.push_str(&self.path.display().to_string()),
                Some('f') => {
                    if let Some(first) = files.first() {
                        out.push_str(&first.display().to_string());
                    }
                }
                Some('u') => {
                    if let Some(first) = files.first() {
                        out.push_str(&file_uri(first));
                    }
                }
                // Deprecated and unknown codes are dropped.
                _ => {}
            }
        }
        out
    }
}

/// `file://` URI for the URL field codes; relative paths stay as they are.
fn file_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|()| path.display().to_string())
}

/// Split an `Exec` value into arguments. Double quotes group, and inside
/// them a backslash escapes `"`, `` ` ``, `$` and `\`.
fn split_exec(exec: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = exec.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_token = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            escaped @ ('"' | '`' | '$' | '\\') => current.push(escaped),
                            other => {
                                current.push('\\');
                                current.push(other);
                            }
                        },
                        other => current.push(other),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        args.push(current);
    }
    Some(args)
}
