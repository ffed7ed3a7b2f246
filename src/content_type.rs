use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const DIRECTORY: &str = "inode/directory";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

const SNIFF_LEN: usize = 512;

// ── Extension table ───────────────────────────────────────────────────────────

pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "log" | "conf" | "ini" | "cfg" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "rs" => "text/rust",
        "c" | "h" => "text/x-csrc",
        "cpp" | "cc" | "hpp" => "text/x-c++src",
        "py" => "text/x-python",
        "js" => "application/javascript",
        "ts" | "tsx" => "application/typescript",
        "json" => "application/json",
        "toml" => "application/toml",
        "yaml" | "yml" => "application/x-yaml",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "sh" | "bash" | "zsh" => "application/x-shellscript",
        "desktop" => "application/x-desktop",
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/x-wav",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" | "tgz" => "application/gzip",
        "xz" => "application/x-xz",
        "7z" => "application/x-7z-compressed",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => return None,
    };
    Some(mime)
}

/// Guess from the file name alone, without touching the filesystem.
pub fn guess_from_name(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?;
    content_type_for_extension(ext)
}

/// Resolve the content type of an existing path.
///
/// Fails only when the path cannot be inspected at all.
pub fn query_content_type(path: &Path) -> std::io::Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.is_dir() {
        return Ok(DIRECTORY.to_string());
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(mime) = guess_from_name(name) {
            return Ok(mime.to_string());
        }
    }
    if meta.len() == 0 {
        return Ok(TEXT_PLAIN.to_string());
    }
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(sniff(&head).to_string())
}

fn sniff(head: &[u8]) -> &'static str {
    if head.contains(&0) {
        return OCTET_STREAM;
    }
    match std::str::from_utf8(head) {
        Ok(_) => TEXT_PLAIN,
        // A multi-byte sequence cut off at the sniff boundary is still text.
        Err(err) if err.error_len().is_none() => TEXT_PLAIN,
        Err(_) => OCTET_STREAM,
    }
}

// ── Icons ─────────────────────────────────────────────────────────────────────

/// Freedesktop icon name for a content type, e.g. `image/png` → `image-png`.
pub fn icon_name_for(content_type: &str) -> String {
    if content_type == DIRECTORY {
        return "folder".to_string();
    }
    content_type.replace('/', "-").replace('+', "-")
}

/// Generic icon name used when a specific one is not installed.
pub fn generic_icon_name_for(content_type: &str) -> &'static str {
    let major = content_type.split('/').next().unwrap_or_default();
    match major {
        "inode" => "folder",
        "text" => "text-x-generic",
        "image" => "image-x-generic",
        "audio" => "audio-x-generic",
        "video" => "video-x-generic",
        _ if content_type == "application/x-desktop" => "application-x-executable",
        _ if content_type == "application/x-shellscript" => "text-x-script",
        _ if is_archive(content_type) => "package-x-generic",
        _ => "application-x-generic",
    }
}

fn is_archive(content_type: &str) -> bool {
    matches!(
        content_type,
        "application/zip"
            | "application/x-tar"
            | "application/gzip"
            | "application/x-xz"
            | "application/x-7z-compressed"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(guess_from_name("Photo.JPG"), Some("image/jpeg"));
        assert_eq!(guess_from_name("notes.txt"), Some("text/plain"));
        assert_eq!(guess_from_name("Makefile"), None);
    }

    #[test]
    fn query_sniffs_text_and_binary_without_extension() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("README");
        std::fs::write(&text, "plain words\n").unwrap();
        let binary = dir.path().join("blob");
        std::fs::write(&binary, [0x7f, b'E', b'L', b'F', 0, 1, 2]).unwrap();

        assert_eq!(query_content_type(&text).unwrap(), TEXT_PLAIN);
        assert_eq!(query_content_type(&binary).unwrap(), OCTET_STREAM);
        assert_eq!(query_content_type(dir.path()).unwrap(), DIRECTORY);
    }

    #[test]
    fn query_fails_for_missing_paths() {
        let dir = TempDir::new().unwrap();
        assert!(query_content_type(&dir.path().join("gone.txt")).is_err());
    }

    #[test]
    fn icon_names_follow_freedesktop_naming() {
        assert_eq!(icon_name_for("image/png"), "image-png");
        assert_eq!(icon_name_for("image/svg+xml"), "image-svg-xml");
        assert_eq!(icon_name_for(DIRECTORY), "folder");
        assert_eq!(generic_icon_name_for("text/markdown"), "text-x-generic");
        assert_eq!(generic_icon_name_for("application/zip"), "package-x-generic");
    }
}
