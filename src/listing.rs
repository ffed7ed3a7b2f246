use std::cmp::Ordering;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::Path;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::content_type::{generic_icon_name_for, guess_from_name, icon_name_for, OCTET_STREAM};
use crate::pattern::{matches_any, FilePattern};

/// Per-directory list of extra names to treat as hidden.
pub const HIDDEN_LIST_FILE: &str = ".hidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    File,
}

/// Metadata for one child of an enumerated directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: OsString,
    pub display_name: String,
    pub kind: FileKind,
    pub hidden: bool,
    pub icon: String,
}

impl DirEntryInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Filesystem enumeration capability.
///
/// The menu never touches `std::fs` directly so listing, ordering and menu
/// assembly can be driven from memory in tests.
pub trait FileLister {
    /// Immediate children of `dir`. Entries that cannot be inspected are
    /// left out; only a failure to open `dir` itself is an error.
    fn list_children(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;

    fn read_text(&self, path: &Path) -> io::Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct ListingOptions {
    pub show_hidden: bool,
    pub patterns: Vec<FilePattern>,
}

impl ListingOptions {
    pub fn accepts(&self, entry: &DirEntryInfo) -> bool {
        if entry.hidden && !self.show_hidden {
            return false;
        }
        if entry.is_dir() || self.patterns.is_empty() {
            return true;
        }
        matches_any(&self.patterns, &entry.display_name)
    }
}

/// Filtered, sorted children of `dir`. Unreadable directories list as empty.
pub fn list_directory(
    lister: &dyn FileLister,
    dir: &Path,
    options: &ListingOptions,
) -> Vec<DirEntryInfo> {
    let children = match lister.list_children(dir) {
        Ok(children) => children,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), %err, "directory not readable, listing empty");
            return Vec::new();
        }
    };
    let mut entries: Vec<DirEntryInfo> = children
        .into_iter()
        .filter(|entry| options.accepts(entry))
        .collect();
    entries.sort_by(compare_entries);
    entries
}

// ── Ordering ──────────────────────────────────────────────────────────────────

/// Directories first, then hidden entries, then by display name.
pub fn compare_entries(a: &DirEntryInfo, b: &DirEntryInfo) -> Ordering {
    match (a.kind, b.kind) {
        (FileKind::Directory, FileKind::File) => return Ordering::Less,
        (FileKind::File, FileKind::Directory) => return Ordering::Greater,
        _ => {}
    }
    if a.hidden != b.hidden {
        return if a.hidden {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    collate(&a.display_name, &b.display_name).then_with(|| a.name.cmp(&b.name))
}

/// Locale-style name comparison.
///
/// Letters compare by base character first, ignoring case and accents;
/// lowercase sorts before uppercase, then unaccented before accented.
/// Raw code points break any remaining tie.
pub fn collate(a: &str, b: &str) -> Ordering {
    let base_a = base_letters(a);
    let base_b = base_letters(b);
    base_a
        .iter()
        .flat_map(|c| c.to_lowercase())
        .cmp(base_b.iter().flat_map(|c| c.to_lowercase()))
        .then_with(|| {
            let case_a = base_a.iter().map(|c| c.is_uppercase());
            let case_b = base_b.iter().map(|c| c.is_uppercase());
            case_a.cmp(case_b)
        })
        .then_with(|| a.nfd().cmp(b.nfd()))
        .then_with(|| a.cmp(b))
}

fn base_letters(s: &str) -> Vec<char> {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

// ── std::fs implementation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl FsLister {
    fn hidden_names(dir: &Path) -> HashSet<String> {
        std::fs::read_to_string(dir.join(HIDDEN_LIST_FILE))
            .map(|text| {
                text.lines()
                    .map(str::trim_end)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl FileLister for FsLister {
    fn list_children(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let read_dir = std::fs::read_dir(dir)?;
        let hidden_names = Self::hidden_names(dir);
        let mut out = Vec::new();
        for entry in read_dir.flatten() {
            let name = entry.file_name();
            let display_name = name.to_string_lossy().into_owned();
            // Follow symlinks; a dangling link still shows as a file.
            let is_dir = match std::fs::metadata(entry.path()) {
                Ok(meta) => meta.is_dir(),
                Err(_) => match entry.file_type() {
                    Ok(_) => false,
                    Err(err) => {
                        tracing::debug!(entry = %display_name, %err, "skipping entry");
                        continue;
                    }
                },
            };
            let hidden = display_name.starts_with('.') || hidden_names.contains(&display_name);
            let (kind, icon) = if is_dir {
                (FileKind::Directory, "folder".to_string())
            } else {
                let mime = guess_from_name(&display_name).unwrap_or(OCTET_STREAM);
                let icon = if mime == OCTET_STREAM {
                    generic_icon_name_for(mime).to_string()
                } else {
                    icon_name_for(mime)
                };
                (FileKind::File, icon)
            };
            out.push(DirEntryInfo {
                name,
                display_name,
                kind,
                hidden,
                icon,
            });
        }
        Ok(out)
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pattern::parse_file_patterns;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// In-memory directory tree for menu and applet tests.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryLister {
        dirs: HashMap<PathBuf, Vec<DirEntryInfo>>,
        files: HashMap<PathBuf, String>,
    }

    impl MemoryLister {
        pub(crate) fn dir(mut self, path: &str, entries: Vec<DirEntryInfo>) -> Self {
            self.dirs.insert(PathBuf::from(path), entries);
            self
        }

        pub(crate) fn file(mut self, path: &str, text: &str) -> Self {
            self.files.insert(PathBuf::from(path), text.to_string());
            self
        }
    }

    impl FileLister for MemoryLister {
        fn list_children(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
            self.dirs
                .get(dir)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::PermissionDenied))
        }

        fn read_text(&self, path: &Path) -> io::Result<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    pub(crate) fn entry(name: &str, kind: FileKind) -> DirEntryInfo {
        DirEntryInfo {
            name: OsString::from(name),
            display_name: name.to_string(),
            kind,
            hidden: name.starts_with('.'),
            icon: match kind {
                FileKind::Directory => "folder".to_string(),
                FileKind::File => "text-x-generic".to_string(),
            },
        }
    }

    fn sample_lister() -> MemoryLister {
        MemoryLister::default().dir(
            "/base",
            vec![
                entry(".hidden", FileKind::File),
                entry("Documents", FileKind::Directory),
                entry("b.txt", FileKind::File),
                entry("a.txt", FileKind::File),
            ],
        )
    }

    fn names(entries: &[DirEntryInfo]) -> Vec<&str> {
        entries.iter().map(|e| e.display_name.as_str()).collect()
    }

    #[test]
    fn hidden_enabled_without_patterns_orders_dirs_hidden_then_names() {
        let options = ListingOptions {
            show_hidden: true,
            patterns: Vec::new(),
        };
        let listed = list_directory(&sample_lister(), Path::new("/base"), &options);
        assert_eq!(names(&listed), vec!["Documents", ".hidden", "a.txt", "b.txt"]);
    }

    #[test]
    fn hidden_disabled_drops_hidden_entries() {
        let listed = list_directory(
            &sample_lister(),
            Path::new("/base"),
            &ListingOptions::default(),
        );
        assert_eq!(names(&listed), vec!["Documents", "a.txt", "b.txt"]);
        assert!(listed.iter().all(|e| !e.hidden));
    }

    #[test]
    fn patterns_filter_files_but_never_directories() {
        let lister = MemoryLister::default().dir(
            "/base",
            vec![
                entry("Documents", FileKind::Directory),
                entry("b.txt", FileKind::File),
                entry("a.txt", FileKind::File),
                entry("photo.png", FileKind::File),
                entry("src.rs", FileKind::Directory),
            ],
        );
        let options = ListingOptions {
            show_hidden: true,
            patterns: parse_file_patterns("*.txt"),
        };
        let listed = list_directory(&lister, Path::new("/base"), &options);
        assert_eq!(names(&listed), vec!["Documents", "src.rs", "a.txt", "b.txt"]);
    }

    #[test]
    fn hidden_directories_sort_before_visible_ones() {
        let lister = MemoryLister::default().dir(
            "/base",
            vec![
                entry("zeta", FileKind::Directory),
                entry(".config", FileKind::Directory),
                entry("Alpha", FileKind::Directory),
                entry(".profile", FileKind::File),
            ],
        );
        let options = ListingOptions {
            show_hidden: true,
            patterns: Vec::new(),
        };
        let listed = list_directory(&lister, Path::new("/base"), &options);
        assert_eq!(names(&listed), vec![".config", "Alpha", "zeta", ".profile"]);
    }

    #[test]
    fn unreadable_directory_lists_empty() {
        let listed = list_directory(
            &MemoryLister::default(),
            Path::new("/nowhere"),
            &ListingOptions::default(),
        );
        assert!(listed.is_empty());
    }

    #[test]
    fn collate_ignores_case_and_accents_at_first_level() {
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("Zoo", "apple"), Ordering::Greater);
        assert_eq!(collate("a", "A"), Ordering::Less);
        assert_eq!(collate("école", "ecole"), Ordering::Greater);
        assert_eq!(collate("école", "ecolf"), Ordering::Less);
        assert_eq!(collate("same", "same"), Ordering::Equal);
    }

    #[test]
    fn compare_entries_is_total_over_a_mixed_set() {
        let mut entries = vec![
            entry("b", FileKind::File),
            entry("B", FileKind::File),
            entry(".b", FileKind::File),
            entry("b", FileKind::Directory),
            entry(".a", FileKind::Directory),
        ];
        entries.sort_by(compare_entries);
        let got: Vec<(&str, FileKind)> = entries
            .iter()
            .map(|e| (e.display_name.as_str(), e.kind))
            .collect();
        assert_eq!(
            got,
            vec![
                (".a", FileKind::Directory),
                ("b", FileKind::Directory),
                (".b", FileKind::File),
                ("b", FileKind::File),
                ("B", FileKind::File),
            ]
        );
        for a in &entries {
            assert_eq!(compare_entries(a, a), Ordering::Equal);
        }
    }

    #[test]
    fn fs_lister_reads_kinds_hidden_flags_and_hidden_list() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Music")).unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"id3").unwrap();
        std::fs::write(dir.path().join(".bashrc"), b"").unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"").unwrap();
        std::fs::write(dir.path().join(HIDDEN_LIST_FILE), "secret.txt\n").unwrap();

        let mut children = FsLister.list_children(dir.path()).unwrap();
        children.sort_by(compare_entries);
        let summary: Vec<(&str, FileKind, bool)> = children
            .iter()
            .map(|e| (e.display_name.as_str(), e.kind, e.hidden))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Music", FileKind::Directory, false),
                (".bashrc", FileKind::File, true),
                (".hidden", FileKind::File, true),
                ("secret.txt", FileKind::File, true),
                ("song.mp3", FileKind::File, false),
            ]
        );
        let song = children.iter().find(|e| e.display_name == "song.mp3").unwrap();
        assert_eq!(song.icon, "audio-mpeg");
    }

    #[test]
    fn fs_lister_errors_on_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(FsLister.list_children(&dir.path().join("missing")).is_err());
        let listed = list_directory(
            &FsLister,
            &dir.path().join("missing"),
            &ListingOptions::default(),
        );
        assert!(listed.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn fs_lister_follows_symlinked_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();

        let children = FsLister.list_children(dir.path()).unwrap();
        let kind_of = |name: &str| {
            children
                .iter()
                .find(|e| e.display_name == name)
                .map(|e| e.kind)
        };
        assert_eq!(kind_of("link"), Some(FileKind::Directory));
        assert_eq!(kind_of("dangling"), Some(FileKind::File));
    }
}
