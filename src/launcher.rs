use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::content_type::query_content_type;
use crate::desktop_entry::{parse_desktop_entry, DesktopEntry};

/// Application categories the menu's fixed actions can open a directory in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredApp {
    TerminalEmulator,
    FileManager,
}

impl PreferredApp {
    pub fn category(self) -> &'static str {
        match self {
            PreferredApp::TerminalEmulator => "TerminalEmulator",
            PreferredApp::FileManager => "FileManager",
        }
    }
}

impl fmt::Display for PreferredApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// A failed activation. `Display` is the headline shown to the user; the
/// reason, when there is one, is the error `source`.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to query content type for \"{}\"", .path.display())]
    QueryContentType {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No default application found for \"{}\"", .path.display())]
    NoDefaultApplication {
        path: PathBuf,
        #[source]
        source: MissingHandler,
    },
    #[error("Failed to launch default application for \"{}\"", .path.display())]
    LaunchDefault {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open preferred application category \"{category}\"")]
    PreferredApplication {
        category: PreferredApp,
        #[source]
        source: io::Error,
    },
    #[error("Failed to launch application \"{exec}\"")]
    LaunchApplication {
        exec: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
#[error("no application is registered for content type {content_type}")]
pub struct MissingHandler {
    pub content_type: String,
}

/// Activation capability used by the menu.
pub trait Launcher {
    /// Open `file` with the default application for its content type.
    fn open_with_default(&self, file: &Path) -> Result<(), LaunchError>;

    /// Open `dir` in the user's preferred application of `category`.
    fn open_preferred(&self, category: PreferredApp, dir: &Path) -> Result<(), LaunchError>;

    /// Start the application described by a `.desktop` file, without arguments.
    fn launch_application(&self, entry: &DesktopEntry) -> Result<(), LaunchError>;
}

// ── System launcher ───────────────────────────────────────────────────────────

/// Spawns real processes, resolving handlers from the XDG MIME associations.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    config_dirs: Vec<PathBuf>,
    data_dirs: Vec<PathBuf>,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SystemLauncher {
    pub fn from_env() -> Self {
        let mut config_dirs: Vec<PathBuf> = dirs::config_dir().into_iter().collect();
        config_dirs.extend(env_dirs("XDG_CONFIG_DIRS", &["/etc/xdg"]));
        let mut data_dirs: Vec<PathBuf> = dirs::data_dir().into_iter().collect();
        data_dirs.extend(env_dirs("XDG_DATA_DIRS", &["/usr/local/share", "/usr/share"]));
        Self::with_dirs(config_dirs, data_dirs)
    }

    pub fn with_dirs(config_dirs: Vec<PathBuf>, data_dirs: Vec<PathBuf>) -> Self {
        Self {
            config_dirs,
            data_dirs,
        }
    }

    /// Desktop entry registered as the default handler for `content_type`.
    pub fn default_for_type(&self, content_type: &str) -> Option<DesktopEntry> {
        for id in self.default_ids(content_type) {
            if let Some(entry) = self.find_desktop_entry(&id) {
                return Some(entry);
            }
        }
        let fallback = self.first_supporting(content_type);
        if fallback.is_none() && content_type.starts_with("text/") && content_type != "text/plain"
        {
            return self.default_for_type("text/plain");
        }
        fallback
    }

    fn mimeapps_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .config_dirs
            .iter()
            .map(|dir| dir.join("mimeapps.list"))
            .collect();
        for dir in &self.data_dirs {
            files.push(dir.join("applications").join("mimeapps.list"));
            files.push(dir.join("applications").join("defaults.list"));
        }
        files
    }

    fn default_ids(&self, content_type: &str) -> Vec<String> {
        let mut ids = Vec::new();
        for file in self.mimeapps_files() {
            let Ok(text) = std::fs::read_to_string(&file) else {
                continue;
            };
            ids.extend(default_ids_in(&text, content_type));
        }
        ids
    }

    fn application_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.data_dirs.iter().map(|dir| dir.join("applications"))
    }

    fn find_desktop_entry(&self, id: &str) -> Option<DesktopEntry> {
        for dir in self.application_dirs() {
            // `kde-foo.desktop` may live at `kde/foo.desktop`.
            let mut candidates = vec![dir.join(id)];
            if let Some((prefix, rest)) = id.split_once('-') {
                candidates.push(dir.join(prefix).join(rest));
            }
            for candidate in candidates {
                if let Some(entry) = load_desktop_file(&candidate) {
                    return Some(entry);
                }
            }
        }
        None
    }

    fn first_supporting(&self, content_type: &str) -> Option<DesktopEntry> {
        for dir in self.application_dirs() {
            let Ok(read_dir) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut paths: Vec<PathBuf> = read_dir
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "desktop"))
                .collect();
            paths.sort();
            let found = paths
                .iter()
                .filter_map(|p| load_desktop_file(p))
                .find(|entry| !entry.no_display && entry.supports(content_type));
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

fn env_dirs(var: &str, defaults: &[&str]) -> Vec<PathBuf> {
    match std::env::var_os(var) {
        Some(value) if !value.is_empty() => std::env::split_paths(&value).collect(),
        _ => defaults.iter().map(PathBuf::from).collect(),
    }
}

fn load_desktop_file(path: &Path) -> Option<DesktopEntry> {
    let text = std::fs::read_to_string(path).ok()?;
    parse_desktop_entry(path, &text)
}

/// Desktop ids listed for `content_type` in a `mimeapps.list` style file.
fn default_ids_in(text: &str, content_type: &str) -> Vec<String> {
    let mut in_defaults = false;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_defaults = line == "[Default Applications]";
            continue;
        }
        if !in_defaults {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == content_type {
            return value
                .split(';')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

fn spawn_argv(argv: &[String], cwd: Option<&Path>) -> io::Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command line"));
    };
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    tracing::debug!(?argv, "spawning");
    let mut child = command.spawn()?;
    // Reap in the background so exited launches do not linger as zombies.
    std::thread::spawn(move || match child.wait() {
        Ok(status) if !status.success() => tracing::debug!(%status, "launched process exited"),
        Ok(_) => {}
        Err(err) => tracing::debug!(%err, "waiting for launched process failed"),
    });
    Ok(())
}

fn malformed_exec(entry: &DesktopEntry) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("malformed Exec line in {}", entry.path.display()),
    )
}

fn command_for_entry(entry: &DesktopEntry, files: &[PathBuf]) -> io::Result<Vec<String>> {
    let argv = entry
        .command_line(files)
        .ok_or_else(|| malformed_exec(entry))?;
    if entry.terminal {
        let plan = terminal_plan(None);
        let mut wrapped = vec![plan.program];
        wrapped.extend(plan.exec_flag.map(str::to_string));
        wrapped.extend(argv);
        return Ok(wrapped);
    }
    Ok(argv)
}

impl Launcher for SystemLauncher {
    fn open_with_default(&self, file: &Path) -> Result<(), LaunchError> {
        let content_type =
            query_content_type(file).map_err(|source| LaunchError::QueryContentType {
                path: file.to_path_buf(),
                source,
            })?;
        let Some(entry) = self.default_for_type(&content_type) else {
            return Err(LaunchError::NoDefaultApplication {
                path: file.to_path_buf(),
                source: MissingHandler { content_type },
            });
        };
        tracing::info!(
            file = %file.display(),
            app = %entry.name,
            "opening with default application"
        );
        command_for_entry(&entry, &[file.to_path_buf()])
            .and_then(|argv| spawn_argv(&argv, None))
            .map_err(|source| LaunchError::LaunchDefault {
                path: file.to_path_buf(),
                source,
            })
    }

    fn open_preferred(&self, category: PreferredApp, dir: &Path) -> Result<(), LaunchError> {
        tracing::info!(%category, dir = %dir.display(), "opening preferred application");
        let result = match category {
            PreferredApp::TerminalEmulator => {
                let plan = terminal_plan(Some(dir));
                spawn_argv(&plan.argv(), Some(dir))
            }
            PreferredApp::FileManager => open::that_detached(dir),
        };
        result.map_err(|source| LaunchError::PreferredApplication { category, source })
    }

    fn launch_application(&self, entry: &DesktopEntry) -> Result<(), LaunchError> {
        tracing::info!(app = %entry.name, "launching desktop entry");
        command_for_entry(entry, &[])
            .and_then(|argv| spawn_argv(&argv, None))
            .map_err(|source| LaunchError::LaunchApplication {
                exec: entry.exec.clone(),
                source,
            })
    }
}

// ── Terminal selection ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalPlan {
    pub program: String,
    /// Flag that makes the terminal run the following argv instead of a shell.
    pub exec_flag: Option<&'static str>,
    pub args: Vec<String>,
}

impl TerminalPlan {
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.args.iter().cloned());
        argv
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
const KNOWN_TERMINALS: &[(&str, &str, Option<&str>)] = &[
    ("x-terminal-emulator", "-e", None),
    ("xfce4-terminal", "-x", Some("--working-directory")),
    ("gnome-terminal", "--", Some("--working-directory")),
    ("konsole", "-e", Some("--workdir")),
    ("kitty", "--", Some("--directory")),
    ("alacritty", "-e", Some("--working-directory")),
    ("xterm", "-e", None),
];

/// Pick a terminal emulator, preferring `$TERMINAL`.
pub fn terminal_plan(dir: Option<&Path>) -> TerminalPlan {
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if let Some(term) = std::env::var("TERMINAL").ok().filter(|t| !t.trim().is_empty()) {
            if let Some(&(_, exec_flag, dir_flag)) =
                KNOWN_TERMINALS.iter().find(|(name, _, _)| *name == term)
            {
                return known_plan(&term, exec_flag, dir_flag, dir);
            }
            return TerminalPlan {
                program: term,
                exec_flag: Some("-e"),
                args: Vec::new(),
            };
        }
        for &(program, exec_flag, dir_flag) in KNOWN_TERMINALS {
            if which(program) {
                return known_plan(program, exec_flag, dir_flag, dir);
            }
        }
        TerminalPlan {
            program: "xterm".to_string(),
            exec_flag: Some("-e"),
            args: Vec::new(),
        }
    }
    #[cfg(target_os = "macos")]
    {
        let args = dir
            .map(|d| vec!["-a".to_string(), "Terminal".to_string(), d.display().to_string()])
            .unwrap_or_else(|| vec!["-a".to_string(), "Terminal".to_string()]);
        TerminalPlan {
            program: "open".to_string(),
            exec_flag: None,
            args,
        }
    }
    #[cfg(windows)]
    {
        let _ = dir;
        TerminalPlan {
            program: "cmd".to_string(),
            exec_flag: Some("/K"),
            args: vec!["/C".to_string(), "start".to_string(), "cmd".to_string()],
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn known_plan(
    program: &str,
    exec_flag: &'static str,
    dir_flag: Option<&str>,
    dir: Option<&Path>,
) -> TerminalPlan {
    let mut args = Vec::new();
    if let (Some(flag), Some(dir)) = (dir_flag, dir) {
        args.push(format!("{flag}={}", dir.display()));
    }
    TerminalPlan {
        program: program.to_string(),
        exec_flag: Some(exec_flag),
        args,
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn which(program: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(program).is_file())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::error::Error;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Launched {
        Default(PathBuf),
        Preferred(PreferredApp, PathBuf),
        Application(String),
    }

    /// Records activations; fails any request whose path contains `fail_on`.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLauncher {
        pub(crate) launched: RefCell<Vec<Launched>>,
        pub(crate) fail_on: Option<String>,
    }

    impl RecordingLauncher {
        fn should_fail(&self, path: &Path) -> bool {
            self.fail_on
                .as_deref()
                .is_some_and(|needle| path.to_string_lossy().contains(needle))
        }
    }

    impl Launcher for RecordingLauncher {
        fn open_with_default(&self, file: &Path) -> Result<(), LaunchError> {
            if self.should_fail(file) {
                return Err(LaunchError::NoDefaultApplication {
                    path: file.to_path_buf(),
                    source: MissingHandler {
                        content_type: "application/octet-stream".to_string(),
                    },
                });
            }
            self.launched
                .borrow_mut()
                .push(Launched::Default(file.to_path_buf()));
            Ok(())
        }

        fn open_preferred(&self, category: PreferredApp, dir: &Path) -> Result<(), LaunchError> {
            if self.should_fail(dir) {
                return Err(LaunchError::PreferredApplication {
                    category,
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            self.launched
                .borrow_mut()
                .push(Launched::Preferred(category, dir.to_path_buf()));
            Ok(())
        }

        fn launch_application(&self, entry: &DesktopEntry) -> Result<(), LaunchError> {
            self.launched
                .borrow_mut()
                .push(Launched::Application(entry.name.clone()));
            Ok(())
        }
    }

    fn write_app(dir: &Path, id: &str, name: &str, mime: &str) {
        let apps = dir.join("applications");
        std::fs::create_dir_all(&apps).unwrap();
        std::fs::write(
            apps.join(id),
            format!(
                "[Desktop Entry]\nType=Application\nName={name}\nExec={name} %f\nMimeType={mime};\n"
            ),
        )
        .unwrap();
    }

    #[test]
    fn mimeapps_default_wins_over_declared_support() {
        let config = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write_app(data.path(), "aaa.desktop", "aaa", "image/png");
        write_app(data.path(), "viewer.desktop", "viewer", "image/png");
        std::fs::write(
            config.path().join("mimeapps.list"),
            "[Added Associations]\nimage/png=aaa.desktop;\n\n\
             [Default Applications]\nimage/png=missing.desktop;viewer.desktop;\n",
        )
        .unwrap();

        let launcher =
            SystemLauncher::with_dirs(vec![config.path().into()], vec![data.path().into()]);
        assert_eq!(launcher.default_for_type("image/png").unwrap().name, "viewer");
    }

    #[test]
    fn falls_back_to_first_supporting_entry_then_text_plain() {
        let data = TempDir::new().unwrap();
        write_app(data.path(), "zed.desktop", "zed", "text/plain");
        write_app(data.path(), "paint.desktop", "paint", "image/png");
        let launcher = SystemLauncher::with_dirs(Vec::new(), vec![data.path().into()]);

        assert_eq!(launcher.default_for_type("image/png").unwrap().name, "paint");
        assert_eq!(launcher.default_for_type("text/markdown").unwrap().name, "zed");
        assert!(launcher.default_for_type("video/mp4").is_none());
    }

    #[test]
    fn prefixed_ids_resolve_into_subdirectories() {
        let data = TempDir::new().unwrap();
        let kde = data.path().join("applications").join("kde");
        std::fs::create_dir_all(&kde).unwrap();
        std::fs::write(
            kde.join("okular.desktop"),
            "[Desktop Entry]\nType=Application\nName=Okular\nExec=okular %U\n",
        )
        .unwrap();
        let launcher = SystemLauncher::with_dirs(Vec::new(), vec![data.path().into()]);
        assert_eq!(
            launcher.find_desktop_entry("kde-okular.desktop").unwrap().name,
            "Okular"
        );
    }

    #[test]
    fn missing_file_reports_content_type_failure() {
        let dir = TempDir::new().unwrap();
        let launcher = SystemLauncher::with_dirs(Vec::new(), Vec::new());
        let path = dir.path().join("gone.txt");
        let err = launcher.open_with_default(&path).unwrap_err();
        assert!(matches!(err, LaunchError::QueryContentType { .. }));
        assert_eq!(
            err.to_string(),
            format!("Failed to query content type for \"{}\"", path.display())
        );
    }

    #[test]
    fn unknown_handler_names_file_and_content_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"\0\0").unwrap();
        let launcher = SystemLauncher::with_dirs(Vec::new(), Vec::new());
        let err = launcher.open_with_default(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("No default application found for \"{}\"", path.display())
        );
        assert_eq!(
            err.source().map(|s| s.to_string()).as_deref(),
            Some("no application is registered for content type video/mp4")
        );
    }

    #[test]
    fn preferred_error_names_category() {
        let err = LaunchError::PreferredApplication {
            category: PreferredApp::TerminalEmulator,
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open preferred application category \"TerminalEmulator\""
        );
    }

    #[test]
    fn default_ids_only_come_from_default_group() {
        let text = "[Added Associations]\ntext/plain=a.desktop\n\
                    [Default Applications]\ntext/plain= b.desktop ;c.desktop\n";
        assert_eq!(default_ids_in(text, "text/plain"), vec!["b.desktop", "c.desktop"]);
        assert!(default_ids_in(text, "image/png").is_empty());
    }

    fn desktop_entry(exec: &str, terminal: bool) -> DesktopEntry {
        DesktopEntry {
            path: PathBuf::from("/apps/tool.desktop"),
            name: "tool".to_string(),
            exec: exec.to_string(),
            icon: None,
            comment: None,
            terminal,
            mime_types: Vec::new(),
            no_display: false,
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn terminal_entries_are_wrapped_in_a_terminal() {
        std::env::set_var("TERMINAL", "xfce4-terminal");
        let argv = command_for_entry(&desktop_entry("htop --tree", true), &[]).unwrap();
        assert_eq!(argv, vec!["xfce4-terminal", "-x", "htop", "--tree"]);

        let plain = command_for_entry(&desktop_entry("htop", false), &[]).unwrap();
        assert_eq!(plain, vec!["htop"]);
    }

    #[test]
    fn missing_executable_fails_application_launch() {
        let launcher = SystemLauncher::with_dirs(Vec::new(), Vec::new());
        let exec = "/nonexistent/dirmenu-tool --flag";
        let err = launcher
            .launch_application(&desktop_entry(exec, false))
            .unwrap_err();
        assert!(matches!(err, LaunchError::LaunchApplication { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to launch application \"/nonexistent/dirmenu-tool --flag\""
        );
        let reason = err.source().and_then(|s| s.downcast_ref::<io::Error>()).unwrap();
        assert_eq!(reason.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn malformed_exec_line_fails_application_launch() {
        let launcher = SystemLauncher::with_dirs(Vec::new(), Vec::new());
        let err = launcher
            .launch_application(&desktop_entry("\"unterminated %f", false))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to launch application \"\"unterminated %f\""
        );
        let reason = err.source().and_then(|s| s.downcast_ref::<io::Error>()).unwrap();
        assert_eq!(reason.kind(), io::ErrorKind::InvalidData);
        assert_eq!(reason.to_string(), "malformed Exec line in /apps/tool.desktop");
    }

    #[test]
    fn missing_default_handler_binary_fails_default_launch() {
        let data = TempDir::new().unwrap();
        write_app(data.path(), "ghost.desktop", "/nonexistent/ghost-viewer", "text/plain");
        let files = TempDir::new().unwrap();
        let path = files.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let launcher = SystemLauncher::with_dirs(Vec::new(), vec![data.path().into()]);
        let err = launcher.open_with_default(&path).unwrap_err();
        assert!(matches!(err, LaunchError::LaunchDefault { .. }));
        assert_eq!(
            err.to_string(),
            format!("Failed to launch default application for \"{}\"", path.display())
        );
        let reason = err.source().and_then(|s| s.downcast_ref::<io::Error>()).unwrap();
        assert_eq!(reason.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        let Ok(procs) = std::fs::read_dir("/proc") else {
            return 0;
        };
        procs
            .flatten()
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
            .filter(|stat| {
                // Fields after the parenthesised command: state, ppid, ...
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                let state = fields.next();
                let ppid = fields.next();
                state == Some("Z") && ppid == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn launched_processes_are_reaped() {
        let data = TempDir::new().unwrap();
        write_app(data.path(), "true.desktop", "true", "text/plain");
        let files = TempDir::new().unwrap();
        let path = files.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();
        let launcher = SystemLauncher::with_dirs(Vec::new(), vec![data.path().into()]);

        for _ in 0..5 {
            launcher.open_with_default(&path).unwrap();
        }
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while zombie_children() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        assert_eq!(zombie_children(), 0);
    }
}
