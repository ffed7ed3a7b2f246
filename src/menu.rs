use std::path::{Path, PathBuf};

use crate::desktop_entry::{parse_desktop_entry, DesktopEntry};
use crate::listing::{list_directory, DirEntryInfo, FileLister, ListingOptions};

pub const OPEN_FOLDER_LABEL: &str = "Open Folder";
pub const OPEN_TERMINAL_LABEL: &str = "Open in Terminal";
pub const OPEN_FOLDER_ICON: &str = "document-open";
pub const OPEN_TERMINAL_ICON: &str = "utilities-terminal";

/// What activating a row does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    OpenFolder(PathBuf),
    OpenTerminal(PathBuf),
    LaunchFile(PathBuf),
    LaunchApplication(DesktopEntry),
}

#[derive(Debug)]
pub enum RowKind {
    Action(MenuAction),
    Submenu(DirectoryMenu),
    Separator,
}

#[derive(Debug)]
pub struct MenuRow {
    pub label: String,
    pub icon: Option<String>,
    pub tooltip: Option<String>,
    pub kind: RowKind,
}

impl MenuRow {
    fn separator() -> Self {
        Self {
            label: String::new(),
            icon: None,
            tooltip: None,
            kind: RowKind::Separator,
        }
    }

    fn action(label: &str, icon: &str, action: MenuAction) -> Self {
        Self {
            label: label.to_string(),
            icon: Some(icon.to_string()),
            tooltip: None,
            kind: RowKind::Action(action),
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self.kind, RowKind::Separator)
    }
}

/// Listing capability plus the current filter, borrowed while a menu loads.
#[derive(Clone, Copy)]
pub struct MenuSource<'a> {
    pub lister: &'a dyn FileLister,
    pub options: &'a ListingOptions,
}

#[derive(Debug, Default)]
enum LoadState {
    #[default]
    Unloaded,
    Loaded(Vec<MenuRow>),
    /// Hidden; rows stay alive until the next dispatch cycle.
    PendingUnload(Vec<MenuRow>),
}

/// One level of the cascading menu, bound to a directory.
///
/// Rows are built when the level is shown and dropped one dispatch cycle
/// after it is hidden.
#[derive(Debug)]
pub struct DirectoryMenu {
    directory: PathBuf,
    state: LoadState,
}

impl DirectoryMenu {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            state: LoadState::Unloaded,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded(_))
    }

    pub fn is_pending_unload(&self) -> bool {
        matches!(self.state, LoadState::PendingUnload(_))
    }

    pub fn rows(&self) -> &[MenuRow] {
        match &self.state {
            LoadState::Loaded(rows) | LoadState::PendingUnload(rows) => rows,
            LoadState::Unloaded => &[],
        }
    }

    pub fn rows_mut(&mut self) -> &mut [MenuRow] {
        match &mut self.state {
            LoadState::Loaded(rows) | LoadState::PendingUnload(rows) => rows,
            LoadState::Unloaded => &mut [],
        }
    }

    /// Populate the level if it is not showing already.
    ///
    /// Re-showing a level whose teardown is still pending lists the
    /// directory afresh; the old rows are dropped.
    pub fn show(&mut self, source: MenuSource<'_>) {
        if self.is_loaded() {
            return;
        }
        let rows = build_rows(&self.directory, source);
        tracing::debug!(dir = %self.directory.display(), rows = rows.len(), "menu level loaded");
        self.state = LoadState::Loaded(rows);
    }

    /// Hide this level and every open level below it. Rows survive until
    /// [`DirectoryMenu::flush_pending`].
    pub fn hide(&mut self) {
        self.state = match std::mem::take(&mut self.state) {
            LoadState::Loaded(rows) => LoadState::PendingUnload(rows),
            other => other,
        };
        for row in self.rows_mut() {
            if let RowKind::Submenu(sub) = &mut row.kind {
                sub.hide();
            }
        }
    }

    /// Drop rows of hidden levels. Runs at the start of a dispatch cycle.
    pub fn flush_pending(&mut self) {
        if self.is_pending_unload() {
            self.state = LoadState::Unloaded;
            return;
        }
        if let LoadState::Loaded(rows) = &mut self.state {
            for row in rows {
                if let RowKind::Submenu(sub) = &mut row.kind {
                    sub.flush_pending();
                }
            }
        }
    }

    /// Nested level for `directory`, if it is a direct child row.
    pub fn submenu_mut(&mut self, directory: &Path) -> Option<&mut DirectoryMenu> {
        self.rows_mut().iter_mut().find_map(|row| match &mut row.kind {
            RowKind::Submenu(sub) if sub.directory == directory => Some(sub),
            _ => None,
        })
    }
}

fn build_rows(dir: &Path, source: MenuSource<'_>) -> Vec<MenuRow> {
    let mut rows = vec![
        MenuRow::action(
            OPEN_FOLDER_LABEL,
            OPEN_FOLDER_ICON,
            MenuAction::OpenFolder(dir.to_path_buf()),
        ),
        MenuRow::action(
            OPEN_TERMINAL_LABEL,
            OPEN_TERMINAL_ICON,
            MenuAction::OpenTerminal(dir.to_path_buf()),
        ),
    ];

    let entries = list_directory(source.lister, dir, source.options);
    if !entries.is_empty() {
        rows.push(MenuRow::separator());
    }
    rows.extend(entries.iter().map(|entry| entry_row(dir, entry, source.lister)));
    rows
}

fn entry_row(dir: &Path, entry: &DirEntryInfo, lister: &dyn FileLister) -> MenuRow {
    let path = dir.join(&entry.name);
    if entry.is_dir() {
        return MenuRow {
            label: entry.display_name.clone(),
            icon: Some(entry.icon.clone()),
            tooltip: None,
            kind: RowKind::Submenu(DirectoryMenu::new(path)),
        };
    }
    if entry.display_name.ends_with(".desktop") {
        let app = lister
            .read_text(&path)
            .ok()
            .and_then(|text| parse_desktop_entry(&path, &text));
        if let Some(app) = app {
            return MenuRow {
                label: app.name.clone(),
                icon: Some(app.icon.clone().unwrap_or_else(|| entry.icon.clone())),
                tooltip: app.comment.clone(),
                kind: RowKind::Action(MenuAction::LaunchApplication(app)),
            };
        }
    }
    MenuRow {
        label: entry.display_name.clone(),
        icon: Some(entry.icon.clone()),
        tooltip: None,
        kind: RowKind::Action(MenuAction::LaunchFile(path)),
    }
}
