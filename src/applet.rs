use std::error::Error;
use std::path::PathBuf;

use crate::config::AppletSettings;
use crate::launcher::{LaunchError, Launcher, PreferredApp};
use crate::listing::{FileLister, ListingOptions};
use crate::menu::{DirectoryMenu, MenuAction, MenuSource};
use crate::pattern::parse_file_patterns;

pub const POPUP_COMMAND: &str = "popup";

/// A user-visible failure: headline naming the resource, plus the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDialog {
    pub message: String,
    pub detail: Option<String>,
}

impl From<&LaunchError> for ErrorDialog {
    fn from(err: &LaunchError) -> Self {
        Self {
            message: err.to_string(),
            detail: err.source().map(|source| source.to_string()),
        }
    }
}

/// The panel applet: a toggle button owning a popup directory menu.
///
/// All state changes happen on the UI thread. Call [`begin_cycle`] once per
/// dispatch cycle (frame) before handling input.
///
/// [`begin_cycle`]: DirectoryMenuApplet::begin_cycle
pub struct DirectoryMenuApplet {
    settings: AppletSettings,
    options: ListingOptions,
    lister: Box<dyn FileLister>,
    launcher: Box<dyn Launcher>,
    button_active: bool,
    visible: bool,
    popup: Option<DirectoryMenu>,
    retired: Vec<DirectoryMenu>,
    errors: Vec<ErrorDialog>,
}

impl DirectoryMenuApplet {
    pub fn new(
        settings: AppletSettings,
        lister: Box<dyn FileLister>,
        launcher: Box<dyn Launcher>,
    ) -> Self {
        let mut applet = Self {
            settings: AppletSettings::default(),
            options: ListingOptions::default(),
            lister,
            launcher,
            button_active: false,
            visible: true,
            popup: None,
            retired: Vec::new(),
            errors: Vec::new(),
        };
        applet.apply_settings(settings);
        applet
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &AppletSettings {
        &self.settings
    }

    /// Replace all four properties, normalising the base directory and
    /// recompiling the patterns.
    pub fn apply_settings(&mut self, settings: AppletSettings) {
        let AppletSettings {
            base_directory,
            icon_name,
            file_pattern,
            hidden_files,
        } = settings;
        self.set_base_directory(&base_directory);
        self.set_icon_name(&icon_name);
        self.set_file_pattern(&file_pattern);
        self.set_hidden_files(hidden_files);
    }

    pub fn set_base_directory(&mut self, value: &str) {
        self.settings.set_base_directory(value);
    }

    pub fn set_icon_name(&mut self, value: &str) {
        self.settings.icon_name = value.to_string();
    }

    pub fn set_file_pattern(&mut self, value: &str) {
        self.settings.file_pattern = value.to_string();
        self.options.patterns = parse_file_patterns(value);
    }

    pub fn set_hidden_files(&mut self, value: bool) {
        self.settings.hidden_files = value;
        self.options.show_hidden = value;
    }

    pub fn icon_name(&self) -> &str {
        self.settings.effective_icon_name()
    }

    pub fn tooltip(&self) -> String {
        self.settings.display_name()
    }

    pub fn listing_options(&self) -> &ListingOptions {
        &self.options
    }

    // ── Popup lifecycle ───────────────────────────────────────────────────────

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_open(&self) -> bool {
        self.button_active
    }

    /// Start of a dispatch cycle: destroy menus retired during the last one.
    pub fn begin_cycle(&mut self) {
        self.retired.clear();
        if let Some(menu) = self.popup.as_mut() {
            menu.flush_pending();
        }
    }

    /// The toggle button changed state.
    pub fn toggled(&mut self, active: bool) {
        if !active {
            self.button_active = false;
            return;
        }
        if self.button_active {
            return;
        }
        self.button_active = true;
        let mut menu = DirectoryMenu::new(self.settings.base_directory_path());
        menu.show(MenuSource {
            lister: self.lister.as_ref(),
            options: &self.options,
        });
        if let Some(old) = self.popup.replace(menu) {
            self.retired.push(old);
        }
    }

    /// The popup was dismissed or an item was chosen.
    ///
    /// The menu is not dropped until the next [`begin_cycle`], so an
    /// activation handled in the same cycle still sees its rows.
    ///
    /// [`begin_cycle`]: DirectoryMenuApplet::begin_cycle
    pub fn deactivate(&mut self) {
        self.button_active = false;
        if let Some(mut menu) = self.popup.take() {
            menu.hide();
            self.retired.push(menu);
        }
    }

    /// Handle a remote command. Returns `true` when it was consumed.
    pub fn remote_event(&mut self, name: &str) -> bool {
        if name == POPUP_COMMAND && self.visible && !self.button_active {
            tracing::info!("popup requested remotely");
            self.toggled(true);
            return true;
        }
        false
    }

    /// Open menu with the capability needed to lazily load its submenus.
    pub fn menu_and_source(&mut self) -> Option<(&mut DirectoryMenu, MenuSource<'_>)> {
        let menu = self.popup.as_mut()?;
        Some((
            menu,
            MenuSource {
                lister: self.lister.as_ref(),
                options: &self.options,
            },
        ))
    }

    pub fn menu(&self) -> Option<&DirectoryMenu> {
        self.popup.as_ref()
    }

    // ── Activation ────────────────────────────────────────────────────────────

    /// Run a chosen row's action, then close the menu. Failures become
    /// error dialogs.
    pub fn activate(&mut self, action: &MenuAction) {
        if let Err(err) = self.dispatch(action) {
            tracing::warn!(
                error = %err,
                reason = ?err.source().map(|s| s.to_string()),
                "activation failed"
            );
            self.errors.push(ErrorDialog::from(&err));
        }
        self.deactivate();
    }

    fn dispatch(&self, action: &MenuAction) -> Result<(), LaunchError> {
        match action {
            MenuAction::OpenFolder(dir) => {
                self.launcher.open_preferred(PreferredApp::FileManager, dir)
            }
            MenuAction::OpenTerminal(dir) => self
                .launcher
                .open_preferred(PreferredApp::TerminalEmulator, dir),
            MenuAction::LaunchFile(file) => self.launcher.open_with_default(file),
            MenuAction::LaunchApplication(entry) => self.launcher.launch_application(entry),
        }
    }

    pub fn errors(&self) -> &[ErrorDialog] {
        &self.errors
    }

    pub fn dismiss_error(&mut self) {
        if !self.errors.is_empty() {
            self.errors.remove(0);
        }
    }

    pub fn base_directory(&self) -> PathBuf {
        self.settings.base_directory_path()
    }
}
