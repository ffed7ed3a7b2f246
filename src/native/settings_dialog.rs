use eframe::egui::{self, Context, Id};

use crate::applet::DirectoryMenuApplet;
use crate::config::{save_settings, AppletSettings};

const PATTERN_HINT: &str = "Semicolon separated list of file patterns shown in the menu, \
    for example *.txt;*.md. Leave empty to show every file.";

/// Properties window. Edits apply to the applet as they are made.
pub struct SettingsDialog {
    pub open: bool,
    draft: AppletSettings,
}

impl SettingsDialog {
    pub fn new(current: &AppletSettings) -> Self {
        Self {
            open: true,
            draft: current.clone(),
        }
    }

    /// Push edited fields into `applet`. Returns `true` when anything changed.
    pub fn apply(&self, applet: &mut DirectoryMenuApplet) -> bool {
        let current = applet.settings().clone();
        let mut changed = false;
        if self.draft.base_directory != current.base_directory {
            applet.set_base_directory(&self.draft.base_directory);
            changed = true;
        }
        if self.draft.icon_name != current.icon_name {
            applet.set_icon_name(&self.draft.icon_name);
            changed = true;
        }
        if self.draft.file_pattern != current.file_pattern {
            applet.set_file_pattern(&self.draft.file_pattern);
            changed = true;
        }
        if self.draft.hidden_files != current.hidden_files {
            applet.set_hidden_files(self.draft.hidden_files);
            changed = true;
        }
        changed
    }

    pub fn show(&mut self, ctx: &Context, applet: &mut DirectoryMenuApplet, applet_id: &str) {
        let mut open = self.open;
        let mut close_clicked = false;
        let mut edited = false;
        egui::Window::new("Directory Menu")
            .id(Id::new("dirmenu_settings"))
            .open(&mut open)
            .collapsible(false)
            .default_size([420.0, 220.0])
            .show(ctx, |ui| {
                ui.heading("Appearance");
                egui::Grid::new("dirmenu_settings_appearance")
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.label("Base directory");
                        let response = ui.text_edit_singleline(&mut self.draft.base_directory);
                        edited |= response.lost_focus();
                        ui.end_row();

                        ui.label("Icon");
                        edited |= ui.text_edit_singleline(&mut self.draft.icon_name).changed();
                        ui.end_row();
                    });
                ui.separator();
                ui.heading("Filtering");
                egui::Grid::new("dirmenu_settings_filtering")
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.label("File pattern");
                        edited |= ui
                            .text_edit_singleline(&mut self.draft.file_pattern)
                            .on_hover_text(PATTERN_HINT)
                            .changed();
                        ui.end_row();
                    });
                edited |= ui
                    .checkbox(&mut self.draft.hidden_files, "Show hidden files")
                    .changed();
                ui.separator();
                if ui.button("Close").clicked() {
                    close_clicked = true;
                }
            });

        if edited && self.apply(applet) {
            // Show the stored form, e.g. a URI converted to a path.
            self.draft.base_directory = applet.settings().base_directory.clone();
            if let Err(err) = save_settings(applet_id, applet.settings()) {
                tracing::warn!(error = %err, "failed to save applet settings");
            }
        }
        self.open = open && !close_clicked;
    }
}
