use std::time::Duration;

use eframe::egui::{
    self, Button, Context, FontFamily, FontId, Id, PopupCloseBehavior, RichText, TextStyle, Ui,
};

use super::icons::{glyph_for, row_text};
use super::retro_ui::{configure_visuals, current_palette};
use super::settings_dialog::SettingsDialog;
use crate::applet::DirectoryMenuApplet;
use crate::menu::{DirectoryMenu, MenuAction, MenuSource, RowKind};
use crate::remote::RemoteServer;

const POPUP_ID: &str = "dirmenu_popup";
/// Fallback poll interval for remote commands when no wake-up arrives.
const REMOTE_POLL: Duration = Duration::from_millis(500);

pub fn configure_native_context(ctx: &Context) {
    configure_visuals(ctx);
    let mut style = (*ctx.style()).clone();
    style.text_styles = [
        (TextStyle::Heading, FontId::new(18.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(14.0, FontFamily::Proportional)),
        (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
        (TextStyle::Button, FontId::new(14.0, FontFamily::Proportional)),
        (TextStyle::Small, FontId::new(11.0, FontFamily::Proportional)),
    ]
    .into();
    ctx.set_style(style);
}

pub struct DirMenuApp {
    applet_id: String,
    applet: DirectoryMenuApplet,
    remote: Option<RemoteServer>,
    settings: Option<SettingsDialog>,
    popup_on_start: bool,
}

impl DirMenuApp {
    pub fn new(
        applet_id: String,
        applet: DirectoryMenuApplet,
        remote: Option<RemoteServer>,
        popup_on_start: bool,
    ) -> Self {
        Self {
            applet_id,
            applet,
            remote,
            settings: None,
            popup_on_start,
        }
    }

    fn poll_remote(&mut self, ctx: &Context) {
        let Some(remote) = &self.remote else {
            return;
        };
        while let Some(name) = remote.poll() {
            if !self.applet.remote_event(&name) {
                tracing::debug!(command = %name, "remote command ignored");
            }
        }
        ctx.request_repaint_after(REMOTE_POLL);
    }

    fn draw_button(&mut self, ctx: &Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(current_palette().bg).inner_margin(4.0))
            .show(ctx, |ui| {
                let popup_id = Id::new(POPUP_ID);
                let label = RichText::new(glyph_for(self.applet.icon_name())).size(24.0);
                let response = ui
                    .add(Button::new(label).selected(self.applet.is_open()))
                    .on_hover_text(self.applet.tooltip());

                if response.clicked() {
                    if self.applet.is_open() {
                        self.applet.deactivate();
                    } else {
                        self.applet.toggled(true);
                    }
                }
                response.context_menu(|ui| {
                    if ui.button("Properties…").clicked() {
                        self.settings = Some(SettingsDialog::new(self.applet.settings()));
                        ui.close_menu();
                    }
                });

                // Keep egui's popup state in step with the toggle button.
                let popup_open = ui.memory(|mem| mem.is_popup_open(popup_id));
                if self.applet.is_open() && !popup_open {
                    ui.memory_mut(|mem| mem.open_popup(popup_id));
                } else if !self.applet.is_open() && popup_open {
                    ui.memory_mut(|mem| mem.close_popup());
                }

                let chosen = match self.applet.menu_and_source() {
                    Some((menu, source)) => egui::popup_below_widget(
                        ui,
                        popup_id,
                        &response,
                        PopupCloseBehavior::CloseOnClickOutside,
                        |ui| {
                            ui.set_min_width(220.0);
                            menu_rows(ui, menu, source)
                        },
                    )
                    .flatten(),
                    None => None,
                };

                if let Some(action) = chosen {
                    tracing::debug!(?action, "menu item activated");
                    self.applet.activate(&action);
                    ui.memory_mut(|mem| mem.close_popup());
                } else if self.applet.is_open() && !ui.memory(|mem| mem.is_popup_open(popup_id)) {
                    self.applet.deactivate();
                }
            });
    }

    fn draw_error_dialog(&mut self, ctx: &Context) {
        let Some(error) = self.applet.errors().first().cloned() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Error")
            .id(Id::new("dirmenu_error"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(RichText::new(&error.message).strong());
                if let Some(detail) = &error.detail {
                    ui.label(RichText::new(detail).color(current_palette().dim));
                }
                ui.separator();
                if ui.button("Close").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.applet.dismiss_error();
        }
    }

    fn draw_settings(&mut self, ctx: &Context) {
        let Some(dialog) = self.settings.as_mut() else {
            return;
        };
        dialog.show(ctx, &mut self.applet, &self.applet_id);
        if !dialog.open {
            self.settings = None;
        }
    }
}

/// Draw one menu level, loading it on demand. Returns the chosen action.
fn menu_rows(ui: &mut Ui, menu: &mut DirectoryMenu, source: MenuSource<'_>) -> Option<MenuAction> {
    menu.show(source);
    let mut chosen = None;
    for row in menu.rows_mut() {
        let text = row_text(row.icon.as_deref(), &row.label);
        match &mut row.kind {
            RowKind::Separator => {
                ui.separator();
            }
            RowKind::Action(action) => {
                let mut response = ui.add(Button::new(text).frame(false));
                if let Some(tooltip) = &row.tooltip {
                    response = response.on_hover_text(tooltip);
                }
                if response.clicked() {
                    chosen = Some(action.clone());
                    ui.close_menu();
                }
            }
            RowKind::Submenu(sub) => {
                let opened = ui.menu_button(text, |ui| menu_rows(ui, sub, source)).inner;
                match opened {
                    Some(Some(action)) => chosen = Some(action),
                    Some(None) => {}
                    None if sub.is_loaded() => sub.hide(),
                    None => {}
                }
            }
        }
    }
    chosen
}

impl eframe::App for DirMenuApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        current_palette().bg.to_normalized_gamma_f32()
    }

    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.applet.begin_cycle();
        if std::mem::take(&mut self.popup_on_start) {
            self.applet.remote_event(crate::applet::POPUP_COMMAND);
        }
        self.poll_remote(ctx);
        self.draw_button(ctx);
        self.draw_error_dialog(ctx);
        self.draw_settings(ctx);
    }
}
