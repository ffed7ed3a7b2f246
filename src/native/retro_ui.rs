use eframe::egui::{self, Color32, Context};

/// Phosphor green used for text and highlights.
const PHOSPHOR: Color32 = Color32::from_rgb(111, 255, 84);

#[derive(Debug, Clone, Copy)]
pub struct RetroPalette {
    pub fg: Color32,
    pub dim: Color32,
    pub bg: Color32,
    pub panel: Color32,
    pub selected_bg: Color32,
    pub selected_fg: Color32,
    pub hovered_bg: Color32,
    pub active_bg: Color32,
    pub error: Color32,
}

fn scale(color: Color32, factor: f32) -> Color32 {
    let [r, g, b, a] = color.to_array();
    Color32::from_rgba_unmultiplied(
        ((r as f32) * factor).clamp(0.0, 255.0) as u8,
        ((g as f32) * factor).clamp(0.0, 255.0) as u8,
        ((b as f32) * factor).clamp(0.0, 255.0) as u8,
        a,
    )
}

pub fn palette_for(fg: Color32) -> RetroPalette {
    let brightness = (fg.r() as u16 + fg.g() as u16 + fg.b() as u16) / 3;
    let selected_fg = if brightness > 96 {
        Color32::BLACK
    } else {
        Color32::WHITE
    };
    RetroPalette {
        fg,
        dim: scale(fg, 0.52),
        bg: Color32::from_rgb(0, 0, 0),
        panel: scale(fg, 0.06),
        selected_bg: fg,
        selected_fg,
        hovered_bg: scale(fg, 0.18),
        active_bg: scale(fg, 0.26),
        error: Color32::from_rgb(255, 90, 90),
    }
}

pub fn current_palette() -> RetroPalette {
    palette_for(PHOSPHOR)
}

pub fn configure_visuals(ctx: &Context) {
    let palette = current_palette();
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(palette.fg);
    visuals.window_fill = palette.bg;
    visuals.panel_fill = palette.bg;
    visuals.widgets.noninteractive.bg_fill = palette.panel;
    visuals.widgets.noninteractive.fg_stroke.color = palette.dim;
    visuals.widgets.inactive.bg_fill = palette.bg;
    visuals.widgets.inactive.weak_bg_fill = palette.bg;
    visuals.widgets.inactive.fg_stroke.color = palette.fg;
    visuals.widgets.hovered.bg_fill = palette.hovered_bg;
    visuals.widgets.hovered.weak_bg_fill = palette.hovered_bg;
    visuals.widgets.hovered.fg_stroke.color = palette.fg;
    visuals.widgets.active.bg_fill = palette.active_bg;
    visuals.widgets.active.weak_bg_fill = palette.active_bg;
    visuals.widgets.active.fg_stroke.color = palette.fg;
    visuals.selection.bg_fill = palette.active_bg;
    visuals.selection.stroke.color = palette.fg;
    visuals.extreme_bg_color = palette.bg;
    visuals.faint_bg_color = palette.panel;
    visuals.error_fg_color = palette.error;
    ctx.set_visuals(visuals);
}
