pub mod app;
mod icons;
mod retro_ui;
mod settings_dialog;

pub use app::{configure_native_context, DirMenuApp};
