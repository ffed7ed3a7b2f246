pub mod applet;
pub mod config;
pub mod content_type;
pub mod desktop_entry;
pub mod launcher;
pub mod listing;
pub mod menu;
pub mod native;
pub mod pattern;
pub mod remote;
