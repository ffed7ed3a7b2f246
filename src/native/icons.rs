/// Glyph drawn for a freedesktop icon name.
///
/// Themed icons are not loaded; names are reduced to a handful of symbols
/// the bundled emoji font can render.
pub fn glyph_for(icon_name: &str) -> &'static str {
    match icon_name {
        "folder" | "user-home" | "inode-directory" => "🗀",
        "document-open" | "folder-open" => "🗁",
        "utilities-terminal" | "terminal" => "🖳",
        "application-x-executable" | "application-x-desktop" => "⚙",
        "text-x-script" | "application-x-shellscript" => "📜",
        "package-x-generic" => "📦",
        _ => glyph_for_family(icon_name),
    }
}

fn glyph_for_family(icon_name: &str) -> &'static str {
    let family = icon_name.split('-').next().unwrap_or_default();
    match family {
        "text" => "📝",
        "image" => "🖼",
        "audio" => "🎵",
        "video" => "🎞",
        _ if icon_name.starts_with("application-pdf") => "📕",
        _ if icon_name.contains("zip") || icon_name.contains("tar") => "📦",
        _ => "🗋",
    }
}

pub fn row_text(icon: Option<&str>, label: &str) -> String {
    match icon {
        Some(icon) => format!("{}  {label}", glyph_for(icon)),
        None => label.to_string(),
    }
}
