//! Colors, icons and column widths shared by every view.

use crossterm::style::Color;

#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Wheel file names and package names
    pub primary: Color,
    /// Versions
    pub version: Color,
    /// Sizes, dates and pending rows
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    /// In-flight rows
    pub active: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            version: Color::White,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            active: Color::Blue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Icons {
    pub pending: &'static str,
    pub active: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            pending: "○",
            active: "●",
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    /// Width of the file name column in the download table
    pub file_width: usize,
    /// Width of the package name column in listings
    pub name_width: usize,
    pub version_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            file_width: 56,
            name_width: 24,
            version_width: 12,
        }
    }
}

/// Format bytes for human-readable display
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

/// Shorten `text` to `width` characters, ending in `…` when cut.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 * 5), "5.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("six.whl", 10), "six.whl");
        assert_eq!(truncate("numpy-1.26.4-cp311.whl", 8), "numpy-1…");
        assert_eq!(truncate("numpy-1.26.4-cp311.whl", 8).chars().count(), 8);
    }
}
