use ratatui::style::{Color, Modifier, Style};

use livepoll::model::ColorTag;

/// Terminal palette
#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub text: Color,
    pub text_muted: Color,
    pub border_focused: Color,
    pub border_normal: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            text: Color::White,
            text_muted: Color::Gray,
            border_focused: Color::Cyan,
            border_normal: Color::DarkGray,
        }
    }
}

impl Theme {
    pub fn catppuccin_mocha() -> Self {
        Self {
            primary: Color::Rgb(0x89, 0xb4, 0xfa),
            success: Color::Rgb(0xa6, 0xe3, 0xa1),
            warning: Color::Rgb(0xf9, 0xe2, 0xaf),
            error: Color::Rgb(0xf3, 0x8b, 0xa8),
            text: Color::Rgb(0xcd, 0xd6, 0xf4),
            text_muted: Color::Rgb(0xa6, 0xad, 0xc8),
            border_focused: Color::Rgb(0x89, 0xb4, 0xfa),
            border_normal: Color::Rgb(0x58, 0x5b, 0x70),
        }
    }

    pub fn nord() -> Self {
        Self {
            primary: Color::Rgb(0x88, 0xc0, 0xd0),
            success: Color::Rgb(0xa3, 0xbe, 0x8c),
            warning: Color::Rgb(0xeb, 0xcb, 0x8b),
            error: Color::Rgb(0xbf, 0x61, 0x6a),
            text: Color::Rgb(0xec, 0xef, 0xf4),
            text_muted: Color::Rgb(0xd8, 0xde, 0xe9),
            border_focused: Color::Rgb(0x88, 0xc0, 0xd0),
            border_normal: Color::Rgb(0x4c, 0x56, 0x6a),
        }
    }

    pub fn from_preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default()),
            "catppuccin" | "catppuccin-mocha" => Some(Self::catppuccin_mocha()),
            "nord" => Some(Self::nord()),
            _ => None,
        }
    }

    /// Bar color for an option's tag. Unknown tags fall back to the accent.
    pub fn option_color(&self, tag: &ColorTag) -> Color {
        match tag.as_str() {
            "bg-red-500" => Color::Red,
            "bg-blue-500" => Color::Blue,
            "bg-green-500" => Color::Green,
            "bg-yellow-500" => Color::Yellow,
            "bg-purple-500" => Color::Magenta,
            _ => self.primary,
        }
    }

    pub fn highlight_style(&self) -> Style {
        Style::default()
            .fg(self.warning)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.border_focused)
        } else {
            Style::default().fg(self.border_normal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_colors_follow_rotation() {
        let theme = Theme::default();
        assert_eq!(theme.option_color(&ColorTag::for_position(0)), Color::Red);
        assert_eq!(theme.option_color(&ColorTag::for_position(4)), Color::Magenta);
        assert_eq!(theme.option_color(&ColorTag::new("bg-teal-300")), theme.primary);
    }

    #[test]
    fn test_theme_presets() {
        assert!(Theme::from_preset("catppuccin").is_some());
        assert!(Theme::from_preset("Nord").is_some());
        assert!(Theme::from_preset("nonexistent").is_none());
    }
}
