use crossterm::style::{style, Color, Stylize};

#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub name: &'static str,
    pub accent: Color,
    pub muted: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub user_color: Color,
    pub assistant_color: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark",
            accent: Color::Rgb { r: 122, g: 162, b: 247 },
            muted: Color::Rgb { r: 100, g: 116, b: 139 },
            success: Color::Rgb { r: 158, g: 206, b: 106 },
            error: Color::Rgb { r: 247, g: 118, b: 142 },
            warning: Color::Rgb { r: 224, g: 175, b: 104 },
            user_color: Color::Rgb { r: 199, g: 210, b: 254 },
            assistant_color: Color::Rgb { r: 226, g: 232, b: 240 },
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            accent: Color::Rgb { r: 37, g: 99, b: 235 },
            muted: Color::Rgb { r: 100, g: 116, b: 139 },
            success: Color::Rgb { r: 22, g: 163, b: 74 },
            error: Color::Rgb { r: 220, g: 38, b: 38 },
            warning: Color::Rgb { r: 202, g: 138, b: 4 },
            user_color: Color::Rgb { r: 30, g: 64, b: 175 },
            assistant_color: Color::Rgb { r: 15, g: 23, b: 42 },
        }
    }

    pub fn dracula() -> Self {
        Self {
            name: "dracula",
            accent: Color::Rgb { r: 255, g: 121, b: 198 },
            muted: Color::Rgb { r: 98, g: 114, b: 164 },
            success: Color::Rgb { r: 80, g: 250, b: 123 },
            error: Color::Rgb { r: 255, g: 85, b: 85 },
            warning: Color::Rgb { r: 241, g: 250, b: 140 },
            user_color: Color::Rgb { r: 139, g: 233, b: 253 },
            assistant_color: Color::Rgb { r: 248, g: 248, b: 242 },
        }
    }

    /// Look up a theme by name. Unknown names yield `None`.
    pub fn find(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "dark" => Some(Self::dark()),
            "light" => Some(Self::light()),
            "dracula" => Some(Self::dracula()),
            _ => None,
        }
    }

    /// Like [`Theme::find`], with an error naming the available themes.
    pub fn parse(name: &str) -> Result<Self, String> {
        Self::find(name).ok_or_else(|| {
            format!(
                "Unknown theme: {name}. Available: {}",
                Self::all_names().join(", ")
            )
        })
    }

    /// Like [`Theme::find`], falling back to the dark theme.
    pub fn by_name(name: &str) -> Self {
        Self::find(name).unwrap_or_else(Self::dark)
    }

    pub fn all_names() -> &'static [&'static str] {
        &["dark", "light", "dracula"]
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        style(text).with(color).to_string()
    }

    pub fn prompt(&self) -> String {
        format!("{} ", style("you ›").with(self.user_color).bold())
    }

    pub fn assistant_label(&self, model: &str) -> String {
        format!("{} ", style(format!("{model} ›")).with(self.accent).bold())
    }

    pub fn error_text(&self, text: &str) -> String {
        self.paint(text, self.error)
    }

    pub fn info_text(&self, text: &str) -> String {
        self.paint(text, self.muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_and_unknown() {
        assert_eq!(Theme::find("Light").unwrap().name, "light");
        assert!(Theme::find("solarized").is_none());
        assert_eq!(Theme::by_name("solarized").name, "dark");
    }

    #[test]
    fn test_all_names_resolve() {
        for name in Theme::all_names() {
            assert_eq!(Theme::find(name).unwrap().name, *name);
        }
    }
}
