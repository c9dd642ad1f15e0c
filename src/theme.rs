use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub outline_color: String,
    pub outline_width: f32,
    pub plate_color: String,
    pub plate_opacity: f32,
    pub text_color: String,
}

impl Theme {
    /// Red outlines, half-transparent black plates, white text.
    pub fn field_default() -> Self {
        Self {
            font_family: "DejaVu Sans, Arial, Helvetica, sans-serif".to_string(),
            font_size: 14.0,
            outline_color: "#FF0000".to_string(),
            outline_width: 2.0,
            plate_color: "#000000".to_string(),
            plate_opacity: 0.5,
            text_color: "#FFFFFF".to_string(),
        }
    }

    pub fn high_contrast() -> Self {
        Self {
            font_family: "DejaVu Sans Mono, Menlo, Consolas, monospace".to_string(),
            font_size: 16.0,
            outline_color: "#FFD400".to_string(),
            outline_width: 3.0,
            plate_color: "#000000".to_string(),
            plate_opacity: 0.8,
            text_color: "#FFFFFF".to_string(),
        }
    }

    /// First concrete family name, used as the rasterizer's fallback font.
    pub fn primary_family(&self) -> &str {
        self.font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .find(|part| !part.is_empty())
            .unwrap_or("sans-serif")
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::field_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_family_skips_quotes_and_blanks() {
        let mut theme = Theme::field_default();
        theme.font_family = " , \"Noto Sans\", sans-serif".to_string();
        assert_eq!(theme.primary_family(), "Noto Sans");
    }
}
