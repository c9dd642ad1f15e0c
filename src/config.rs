use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between a label plate and the box edge or a neighbouring plate.
    pub label_padding: f32,
    /// Space between a plate's border and its text.
    pub plate_inset: f32,
    pub date_prefix: String,
    pub coordinate_precision: usize,
    pub fast_text_metrics: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            label_padding: 5.0,
            plate_inset: 2.0,
            date_prefix: "Fecha: ".to_string(),
            coordinate_precision: 4,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Disable anti-aliasing on outlines and plates.
    pub crisp_edges: bool,
    /// Load system fonts into the rasterizer when no measured face is given.
    pub system_fonts: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            crisp_edges: true,
            system_fonts: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON-lines file receiving one record per box. No persistence when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<NumberOrString>,
    outline_color: Option<String>,
    outline_width: Option<NumberOrString>,
    plate_color: Option<String>,
    plate_opacity: Option<NumberOrString>,
    text_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    label_padding: Option<f32>,
    plate_inset: Option<f32>,
    date_prefix: Option<String>,
    coordinate_precision: Option<usize>,
    fast_text_metrics: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    crisp_edges: Option<bool>,
    system_fonts: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreConfigFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().trim_end_matches("px").parse::<f32>().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    render: Option<RenderConfigFile>,
    store: Option<StoreConfigFile>,
}

/// Load a JSON (comments allowed) config file over the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config = parse_config(&contents)?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "high-contrast" | "highContrast" => config.theme = Theme::high_contrast(),
            "field" | "default" => config.theme = Theme::field_default(),
            other => log::warn!("unknown theme '{other}', keeping the default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size.as_ref().and_then(NumberOrString::as_f32) {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.outline_color {
            config.theme.outline_color = v;
        }
        if let Some(v) = vars.outline_width.as_ref().and_then(NumberOrString::as_f32) {
            config.theme.outline_width = v;
        }
        if let Some(v) = vars.plate_color {
            config.theme.plate_color = v;
        }
        if let Some(v) = vars.plate_opacity.as_ref().and_then(NumberOrString::as_f32) {
            config.theme.plate_opacity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.label_padding {
            config.layout.label_padding = v;
        }
        if let Some(v) = layout.plate_inset {
            config.layout.plate_inset = v;
        }
        if let Some(v) = layout.date_prefix {
            config.layout.date_prefix = v;
        }
        if let Some(v) = layout.coordinate_precision {
            config.layout.coordinate_precision = v;
        }
        if let Some(v) = layout.fast_text_metrics {
            config.layout.fast_text_metrics = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.crisp_edges {
            config.render.crisp_edges = v;
        }
        if let Some(v) = render.system_fonts {
            config.render.system_fonts = v;
        }
    }

    if let Some(store) = parsed.store {
        config.store.path = store.path;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config.layout.label_padding, 5.0);
        assert_eq!(config.layout.plate_inset, 2.0);
        assert_eq!(config.theme.outline_color, "#FF0000");
        assert!(config.store.path.is_none());
    }

    #[test]
    fn overrides_merge_onto_defaults() {
        let config = parse_config(
            r#"{
                // comments are fine
                theme: "high-contrast",
                themeVariables: { fontSize: "18px", plateOpacity: 2.0 },
                layout: { datePrefix: "Date: ", fastTextMetrics: true },
                store: { path: "records.jsonl" },
            }"#,
        )
        .expect("parse");
        assert_eq!(config.theme.outline_color, "#FFD400");
        assert_eq!(config.theme.font_size, 18.0);
        assert_eq!(config.theme.plate_opacity, 1.0);
        assert_eq!(config.layout.date_prefix, "Date: ");
        assert!(config.layout.fast_text_metrics);
        assert_eq!(config.layout.label_padding, 5.0);
        assert_eq!(config.store.path, Some(PathBuf::from("records.jsonl")));
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("{ layout: ").is_err());
    }
}
