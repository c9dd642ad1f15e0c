use crate::config::LayoutConfig;
use crate::ir::{BoundingBox, GeoPoint};

/// Label strings attached to one box, in placement priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxLabels {
    pub name: String,
    pub date: Option<String>,
    pub coordinates: Option<String>,
}

impl BoxLabels {
    pub fn for_box(bbox: &BoundingBox, geo: Option<GeoPoint>, config: &LayoutConfig) -> Self {
        let date = (!bbox.date.is_empty()).then(|| date_text(&config.date_prefix, &bbox.date));
        Self {
            name: single_line(&bbox.name),
            date,
            coordinates: geo.map(|geo| coordinates_text(geo, config.coordinate_precision)),
        }
    }
}

pub(super) fn date_text(prefix: &str, date: &str) -> String {
    single_line(&format!("{prefix}{date}"))
}

/// Drop control characters and the U+FFFE/U+FFFF noncharacters. Labels are
/// one line, and the overlay SVG cannot carry them.
pub(super) fn single_line(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_control() && !matches!(ch, '\u{FFFE}' | '\u{FFFF}'))
        .collect()
}

pub(super) fn coordinates_text(geo: GeoPoint, precision: usize) -> String {
    format!(
        "Lat: {:.prec$}, Lon: {:.prec$}",
        geo.latitude,
        geo.longitude,
        prec = precision
    )
}
