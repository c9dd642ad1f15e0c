// Placement of the name, date and coordinate labels around one bounding box.
// Pure geometry: text sizes come in through `TextMeasure`, nothing is drawn.

use super::text::BoxLabels;
use super::types::{ImageBounds, LabelKind, LabelPlacement};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::ir::BoundingBox;
use crate::text_metrics::TextMeasure;

/// Compute plate rectangles for every label of `bbox`.
///
/// The name sits above the box's top-left corner and drops inside the box
/// when it would leave the top of the image. The date shares the name's row
/// at the top-right, or moves one row down when the name was dropped inside.
/// Coordinates always sit inside the top-right corner, below a dropped name.
/// Any label that still intersects an earlier label of the same box is
/// pushed below it. Labels of different boxes are not checked against each
/// other, and nothing is clamped at the right or bottom edge.
pub fn compute_placements(
    bbox: &BoundingBox,
    labels: &BoxLabels,
    bounds: ImageBounds,
    measure: &dyn TextMeasure,
    config: &LayoutConfig,
) -> Result<Vec<LabelPlacement>> {
    let x1 = bbox.x1.min(bbox.x2);
    let x2 = bbox.x1.max(bbox.x2);
    let y1 = bbox.y1.min(bbox.y2);
    let pad = config.label_padding;

    let name = sized_plate(LabelKind::Name, &labels.name, measure, config)?;
    let above_y = y1 - name.height - pad;
    let name_inside = above_y < 0.0;
    let name = if name_inside {
        name.at(x1, y1 + pad)
    } else {
        name.at(x1, above_y)
    };
    let below_name = name.bottom() + pad;

    let mut placements = Vec::with_capacity(3);
    placements.push(name.clone());

    if let Some(text) = labels.date.as_deref() {
        let date = sized_plate(LabelKind::Date, text, measure, config)?;
        let y = if name_inside { below_name } else { name.y };
        let x = x2 - date.width;
        let date = settle(date.at(x, y), &placements, pad);
        placements.push(date);
    }

    if let Some(text) = labels.coordinates.as_deref() {
        let coords = sized_plate(LabelKind::Coordinates, text, measure, config)?;
        let mut y = y1 + pad;
        if name_inside && y < name.bottom() {
            y = below_name;
        }
        let x = x2 - coords.width - pad;
        let coords = settle(coords.at(x, y), &placements, pad);
        placements.push(coords);
    }

    for placement in placements.iter().filter(|p| !p.is_within(bounds)) {
        log::debug!(
            "{:?} label '{}' at ({:.1}, {:.1}) extends past the {}x{} image",
            placement.kind,
            placement.text,
            placement.x,
            placement.y,
            bounds.width,
            bounds.height
        );
    }

    Ok(placements)
}

fn sized_plate(
    kind: LabelKind,
    text: &str,
    measure: &dyn TextMeasure,
    config: &LayoutConfig,
) -> Result<LabelPlacement> {
    let extent = measure.measure(text)?;
    let inset = config.plate_inset;
    Ok(LabelPlacement {
        kind,
        x: 0.0,
        y: 0.0,
        width: extent.width.max(0.0) + 2.0 * inset,
        height: extent.height.max(0.0) + 2.0 * inset,
        text: text.to_string(),
        text_ascent: extent.ascent,
    })
}

/// Push `candidate` down until it clears every placed label. Each placed
/// label can only push once, so this runs at most `placed.len()` rounds.
fn settle(mut candidate: LabelPlacement, placed: &[LabelPlacement], pad: f32) -> LabelPlacement {
    for _ in 0..=placed.len() {
        let lowest = placed
            .iter()
            .filter(|other| candidate.intersects(other))
            .map(LabelPlacement::bottom)
            .fold(None, |acc: Option<f32>, bottom| {
                Some(acc.map_or(bottom, |acc| acc.max(bottom)))
            });
        match lowest {
            Some(bottom) => candidate.y = bottom + pad,
            None => break,
        }
    }
    candidate
}
