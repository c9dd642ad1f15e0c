use crate::config::{Config, LayoutConfig, RenderConfig};
use crate::error::{AnnotateError, Result};
use crate::ir::{BoundingBox, GeoPoint};
use crate::layout::{BoxLabels, BoxLayout, ImageBounds, compute_placements};
use crate::text_metrics::TextMeasure;
use crate::theme::Theme;
use image::{Rgb, RgbImage};
use resvg::tiny_skia::{IntSize, Pixmap, Transform};
use std::sync::Arc;

/// Draws box outlines and label plates onto a raster. Holds the rasterizer's
/// font database, so build one per process and reuse it across requests.
pub struct Renderer {
    options: usvg::Options<'static>,
    theme: Theme,
    layout: LayoutConfig,
    render: RenderConfig,
}

impl Renderer {
    /// `font_data` is the face used for measuring. When given, it is the only
    /// face the rasterizer sees, so drawn glyphs match the measured widths
    /// and system fonts are not scanned a second time.
    pub fn new(config: &Config, font_data: Option<&[u8]>) -> Self {
        let mut db = usvg::fontdb::Database::new();
        let mut font_family = config.theme.primary_family().to_string();
        match font_data {
            Some(data) => {
                db.load_font_data(data.to_vec());
                if let Some((name, _)) = db.faces().next().and_then(|face| face.families.first()) {
                    font_family = name.clone();
                }
            }
            None if config.render.system_fonts => db.load_system_fonts(),
            None => {}
        }
        let options = usvg::Options {
            font_family,
            fontdb: Arc::new(db),
            ..usvg::Options::default()
        };
        Self {
            options,
            theme: config.theme.clone(),
            layout: config.layout.clone(),
            render: config.render.clone(),
        }
    }

    pub(crate) fn font_count(&self) -> usize {
        self.options.fontdb.len()
    }

    /// Lay out and paint every box in input order. Returns the layouts that
    /// were drawn.
    pub fn render(
        &self,
        image: &mut RgbImage,
        boxes: &[BoundingBox],
        geo: Option<GeoPoint>,
        measure: &dyn TextMeasure,
    ) -> Result<Vec<BoxLayout>> {
        let (width, height) = image.dimensions();
        let layouts = layout_boxes(
            boxes,
            geo,
            ImageBounds::new(width, height),
            measure,
            &self.layout,
        )?;
        if layouts.is_empty() {
            return Ok(layouts);
        }
        let svg = overlay_svg(&layouts, width, height, &self.theme, &self.layout, &self.render);
        rasterize_overlay(&svg, image, &self.options)?;
        log::debug!("painted {} boxes onto {}x{} raster", layouts.len(), width, height);
        Ok(layouts)
    }
}

pub fn layout_boxes(
    boxes: &[BoundingBox],
    geo: Option<GeoPoint>,
    bounds: ImageBounds,
    measure: &dyn TextMeasure,
    config: &LayoutConfig,
) -> Result<Vec<BoxLayout>> {
    boxes
        .iter()
        .map(|bbox| {
            let bbox = bbox.normalized();
            let labels = BoxLabels::for_box(&bbox, geo, config);
            let placements = compute_placements(&bbox, &labels, bounds, measure, config)?;
            Ok(BoxLayout { bbox, placements })
        })
        .collect()
}

/// Overlay document in image pixel space: per box an outline, then a plate
/// and text per label.
pub fn overlay_svg(
    layouts: &[BoxLayout],
    width: u32,
    height: u32,
    theme: &Theme,
    layout: &LayoutConfig,
    render: &RenderConfig,
) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    let shape_rendering = if render.crisp_edges {
        " shape-rendering=\"crispEdges\""
    } else {
        ""
    };

    for item in layouts {
        push_outline(&mut svg, &item.bbox, theme, shape_rendering);

        for label in &item.placements {
            svg.push_str(&format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" fill-opacity=\"{:.3}\"{shape_rendering}/>",
                label.x,
                label.y,
                label.width,
                label.height,
                escape_xml(&theme.plate_color),
                theme.plate_opacity,
            ));
            if label.text.is_empty() {
                continue;
            }
            let text_x = label.x + layout.plate_inset;
            let baseline = label.y + layout.plate_inset + label.text_ascent;
            svg.push_str(&format!(
                "<text x=\"{text_x:.2}\" y=\"{baseline:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" xml:space=\"preserve\">{}</text>",
                escape_xml(&theme.font_family),
                theme.font_size,
                escape_xml(&theme.text_color),
                escape_xml(&label.text)
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

/// Stroke drawn inside the box. A box too thin to hold two strokes is
/// filled with the outline color instead, at least 1 px on each axis.
fn push_outline(svg: &mut String, bbox: &BoundingBox, theme: &Theme, shape_rendering: &str) {
    let stroke = theme.outline_width.max(0.0);
    let color = escape_xml(&theme.outline_color);
    let inner_w = bbox.width() - stroke;
    let inner_h = bbox.height() - stroke;
    if inner_w <= 0.0 || inner_h <= 0.0 {
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{color}\"{shape_rendering}/>",
            bbox.x1,
            bbox.y1,
            bbox.width().max(1.0),
            bbox.height().max(1.0),
        ));
        return;
    }
    let half = stroke / 2.0;
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"{:.2}\"{shape_rendering}/>",
        bbox.x1 + half,
        bbox.y1 + half,
        inner_w,
        inner_h,
        stroke,
    ));
}

/// Composite `svg` over the raster in place. The SVG must share the
/// raster's pixel dimensions.
fn rasterize_overlay(svg: &str, image: &mut RgbImage, options: &usvg::Options) -> Result<()> {
    let tree = usvg::Tree::from_str(svg, options)
        .map_err(|err| AnnotateError::Render(format!("overlay SVG rejected: {err}")))?;
    let (width, height) = image.dimensions();
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| AnnotateError::Render(format!("cannot paint a {width}x{height} raster")))?;

    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in image.pixels() {
        data.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
    }
    let mut pixmap = Pixmap::from_vec(data, size)
        .ok_or_else(|| AnnotateError::Render("failed to allocate pixmap".to_string()))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, Transform::default(), &mut pixmap_mut);

    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgb([color.red(), color.green(), color.blue()]);
    }
    Ok(())
}

/// Escape markup and drop characters XML 1.0 cannot carry.
fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            ch if ch.is_control() || ch == '\u{FFFE}' || ch == '\u{FFFF}' => {}
            ch => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_metrics::ApproxMetrics;

    fn renderer() -> Renderer {
        let mut config = Config::default();
        config.render.system_fonts = false;
        Renderer::new(&config, None)
    }

    fn gray(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
    }

    #[test]
    fn zero_boxes_leave_pixels_untouched() {
        let mut image = gray(40, 30);
        let before = image.clone();
        let layouts = renderer()
            .render(&mut image, &[], None, &ApproxMetrics::new(12.0))
            .expect("render");
        assert!(layouts.is_empty());
        assert_eq!(image, before);
    }

    #[test]
    fn outline_is_drawn_inside_the_box() {
        let mut image = gray(100, 100);
        let boxes = vec![BoundingBox::new(20.0, 40.0, 80.0, 90.0, "")];
        renderer()
            .render(&mut image, &boxes, None, &ApproxMetrics::new(12.0))
            .expect("render");
        assert_eq!(*image.get_pixel(20, 60), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(21, 60), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(79, 60), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(50, 40), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(50, 65), Rgb([128, 128, 128]));
        assert_eq!(*image.get_pixel(5, 5), Rgb([128, 128, 128]));
        assert_eq!(image.dimensions(), (100, 100));
    }

    #[test]
    fn thin_and_degenerate_boxes_still_get_an_outline() {
        for x2 in [50.0, 51.0, 52.0] {
            let mut image = gray(100, 100);
            let boxes = vec![BoundingBox::new(50.0, 40.0, x2, 90.0, "")];
            renderer()
                .render(&mut image, &boxes, None, &ApproxMetrics::new(12.0))
                .expect("render");
            assert_eq!(
                *image.get_pixel(50, 60),
                Rgb([255, 0, 0]),
                "box 50..{x2} lost its outline"
            );
        }

        let mut image = gray(100, 100);
        let flat = vec![BoundingBox::new(20.0, 70.0, 80.0, 70.0, "")];
        renderer()
            .render(&mut image, &flat, None, &ApproxMetrics::new(12.0))
            .expect("render");
        assert_eq!(*image.get_pixel(50, 70), Rgb([255, 0, 0]));
    }

    #[test]
    fn escape_drops_characters_xml_rejects() {
        assert_eq!(escape_xml("fox\u{1}\u{b} & owl"), "fox &amp; owl");
        assert_eq!(escape_xml("a\tb"), "a\tb");
    }

    #[test]
    fn measured_face_replaces_system_font_scan() {
        let mut config = Config::default();
        config.render.system_fonts = true;
        let renderer = Renderer::new(&config, Some(&[0, 1, 2, 3]));
        assert_eq!(renderer.font_count(), 0);
    }

    #[test]
    fn plate_darkens_background() {
        let mut image = gray(100, 100);
        let boxes = vec![BoundingBox::new(20.0, 60.0, 80.0, 90.0, "")];
        let layouts = renderer()
            .render(&mut image, &boxes, None, &ApproxMetrics::new(12.0))
            .expect("render");
        let name = &layouts[0].placements[0];
        let px = image.get_pixel((name.x + 1.0) as u32, (name.y + 2.0) as u32);
        assert!(px[0] < 100 && px[0] > 30, "plate pixel {px:?} should be half-dark");
    }

    #[test]
    fn overlay_escapes_label_text() {
        let layouts = layout_boxes(
            &[BoundingBox::new(10.0, 50.0, 90.0, 90.0, "<Canis & co>")],
            None,
            ImageBounds::new(100, 100),
            &ApproxMetrics::new(12.0),
            &LayoutConfig::default(),
        )
        .expect("layout");
        let svg = overlay_svg(
            &layouts,
            100,
            100,
            &Theme::field_default(),
            &LayoutConfig::default(),
            &RenderConfig::default(),
        );
        assert!(svg.contains("&lt;Canis &amp; co&gt;"));
        assert!(svg.contains("stroke=\"#FF0000\""));
        assert!(svg.contains("fill-opacity=\"0.500\""));
    }

    #[test]
    fn layout_boxes_keeps_input_order() {
        let boxes = vec![
            BoundingBox::new(60.0, 60.0, 90.0, 90.0, "second"),
            BoundingBox::new(10.0, 10.0, 40.0, 40.0, "first"),
            BoundingBox::new(60.0, 60.0, 90.0, 90.0, "second"),
        ];
        let layouts = layout_boxes(
            &boxes,
            None,
            ImageBounds::new(100, 100),
            &ApproxMetrics::new(12.0),
            &LayoutConfig::default(),
        )
        .expect("layout");
        let names: Vec<_> = layouts.iter().map(|l| l.bbox.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first", "second"]);
    }
}
