use crate::codec::{decode_data_uri, encode_png_data_uri};
use crate::config::Config;
use crate::error::{AnnotateError, Result};
use crate::ir::{AnnotationRequest, AnnotationResponse};
use crate::layout::BoxLayout;
use crate::render::Renderer;
use crate::store::{NewRecord, RecordWriter};
use crate::text_metrics::{ApproxMetrics, FontMetrics, TextMeasure};
use image::RgbImage;

/// Result of one request: the wire response plus what was drawn.
#[derive(Debug)]
pub struct AnnotationOutcome {
    pub response: AnnotationResponse,
    pub layouts: Vec<BoxLayout>,
    pub image: RgbImage,
}

/// Decode, render, persist, encode. One instance serves many requests; it
/// owns the measurer, the rasterizer fonts and the optional record writer.
pub struct Annotator {
    renderer: Renderer,
    measure: Box<dyn TextMeasure>,
    writer: Option<Box<dyn RecordWriter>>,
}

impl Annotator {
    pub fn new(config: &Config) -> Result<Self> {
        if config.layout.fast_text_metrics {
            let measure = ApproxMetrics::new(config.theme.font_size);
            return Ok(Self::with_parts(Renderer::new(config, None), Box::new(measure)));
        }
        let metrics = FontMetrics::from_system(&config.theme.font_family, config.theme.font_size)?;
        let renderer = Renderer::new(config, Some(metrics.font_data()));
        Ok(Self::with_parts(renderer, Box::new(metrics)))
    }

    pub fn with_parts(renderer: Renderer, measure: Box<dyn TextMeasure>) -> Self {
        Self {
            renderer,
            measure,
            writer: None,
        }
    }

    pub fn with_writer(mut self, writer: Box<dyn RecordWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Annotate one request. Decode, measurement and render failures abort
    /// the request. A failed record insert does not: the annotated image is
    /// still returned and `response.message` says what was not saved.
    pub fn annotate(
        &mut self,
        request: &AnnotationRequest,
        image_reference: &str,
    ) -> Result<AnnotationOutcome> {
        validate(request)?;
        let mut image = decode_data_uri(&request.image)?;
        let geo = request.geo();
        let layouts = self
            .renderer
            .render(&mut image, &request.boxes, geo, self.measure.as_ref())?;
        let annotated_image = encode_png_data_uri(&image)?;
        log::info!(
            "annotated {} ({}x{}) with {} boxes",
            image_reference,
            image.width(),
            image.height(),
            layouts.len()
        );

        let mut response = AnnotationResponse {
            annotated_image,
            message: None,
            records: Vec::new(),
        };

        if let Some(writer) = self.writer.as_mut() {
            let mut failures = Vec::new();
            for layout in &layouts {
                let record = NewRecord::new(image_reference, layout.bbox.clone(), geo);
                match writer.insert(record) {
                    Ok(stored) => response.records.push(stored.id),
                    Err(err) => {
                        log::warn!("record for box '{}' not saved: {}", layout.bbox.name, err);
                        failures.push(err);
                    }
                }
            }
            response.message = Some(match failures.first() {
                None => format!("Saved {} annotation records", response.records.len()),
                Some(first) => format!(
                    "Image annotated, but {} of {} records were not saved: {}",
                    failures.len(),
                    layouts.len(),
                    first
                ),
            });
        }

        Ok(AnnotationOutcome {
            response,
            layouts,
            image,
        })
    }
}

fn validate(request: &AnnotationRequest) -> Result<()> {
    if let Some((idx, bbox)) = request
        .boxes
        .iter()
        .enumerate()
        .find(|(_, bbox)| !bbox.is_finite())
    {
        return Err(AnnotateError::InvalidRequest(format!(
            "box {idx} ('{}') has non-finite coordinates",
            bbox.name
        )));
    }
    for (field, value) in [("latitude", request.latitude), ("longitude", request.longitude)] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(AnnotateError::InvalidRequest(format!("{field} is not finite")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BoundingBox;
    use crate::store::{AnnotationRecord, MemoryStore};
    use image::Rgb;

    struct FailingStore;

    impl RecordWriter for FailingStore {
        fn insert(&mut self, _record: NewRecord) -> Result<AnnotationRecord> {
            Err(AnnotateError::Persistence("disk full".to_string()))
        }
    }

    fn annotator() -> Annotator {
        let mut config = Config::default();
        config.layout.fast_text_metrics = true;
        config.render.system_fonts = false;
        Annotator::new(&config).expect("annotator")
    }

    fn request(boxes: Vec<BoundingBox>) -> AnnotationRequest {
        let image = RgbImage::from_pixel(200, 200, Rgb([10, 120, 40]));
        AnnotationRequest {
            image: encode_png_data_uri(&image).expect("encode"),
            boxes,
            latitude: Some(4.6097),
            longitude: Some(-74.0817),
        }
    }

    #[test]
    fn annotates_and_saves_one_record_per_box() {
        let mut annotator = annotator().with_writer(Box::new(MemoryStore::new()));
        let outcome = annotator
            .annotate(
                &request(vec![
                    BoundingBox::new(50.0, 2.0, 150.0, 80.0, "fox").with_date("2024-01-01"),
                    BoundingBox::new(10.0, 100.0, 90.0, 190.0, "owl"),
                ]),
                "field.png",
            )
            .expect("annotate");
        assert_eq!(outcome.response.records, vec![1, 2]);
        assert_eq!(
            outcome.response.message.as_deref(),
            Some("Saved 2 annotation records")
        );
        assert_eq!(outcome.layouts.len(), 2);
        let decoded = decode_data_uri(&outcome.response.annotated_image).expect("decode");
        assert_eq!(decoded.dimensions(), (200, 200));
    }

    #[test]
    fn persistence_failure_is_partial_success() {
        let mut annotator = annotator().with_writer(Box::new(FailingStore));
        let outcome = annotator
            .annotate(&request(vec![BoundingBox::new(5.0, 5.0, 50.0, 50.0, "elk")]), "x")
            .expect("image still returned");
        assert!(outcome.response.records.is_empty());
        let message = outcome.response.message.expect("message");
        assert!(message.contains("1 of 1"), "{message}");
        assert!(message.contains("disk full"), "{message}");
        assert!(outcome.response.annotated_image.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn no_writer_means_no_message() {
        let outcome = annotator()
            .annotate(&request(vec![BoundingBox::new(5.0, 5.0, 50.0, 50.0, "elk")]), "x")
            .expect("annotate");
        assert!(outcome.response.message.is_none());
        assert!(outcome.response.records.is_empty());
    }

    #[test]
    fn decode_failure_aborts_before_persisting() {
        let mut annotator = annotator().with_writer(Box::new(MemoryStore::new()));
        let mut bad = request(vec![BoundingBox::new(5.0, 5.0, 50.0, 50.0, "elk")]);
        bad.image = "not-a-data-uri".to_string();
        let err = annotator.annotate(&bad, "x").unwrap_err();
        assert!(matches!(err, AnnotateError::Decode(_)));
    }

    #[test]
    fn control_characters_in_labels_do_not_fail_the_request() {
        let mut annotator = annotator().with_writer(Box::new(MemoryStore::new()));
        let outcome = annotator
            .annotate(
                &request(vec![
                    BoundingBox::new(20.0, 40.0, 120.0, 120.0, "fox\u{1}").with_date("2024\u{b}-01-01"),
                ]),
                "x",
            )
            .expect("annotate");
        assert_eq!(outcome.response.records, vec![1]);
        let name = &outcome.layouts[0].placements[0];
        assert_eq!(name.text, "fox");
    }

    #[test]
    fn non_finite_box_is_rejected() {
        let err = annotator()
            .annotate(
                &request(vec![BoundingBox::new(f32::NAN, 5.0, 50.0, 50.0, "elk")]),
                "x",
            )
            .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidRequest(_)));
    }
}
