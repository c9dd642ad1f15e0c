#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod service;
pub mod store;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, RenderConfig, load_config};
pub use error::{AnnotateError, Result};
pub use ir::{AnnotationRequest, AnnotationResponse, BoundingBox, GeoPoint};
pub use layout::{BoxLabels, ImageBounds, LabelKind, LabelPlacement, compute_placements};
pub use render::Renderer;
pub use service::{AnnotationOutcome, Annotator};
pub use store::{AnnotationRecord, JsonLinesStore, MemoryStore, NewRecord, RecordWriter};
pub use text_metrics::{ApproxMetrics, FontMetrics, TextExtent, TextMeasure};
pub use theme::Theme;
