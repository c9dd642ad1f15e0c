pub(crate) mod label_placement;
mod text;
pub(crate) mod types;
pub use label_placement::compute_placements;
pub use text::BoxLabels;
pub use types::*;
