#![forbid(unsafe_code)]

pub mod composite;
pub mod core;
pub mod error;
pub mod export;
pub mod hittest;
pub mod layer;
pub mod project;
pub mod segment;
pub mod session;
pub mod template;

pub use composite::{composite_layers, render_export, render_preview, MaskPolarity};
pub use core::{AlphaMask, FitTransform, Placement, Raster, Rgb};
pub use error::{WraplabError, WraplabResult};
pub use export::{ExportSink, SaveOutcome};
pub use hittest::hit_test;
pub use layer::{Layer, LayerId, LayerSource, LayerStack};
pub use project::{LayerSpec, Project};
pub use segment::{segment_regions, Region, RegionBounds, DEFAULT_THRESHOLD};
pub use session::EditorSession;
pub use template::{Pixels, Template};
