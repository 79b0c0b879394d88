//! The layer data model: typed layer variants, the project aggregate, and
//! the template silhouette all compositing is masked against.

mod layer;
mod layer_id;
mod project;
mod raster;
mod source;
mod template;

pub use layer::{
    BrushLayer, CircleLayer, FillLayer, ImageLayer, Layer, LayerData, LayerKind, LineEnd,
    LineLayer, RectLayer, StarLayer, Stroke, TextLayer,
};
pub use layer_id::LayerId;
pub use project::Project;
pub use raster::Raster;
pub use source::ImageSource;
pub use template::{DirTemplateSource, Template, TemplateSource, TEMPLATE_SIZE};
