use crate::{ArchiveError, FORMAT_VERSION};
use glam::Vec2;
use layer::{
    BrushLayer, CircleLayer, FillLayer, ImageLayer, ImageSource, Layer, LayerData, LayerId,
    LineLayer, Project, Raster, RectLayer, StarLayer, Stroke, TextLayer,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stencil_core::Color;

/// The `manifest.json` document at the root of a project archive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub name: String,
    pub created_at: String,
    pub modified_at: String,
    pub template_id: String,
    pub base_color: Color,
    pub layers: Vec<StoredLayer>,
}

/// Serializable mirror of a [`Layer`]. The kind-specific payload is
/// flattened into the layer object under a `kind` tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredLayer {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub opacity: f32,
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    #[serde(flatten)]
    pub data: StoredData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoredData {
    Text {
        content: String,
        font_family: String,
        font_size: f32,
        fill: Color,
    },
    Image {
        source: StoredSource,
    },
    Texture {
        source: StoredSource,
    },
    Brush {
        points: Vec<Vec2>,
        stroke_width: f32,
        color: Color,
    },
    Line {
        points: [f32; 4],
        stroke: Color,
        stroke_width: f32,
        arrow_start: bool,
        arrow_end: bool,
    },
    Star {
        points: u32,
        inner_radius: f32,
        outer_radius: f32,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Rect {
        width: f32,
        height: f32,
        corner_radius: f32,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Circle {
        radius: f32,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Fill {
        raster: StoredSource,
    },
}

/// A raster field as stored in the manifest: either an external URL passed
/// through verbatim, or a relative path into the archive's `images/`
/// directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoredSource {
    External { url: String },
    Archive { path: String },
}

impl Manifest {
    /// Build the manifest for a project, collecting every embedded raster
    /// that must be written into the archive alongside it.
    pub fn from_project(project: &Project) -> (Self, Vec<(String, Raster)>) {
        let mut images = Vec::new();
        let layers = project
            .layers
            .iter()
            .map(|layer| StoredLayer::from_layer(layer, &mut images))
            .collect();
        (
            Self {
                version: FORMAT_VERSION,
                name: project.name.clone(),
                created_at: project.created_at.clone(),
                modified_at: chrono::Utc::now().to_rfc3339(),
                template_id: project.template_id.clone(),
                base_color: project.base_color,
                layers,
            },
            images,
        )
    }

    /// Restore the in-memory project, resolving archive paths against the
    /// archive's file map.
    pub fn into_project(
        self,
        files: &HashMap<String, Vec<u8>>,
    ) -> Result<Project, ArchiveError> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for stored in self.layers {
            layers.push(stored.into_layer(files)?);
        }
        Ok(Project {
            name: self.name,
            created_at: self.created_at,
            base_color: self.base_color,
            template_id: self.template_id,
            layers,
        })
    }
}

impl StoredLayer {
    fn from_layer(layer: &Layer, images: &mut Vec<(String, Raster)>) -> Self {
        let id = layer.id.to_uuid_string();
        let data = match &layer.data {
            LayerData::Text(text) => StoredData::Text {
                content: text.content.clone(),
                font_family: text.font_family.clone(),
                font_size: text.font_size,
                fill: text.fill,
            },
            LayerData::Image(image) => StoredData::Image {
                source: store_source(&image.source, image_path(&id), images),
            },
            LayerData::Texture(image) => StoredData::Texture {
                source: store_source(&image.source, image_path(&id), images),
            },
            LayerData::Brush(brush) => StoredData::Brush {
                points: brush.points.clone(),
                stroke_width: brush.stroke_width,
                color: brush.color,
            },
            LayerData::Line(line) => StoredData::Line {
                points: line.points,
                stroke: line.stroke,
                stroke_width: line.stroke_width,
                arrow_start: line.arrow_start,
                arrow_end: line.arrow_end,
            },
            LayerData::Star(star) => StoredData::Star {
                points: star.points,
                inner_radius: star.inner_radius,
                outer_radius: star.outer_radius,
                fill: star.fill,
                stroke: star.stroke,
            },
            LayerData::Rect(rect) => StoredData::Rect {
                width: rect.width,
                height: rect.height,
                corner_radius: rect.corner_radius,
                fill: rect.fill,
                stroke: rect.stroke,
            },
            LayerData::Circle(circle) => StoredData::Circle {
                radius: circle.radius,
                fill: circle.fill,
                stroke: circle.stroke,
            },
            LayerData::Fill(fill) => StoredData::Fill {
                raster: store_source(&fill.raster, fill_path(&id), images),
            },
        };

        Self {
            id,
            name: layer.name.clone(),
            visible: layer.visible,
            locked: layer.locked,
            opacity: layer.opacity,
            position: layer.position,
            rotation: layer.rotation,
            scale: layer.scale,
            data,
        }
    }

    fn into_layer(self, files: &HashMap<String, Vec<u8>>) -> Result<Layer, ArchiveError> {
        let id = LayerId::parse_str(&self.id)
            .ok_or_else(|| ArchiveError::InvalidLayer(format!("bad layer id {:?}", self.id)))?;
        let data = match self.data {
            StoredData::Text {
                content,
                font_family,
                font_size,
                fill,
            } => LayerData::Text(TextLayer {
                content,
                font_family,
                font_size,
                fill,
            }),
            StoredData::Image { source } => LayerData::Image(ImageLayer {
                source: restore_source(source, files)?,
            }),
            StoredData::Texture { source } => LayerData::Texture(ImageLayer {
                source: restore_source(source, files)?,
            }),
            StoredData::Brush {
                points,
                stroke_width,
                color,
            } => LayerData::Brush(BrushLayer {
                points,
                stroke_width,
                color,
            }),
            StoredData::Line {
                points,
                stroke,
                stroke_width,
                arrow_start,
                arrow_end,
            } => LayerData::Line(LineLayer {
                points,
                stroke,
                stroke_width,
                arrow_start,
                arrow_end,
            }),
            StoredData::Star {
                points,
                inner_radius,
                outer_radius,
                fill,
                stroke,
            } => LayerData::Star(StarLayer {
                points,
                inner_radius,
                outer_radius,
                fill,
                stroke,
            }),
            StoredData::Rect {
                width,
                height,
                corner_radius,
                fill,
                stroke,
            } => LayerData::Rect(RectLayer {
                width,
                height,
                corner_radius,
                fill,
                stroke,
            }),
            StoredData::Circle {
                radius,
                fill,
                stroke,
            } => LayerData::Circle(CircleLayer {
                radius,
                fill,
                stroke,
            }),
            StoredData::Fill { raster } => LayerData::Fill(FillLayer {
                raster: restore_source(raster, files)?,
            }),
        };

        Ok(Layer {
            id,
            name: self.name,
            visible: self.visible,
            locked: self.locked,
            opacity: self.opacity,
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            data,
        })
    }
}

fn image_path(id: &str) -> String {
    format!("images/image_{id}.png")
}

fn fill_path(id: &str) -> String {
    format!("images/fill_{id}.png")
}

/// Externalize an embedded raster under `path`; external URLs pass
/// through untouched.
fn store_source(
    source: &ImageSource,
    path: String,
    images: &mut Vec<(String, Raster)>,
) -> StoredSource {
    match source {
        ImageSource::External { url } => StoredSource::External { url: url.clone() },
        ImageSource::Embedded(raster) => {
            images.push((path.clone(), raster.clone()));
            StoredSource::Archive { path }
        }
    }
}

fn restore_source(
    stored: StoredSource,
    files: &HashMap<String, Vec<u8>>,
) -> Result<ImageSource, ArchiveError> {
    match stored {
        StoredSource::External { url } => Ok(ImageSource::External { url }),
        StoredSource::Archive { path } => {
            let bytes = files
                .get(&path)
                .ok_or_else(|| ArchiveError::MissingImage(path.clone()))?;
            let raster = Raster::decode(bytes)
                .map_err(|err| ArchiveError::InvalidLayer(format!("{path}: {err}")))?;
            Ok(ImageSource::Embedded(raster))
        }
    }
}
