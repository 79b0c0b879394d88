use crate::{ImageSource, LayerId};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use stencil_core::Color;
use strum::{Display, EnumString};

/// The kind tag shared by every layer variant.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LayerKind {
    Text,
    Image,
    Texture,
    Brush,
    Line,
    Star,
    Rect,
    Circle,
    Fill,
}

/// Stroke style for shape outlines.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayer {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    pub fill: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayer {
    pub source: ImageSource,
}

/// Which end of a line a handle belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnd {
    Start,
    End,
}

/// A straight segment. `points` holds both endpoints relative to the
/// layer's position: `[start_x, start_y, end_x, end_y]`.
#[derive(Clone, Debug, PartialEq)]
pub struct LineLayer {
    pub points: [f32; 4],
    pub stroke: Color,
    pub stroke_width: f32,
    pub arrow_start: bool,
    pub arrow_end: bool,
}

impl LineLayer {
    pub fn endpoint(&self, end: LineEnd) -> Vec2 {
        match end {
            LineEnd::Start => Vec2::new(self.points[0], self.points[1]),
            LineEnd::End => Vec2::new(self.points[2], self.points[3]),
        }
    }

    /// Overwrite one endpoint's pair, leaving the other pair untouched.
    pub fn set_endpoint(&mut self, end: LineEnd, relative: Vec2) {
        match end {
            LineEnd::Start => {
                self.points[0] = relative.x;
                self.points[1] = relative.y;
            }
            LineEnd::End => {
                self.points[2] = relative.x;
                self.points[3] = relative.y;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StarLayer {
    pub points: u32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub fill: Color,
    pub stroke: Option<Stroke>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RectLayer {
    /// Absolute width, independent of the layer's scale factor.
    pub width: f32,
    /// Absolute height, independent of the layer's scale factor.
    pub height: f32,
    pub corner_radius: f32,
    pub fill: Color,
    pub stroke: Option<Stroke>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CircleLayer {
    pub radius: f32,
    pub fill: Color,
    pub stroke: Option<Stroke>,
}

/// A freehand stroke. Points are relative to the layer's position; brush
/// layers are not draggable or transformable as a rigid body.
#[derive(Clone, Debug, PartialEq)]
pub struct BrushLayer {
    pub points: Vec<Vec2>,
    pub stroke_width: f32,
    pub color: Color,
}

/// A full-canvas flood-fill or procedural raster.
#[derive(Clone, Debug, PartialEq)]
pub struct FillLayer {
    pub raster: ImageSource,
}

/// Kind-specific layer payload.
///
/// A tagged union with an exhaustive dispatch at render and transform time:
/// adding a new kind is a compile-time exhaustiveness gap, not a runtime
/// downcast chain.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerData {
    Text(TextLayer),
    Image(ImageLayer),
    Texture(ImageLayer),
    Brush(BrushLayer),
    Line(LineLayer),
    Star(StarLayer),
    Rect(RectLayer),
    Circle(CircleLayer),
    Fill(FillLayer),
}

impl LayerData {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Text(_) => LayerKind::Text,
            Self::Image(_) => LayerKind::Image,
            Self::Texture(_) => LayerKind::Texture,
            Self::Brush(_) => LayerKind::Brush,
            Self::Line(_) => LayerKind::Line,
            Self::Star(_) => LayerKind::Star,
            Self::Rect(_) => LayerKind::Rect,
            Self::Circle(_) => LayerKind::Circle,
            Self::Fill(_) => LayerKind::Fill,
        }
    }
}

/// A layer on the canvas.
///
/// Every variant shares the same transform/visibility contract; the
/// kind-specific payload lives in [`LayerData`]. Z-order is implied by the
/// position in the project's layer sequence (most-recent-first), which is
/// reversed at composite time so the newest layer renders frontmost.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    /// Layer opacity in [0, 1].
    pub opacity: f32,
    pub position: Vec2,
    /// Rotation in degrees, pivoting at `position`.
    pub rotation: f32,
    pub scale: Vec2,
    pub data: LayerData,
}

impl Layer {
    pub fn new(name: impl Into<String>, data: LayerData) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 1.0,
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            data,
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.data.kind()
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Axis-aligned bounds in the layer's own coordinate space, before the
    /// position/rotation/scale transform is applied. `canvas` is the
    /// template extent, needed by the kinds that span the whole canvas.
    ///
    /// Returns `None` when the layer has no extent to hit (an external
    /// image reference that was never resolved).
    pub fn local_bounds(&self, canvas: f32) -> Option<(Vec2, Vec2)> {
        match &self.data {
            LayerData::Text(text) => {
                let lines: Vec<&str> = text.content.split('\n').collect();
                let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
                // Rough glyph-metric estimate; exact bounds need font data
                // the model layer does not carry.
                let width = longest as f32 * text.font_size * 0.6;
                let height = lines.len().max(1) as f32 * text.font_size * 1.2;
                Some((Vec2::ZERO, Vec2::new(width, height)))
            }
            LayerData::Image(image) => {
                let raster = image.source.raster()?;
                Some((
                    Vec2::ZERO,
                    Vec2::new(raster.width() as f32, raster.height() as f32),
                ))
            }
            // Textures tile the whole canvas as a material swatch; like
            // fills, they span the canvas extent regardless of transform.
            LayerData::Texture(image) => {
                image.source.raster()?;
                Some((-self.position, Vec2::splat(canvas) - self.position))
            }
            LayerData::Brush(brush) => {
                let (min, max) = point_bounds(&brush.points)?;
                let pad = brush.stroke_width * 0.5;
                Some((min - Vec2::splat(pad), max + Vec2::splat(pad)))
            }
            LayerData::Line(line) => {
                let points = [line.endpoint(LineEnd::Start), line.endpoint(LineEnd::End)];
                let (min, max) = point_bounds(&points)?;
                let pad = line.stroke_width * 0.5;
                Some((min - Vec2::splat(pad), max + Vec2::splat(pad)))
            }
            LayerData::Star(star) => {
                let r = star.outer_radius;
                Some((Vec2::splat(-r), Vec2::splat(r)))
            }
            LayerData::Rect(rect) => Some((Vec2::ZERO, Vec2::new(rect.width, rect.height))),
            LayerData::Circle(circle) => {
                let r = circle.radius;
                Some((Vec2::splat(-r), Vec2::splat(r)))
            }
            LayerData::Fill(_) => Some((-self.position, Vec2::splat(canvas) - self.position)),
        }
    }
}

fn point_bounds(points: &[Vec2]) -> Option<(Vec2, Vec2)> {
    let first = *points.first()?;
    let mut min = first;
    let mut max = first;
    for point in &points[1..] {
        min = min.min(*point);
        max = max.max(*point);
    }
    Some((min, max))
}
