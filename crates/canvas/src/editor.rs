use glam::Vec2;
use layer::{
    BrushLayer, FillLayer, ImageLayer, ImageSource, Layer, LayerData, LayerId, LayerKind, LineEnd,
    Project, Template,
};
use std::collections::HashSet;
use stencil_core::Color;

/// Current tool mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Select,
    Brush,
    Fill,
}

/// Gesture-lifetime state for the active manipulation.
///
/// A gesture owns exclusive write access to its target layer until the
/// matching `end_*` call; the snapshot fields exist only for the gesture's
/// lifetime and are dropped with it.
#[derive(Clone, Copy, Debug)]
pub enum Gesture {
    /// Dragging a layer as a rigid body.
    Drag { layer_id: LayerId },
    /// Rotating/resizing via a bounding-box handle.
    Transform {
        layer_id: LayerId,
        snapshot: TransformSnapshot,
    },
    /// Dragging one endpoint handle of a line layer.
    LineHandle { layer_id: LayerId, end: LineEnd },
    /// Laying down a freehand brush stroke.
    BrushStroke { layer_id: LayerId },
}

impl Gesture {
    pub fn layer_id(&self) -> LayerId {
        match self {
            Self::Drag { layer_id }
            | Self::Transform { layer_id, .. }
            | Self::LineHandle { layer_id, .. }
            | Self::BrushStroke { layer_id } => *layer_id,
        }
    }
}

/// Pre-transform snapshot taken at gesture start, used to convert a scale
/// gesture into absolute dimensions for rectangle layers.
#[derive(Clone, Copy, Debug)]
pub struct TransformSnapshot {
    pub scale: Vec2,
    /// Width/height at gesture start; only present for rectangle layers.
    pub size: Option<Vec2>,
}

/// The single owned mutable aggregate for an editing session.
///
/// All mutation funnels through named operations so the model invariants
/// (unique ids, sequence-implied z-order, gesture exclusivity) are enforced
/// in one place. `revision` increments on every mutation and lets
/// asynchronous completions detect that the project has moved on beneath
/// them.
pub struct Editor {
    pub project: Project,
    pub template: Template,
    pub selection: HashSet<LayerId>,
    pub tool: Tool,
    gesture: Option<Gesture>,
    /// Selection transform handles are visible.
    pub show_handles: bool,
    /// Live brush-cursor indicator is visible.
    pub show_brush_cursor: bool,
    revision: u64,
}

impl Editor {
    pub fn new(project: Project, template: Template) -> Self {
        Self {
            project,
            template,
            selection: HashSet::new(),
            tool: Tool::Select,
            gesture: None,
            show_handles: true,
            show_brush_cursor: false,
            revision: 0,
        }
    }

    /// Monotonic mutation counter, used to guard stale asynchronous
    /// results.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    // ---- generic layer operations ----------------------------------------

    /// Add a layer at the head of the sequence and select it.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = self.project.add_layer(layer);
        self.selection.clear();
        self.selection.insert(id);
        self.bump();
        id
    }

    /// Add-layer contract for asset producers (file picker, generated
    /// rasters): a raster-backed layer of the given kind with the standard
    /// transform/visibility defaults. Returns `None` for kinds that do not
    /// carry a raster source.
    pub fn add_asset_layer(
        &mut self,
        kind: LayerKind,
        name: impl Into<String>,
        source: ImageSource,
    ) -> Option<LayerId> {
        let data = match kind {
            LayerKind::Image => LayerData::Image(ImageLayer { source }),
            LayerKind::Texture => LayerData::Texture(ImageLayer { source }),
            LayerKind::Fill => LayerData::Fill(FillLayer { raster: source }),
            _ => return None,
        };
        Some(self.add_layer(Layer::new(name, data)))
    }

    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let removed = self.project.remove_layer(id).is_some();
        if removed {
            self.selection.remove(&id);
            if self.gesture.as_ref().map(|g| g.layer_id()) == Some(id) {
                self.gesture = None;
            }
            self.bump();
        }
        removed
    }

    pub fn delete_selected(&mut self) {
        let ids: Vec<_> = self.selection.iter().copied().collect();
        for id in ids {
            self.delete_layer(id);
        }
    }

    /// Delete the topmost unlocked layer under `point`. Locked layers are
    /// excluded from delete-by-click but keep rendering and exporting.
    pub fn delete_by_click(&mut self, point: Vec2) -> Option<LayerId> {
        let id = self
            .hit_candidates(point)
            .find(|id| !self.project.layer(*id).map(|l| l.locked).unwrap_or(true))?;
        self.delete_layer(id);
        Some(id)
    }

    pub fn select(&mut self, id: LayerId, additive: bool) {
        if !additive {
            self.selection.clear();
        }
        self.selection.insert(id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.show_brush_cursor = tool == Tool::Brush;
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        let Some(layer) = self.project.layer_mut(id) else {
            return false;
        };
        layer.opacity = opacity.clamp(0.0, 1.0);
        self.bump();
        true
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> bool {
        let Some(layer) = self.project.layer_mut(id) else {
            return false;
        };
        layer.visible = visible;
        self.bump();
        true
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> bool {
        let Some(layer) = self.project.layer_mut(id) else {
            return false;
        };
        layer.locked = locked;
        self.bump();
        true
    }

    pub fn move_layer(&mut self, id: LayerId, index: usize) -> bool {
        let moved = self.project.move_layer(id, index);
        if moved {
            self.bump();
        }
        moved
    }

    // ---- hit testing ------------------------------------------------------

    /// Find the topmost layer at a canvas point.
    ///
    /// Invisible layers never hit. Zero-opacity layers still hit (they
    /// remain selectable). Fill-kind layers become click-through while the
    /// fill tool is active so painting can occur beneath them. Locked
    /// layers hit for selection; the input operations below refuse them.
    pub fn layer_at_point(&self, point: Vec2) -> Option<LayerId> {
        self.hit_candidates(point).next()
    }

    fn hit_candidates(&self, point: Vec2) -> impl Iterator<Item = LayerId> + '_ {
        // Stored order is most-recent-first, which is already topmost-first.
        self.project
            .layers
            .iter()
            .filter(move |layer| {
                layer.visible
                    && !(self.tool == Tool::Fill && layer.kind() == LayerKind::Fill)
                    && self.hit_test(layer, point)
            })
            .map(|layer| layer.id)
    }

    fn hit_test(&self, layer: &Layer, point: Vec2) -> bool {
        let canvas = self.template.size as f32;
        // Full-canvas kinds cover the whole extent regardless of transform.
        let covers_canvas =
            point.x >= 0.0 && point.y >= 0.0 && point.x < canvas && point.y < canvas;
        match &layer.data {
            LayerData::Fill(_) => return covers_canvas,
            LayerData::Texture(image) => {
                return covers_canvas && image.source.raster().is_some();
            }
            _ => {}
        }

        let Some((min, max)) = layer.local_bounds(canvas) else {
            return false;
        };
        let Some(local) = to_local(layer, point) else {
            return false;
        };
        local.x >= min.x && local.x <= max.x && local.y >= min.y && local.y <= max.y
    }

    // ---- drag gesture ------------------------------------------------------

    /// Begin dragging a layer as a rigid body. Refused for locked layers
    /// and for brush layers, which are not rigid-body transformable.
    pub fn begin_drag(&mut self, id: LayerId) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        let Some(layer) = self.project.layer(id) else {
            return false;
        };
        if layer.locked || layer.kind() == LayerKind::Brush {
            return false;
        }
        self.gesture = Some(Gesture::Drag { layer_id: id });
        true
    }

    /// Track the live drag position. The persisted value is whatever the
    /// position is when `end_drag` fires.
    pub fn update_drag(&mut self, position: Vec2) {
        let Some(Gesture::Drag { layer_id }) = self.gesture else {
            return;
        };
        if let Some(layer) = self.project.layer_mut(layer_id) {
            layer.position = position;
            self.bump();
        }
    }

    /// Persist the final absolute position verbatim; no scale or rotation
    /// side effects.
    pub fn end_drag(&mut self, position: Vec2) {
        let Some(Gesture::Drag { layer_id }) = self.gesture.take() else {
            return;
        };
        if let Some(layer) = self.project.layer_mut(layer_id) {
            layer.position = position;
            self.bump();
        }
    }

    // ---- transform gesture -------------------------------------------------

    /// Begin a rotate/resize gesture, snapshotting the state needed to
    /// convert the gesture's final scale into absolute dimensions.
    pub fn begin_transform(&mut self, id: LayerId) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        let Some(layer) = self.project.layer(id) else {
            return false;
        };
        if layer.locked || layer.kind() == LayerKind::Brush {
            return false;
        }
        let size = match &layer.data {
            LayerData::Rect(rect) => Some(Vec2::new(rect.width, rect.height)),
            _ => None,
        };
        self.gesture = Some(Gesture::Transform {
            layer_id: id,
            snapshot: TransformSnapshot {
                scale: layer.scale,
                size,
            },
        });
        true
    }

    /// Complete a rotate/resize gesture.
    ///
    /// Rectangle layers are resized physically: the new absolute
    /// dimensions become `original_dimension * (new_scale / original_scale)`
    /// (absolute value guards flipped gestures) and the scale resets to
    /// (1, 1). Every other kind persists the reported scale verbatim and
    /// leaves its intrinsic size untouched. Rotation persists as reported
    /// in both cases.
    pub fn end_transform(&mut self, new_scale: Vec2, rotation: f32) {
        let Some(Gesture::Transform { layer_id, snapshot }) = self.gesture.take() else {
            return;
        };
        let Some(layer) = self.project.layer_mut(layer_id) else {
            return;
        };
        layer.rotation = rotation;

        match (&mut layer.data, snapshot.size) {
            (LayerData::Rect(rect), Some(size))
                if snapshot.scale.x != 0.0 && snapshot.scale.y != 0.0 =>
            {
                rect.width = (size.x * new_scale.x / snapshot.scale.x).abs();
                rect.height = (size.y * new_scale.y / snapshot.scale.y).abs();
                layer.scale = Vec2::ONE;
            }
            _ => {
                layer.scale = new_scale;
            }
        }
        self.bump();
    }

    // ---- line endpoint handles ---------------------------------------------

    /// Absolute position of a line endpoint handle: the layer position
    /// offset by the endpoint's point pair. Because drags mutate the
    /// layer's position live, handles computed from this stay attached to
    /// the line throughout a whole-line drag, not just at its completion.
    pub fn line_handle_position(&self, id: LayerId, end: LineEnd) -> Option<Vec2> {
        let layer = self.project.layer(id)?;
        let LayerData::Line(line) = &layer.data else {
            return None;
        };
        Some(layer.position + line.endpoint(end))
    }

    /// True while an endpoint handle drag is active. The handle-sync
    /// reaction that mirrors persisted state back onto handles must skip
    /// while this holds, to avoid feedback jitter between the live gesture
    /// and the store-driven position.
    pub fn handle_sync_suppressed(&self) -> bool {
        matches!(self.gesture, Some(Gesture::LineHandle { .. }))
    }

    pub fn begin_line_handle(&mut self, id: LayerId, end: LineEnd) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        let Some(layer) = self.project.layer(id) else {
            return false;
        };
        if layer.locked || !matches!(layer.data, LayerData::Line(_)) {
            return false;
        }
        self.gesture = Some(Gesture::LineHandle { layer_id: id, end });
        true
    }

    /// Convert the handle's live absolute position back to a relative
    /// point pair and persist only that pair.
    pub fn update_line_handle(&mut self, absolute: Vec2) {
        let Some(Gesture::LineHandle { layer_id, end }) = self.gesture else {
            return;
        };
        let Some(layer) = self.project.layer_mut(layer_id) else {
            return;
        };
        let relative = absolute - layer.position;
        if let LayerData::Line(line) = &mut layer.data {
            line.set_endpoint(end, relative);
            self.bump();
        }
    }

    pub fn end_line_handle(&mut self) {
        if matches!(self.gesture, Some(Gesture::LineHandle { .. })) {
            self.gesture = None;
            self.bump();
        }
    }

    // ---- brush strokes -----------------------------------------------------

    /// Start a freehand stroke: creates a brush layer anchored at the first
    /// point and claims the gesture.
    pub fn begin_brush_stroke(&mut self, at: Vec2, color: Color, width: f32) -> Option<LayerId> {
        if self.gesture.is_some() {
            return None;
        }
        let brush = Layer::new(
            "Brush stroke",
            LayerData::Brush(BrushLayer {
                points: vec![Vec2::ZERO],
                stroke_width: width,
                color,
            }),
        )
        .with_position(at);
        let id = self.add_layer(brush);
        self.gesture = Some(Gesture::BrushStroke { layer_id: id });
        Some(id)
    }

    pub fn extend_brush_stroke(&mut self, at: Vec2) {
        let Some(Gesture::BrushStroke { layer_id }) = self.gesture else {
            return;
        };
        let Some(layer) = self.project.layer_mut(layer_id) else {
            return;
        };
        let relative = at - layer.position;
        if let LayerData::Brush(brush) = &mut layer.data {
            brush.points.push(relative);
            self.bump();
        }
    }

    pub fn end_brush_stroke(&mut self) {
        if matches!(self.gesture, Some(Gesture::BrushStroke { .. })) {
            self.gesture = None;
            self.bump();
        }
    }

    // ---- overlays ----------------------------------------------------------

    /// World-space bounding box of the current selection, for drawing
    /// transform handles.
    pub fn selection_bounds(&self) -> Option<(Vec2, Vec2)> {
        let canvas = self.template.size as f32;
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        let mut any = false;
        for layer in &self.project.layers {
            if !self.selection.contains(&layer.id) {
                continue;
            }
            let Some((local_min, local_max)) = layer.local_bounds(canvas) else {
                continue;
            };
            for corner in [
                local_min,
                Vec2::new(local_max.x, local_min.y),
                local_max,
                Vec2::new(local_min.x, local_max.y),
            ] {
                let world = to_world(layer, corner);
                min = min.min(world);
                max = max.max(world);
            }
            any = true;
        }
        any.then_some((min, max))
    }
}

/// Map a world-space point into a layer's local space by undoing the
/// position/rotation/scale transform. Returns `None` when a scale
/// component is zero (the layer is degenerate and unhittable).
fn to_local(layer: &Layer, point: Vec2) -> Option<Vec2> {
    if layer.scale.x == 0.0 || layer.scale.y == 0.0 {
        return None;
    }
    let translated = point - layer.position;
    let radians = -layer.rotation.to_radians();
    let (sin, cos) = radians.sin_cos();
    let rotated = Vec2::new(
        translated.x * cos - translated.y * sin,
        translated.x * sin + translated.y * cos,
    );
    Some(rotated / layer.scale)
}

fn to_world(layer: &Layer, local: Vec2) -> Vec2 {
    let scaled = local * layer.scale;
    let radians = layer.rotation.to_radians();
    let (sin, cos) = radians.sin_cos();
    let rotated = Vec2::new(
        scaled.x * cos - scaled.y * sin,
        scaled.x * sin + scaled.y * cos,
    );
    rotated + layer.position
}
