//! Export and publish pipeline.
//!
//! Produces a flattened raster of the composited canvas with every
//! interactive-only overlay excluded, and composes that raster with the
//! serialized project archive for the publish collaborator. Capture never
//! leaves a lasting side effect on editor state, a second publish while
//! one is in flight is refused rather than interleaved, and completed
//! captures carry a revision guard so stale results are never applied to a
//! project that has moved on.

use canvas::{Editor, Gesture};
use compositor::{BrushCursor, FontStore, Overlays, RenderOptions};
use interchange::ArchiveError;
use layer::LayerData;

/// Error type for export and publish operations.
#[derive(Debug)]
pub enum ExportError {
    /// An export or publish is already in flight.
    Busy,
    /// The capture was taken against an older project state.
    Stale { captured: u64, current: u64 },
    Render(compositor::RenderError),
    Archive(ArchiveError),
    /// PNG encoding or decoding of a captured surface failed.
    Encode(String),
    /// The publish collaborator reported a failure.
    Publish(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => write!(f, "an export or publish is already in flight"),
            Self::Stale { captured, current } => write!(
                f,
                "capture from revision {captured} is stale (project is at revision {current})"
            ),
            Self::Render(err) => write!(f, "render failed: {err}"),
            Self::Archive(err) => write!(f, "archive failed: {err}"),
            Self::Encode(msg) => write!(f, "PNG processing failed: {msg}"),
            Self::Publish(msg) => write!(f, "publish failed: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            Self::Archive(err) => Some(err),
            _ => None,
        }
    }
}

impl From<compositor::RenderError> for ExportError {
    fn from(err: compositor::RenderError) -> Self {
        Self::Render(err)
    }
}

impl From<ArchiveError> for ExportError {
    fn from(err: ArchiveError) -> Self {
        Self::Archive(err)
    }
}

/// A flattened PNG capture plus the project revision it was taken at.
#[derive(Clone, Debug)]
pub struct Capture {
    png: Vec<u8>,
    revision: u64,
}

impl Capture {
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_current(&self, editor: &Editor) -> bool {
        self.revision == editor.revision()
    }
}

/// Build the overlay frame the on-screen canvas would draw for the
/// editor's current state.
pub fn editor_overlays(editor: &Editor) -> Option<Overlays> {
    let selection_bounds = if editor.show_handles {
        editor.selection_bounds()
    } else {
        None
    };

    let brush_cursor = if editor.show_brush_cursor {
        live_brush_cursor(editor)
    } else {
        None
    };

    if selection_bounds.is_none() && brush_cursor.is_none() {
        return None;
    }
    Some(Overlays {
        selection_bounds,
        brush_cursor,
    })
}

fn live_brush_cursor(editor: &Editor) -> Option<BrushCursor> {
    let Gesture::BrushStroke { layer_id } = editor.gesture()? else {
        return None;
    };
    let layer = editor.project.layer(*layer_id)?;
    let LayerData::Brush(brush) = &layer.data else {
        return None;
    };
    let tip = *brush.points.last()?;
    Some(BrushCursor {
        position: layer.position + tip,
        radius: brush.stroke_width * 0.5,
    })
}

/// Render the canvas as the editor currently shows it, overlays included.
pub fn render_editor(
    editor: &Editor,
    fonts: &FontStore,
) -> Result<tiny_skia::Pixmap, ExportError> {
    let options = RenderOptions {
        overlays: editor_overlays(editor),
    };
    Ok(compositor::render(
        &editor.project,
        &editor.template,
        fonts,
        &options,
    )?)
}

/// Capture a flattened PNG of the composited canvas at the template's
/// native resolution.
///
/// Interactive-only overlays are hidden for the capture and the editor's
/// overlay visibility is restored afterwards, even when rendering fails --
/// capture must never permanently change editor state.
pub fn snapshot(editor: &mut Editor, fonts: &FontStore) -> Result<Capture, ExportError> {
    let handles = editor.show_handles;
    let brush_cursor = editor.show_brush_cursor;
    editor.show_handles = false;
    editor.show_brush_cursor = false;

    let rendered = render_editor(editor, fonts);

    editor.show_handles = handles;
    editor.show_brush_cursor = brush_cursor;

    let pixmap = rendered?;
    let png = pixmap
        .encode_png()
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    Ok(Capture {
        png,
        revision: editor.revision(),
    })
}

/// Downscale a capture to a square thumbnail of the given edge length.
pub fn thumbnail(png: &[u8], size: u32) -> Result<Vec<u8>, ExportError> {
    let source = tiny_skia::Pixmap::decode_png(png)
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    let mut scaled = tiny_skia::Pixmap::new(size.max(1), size.max(1))
        .ok_or(ExportError::Encode("empty thumbnail size".into()))?;
    let sx = scaled.width() as f32 / source.width() as f32;
    let sy = scaled.height() as f32 / source.height() as f32;
    scaled.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &tiny_skia::PixmapPaint {
            quality: tiny_skia::FilterQuality::Bilinear,
            ..tiny_skia::PixmapPaint::default()
        },
        tiny_skia::Transform::from_scale(sx, sy),
        None,
    );
    scaled
        .encode_png()
        .map_err(|err| ExportError::Encode(err.to_string()))
}

/// Consumer of the flattened raster, e.g. the embedded 3D preview.
pub trait TextureSink {
    fn set_texture(&mut self, png: &[u8]);
}

/// Hand a completed capture to a texture consumer, refusing stale results:
/// if the project has been mutated since the capture was taken, the
/// hand-off is rejected instead of applying an outdated raster.
pub fn deliver_preview(
    capture: &Capture,
    editor: &Editor,
    sink: &mut dyn TextureSink,
) -> Result<(), ExportError> {
    if !capture.is_current(editor) {
        return Err(ExportError::Stale {
            captured: capture.revision,
            current: editor.revision(),
        });
    }
    sink.set_texture(&capture.png);
    Ok(())
}

/// Everything the publish collaborator needs: the preview raster and the
/// project archive, produced from the same in-memory state.
#[derive(Clone, Debug)]
pub struct PublishRequest {
    pub title: String,
    pub description: String,
    pub template_id: String,
    pub preview_png: Vec<u8>,
    pub archive: Vec<u8>,
    pub owner: String,
}

/// External storage/gallery collaborator. Returns the new design id, or
/// an error message surfaced to the user verbatim.
pub trait PublishTarget {
    fn publish(&self, request: &PublishRequest) -> Result<String, String>;
}

/// Owns the publish in-flight guard: concurrent publishes are refused,
/// never interleaved.
#[derive(Debug, Default)]
pub struct Publisher {
    in_flight: bool,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Claim the in-flight window. Asynchronous drivers call this before
    /// starting a capture and [`Publisher::finish`] when the collaborator
    /// responds.
    pub fn try_begin(&mut self) -> Result<(), ExportError> {
        if self.in_flight {
            return Err(ExportError::Busy);
        }
        self.in_flight = true;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Capture, archive, and hand both artifacts to the publish
    /// collaborator. Local project state is unaffected by failure; retry
    /// is a fresh user-initiated call.
    pub fn publish(
        &mut self,
        editor: &mut Editor,
        fonts: &FontStore,
        target: &dyn PublishTarget,
        title: impl Into<String>,
        description: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<String, ExportError> {
        self.try_begin()?;
        let result = (|| {
            let capture = snapshot(editor, fonts)?;
            let archive = interchange::serialize(&editor.project)?;
            let request = PublishRequest {
                title: title.into(),
                description: description.into(),
                template_id: editor.project.template_id.clone(),
                preview_png: capture.into_png(),
                archive,
                owner: owner.into(),
            };
            target.publish(&request).map_err(ExportError::Publish)
        })();
        self.finish();
        if let Err(err) = &result {
            log::warn!("publish failed: {err}");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas::Tool;
    use glam::Vec2;
    use layer::{Layer, LayerData, Project, RectLayer, Template};
    use std::cell::RefCell;
    use stencil_core::Color;

    fn editor_with_selection() -> Editor {
        let mut project = Project::new("test", "mug-classic", Color::WHITE);
        let layer = Layer::new(
            "panel",
            LayerData::Rect(RectLayer {
                width: 30.0,
                height: 30.0,
                corner_radius: 0.0,
                fill: Color::rgb(0.0, 0.0, 1.0),
                stroke: None,
            }),
        )
        .with_position(Vec2::new(10.0, 10.0));
        let id = layer.id;
        project.add_layer(layer);

        let mut editor = Editor::new(project, Template::opaque("mug-classic", 64));
        editor.select(id, false);
        editor.show_handles = true;
        editor
    }

    fn png_pixel(png: &[u8], x: u32, y: u32) -> (u8, u8, u8, u8) {
        let pixmap = tiny_skia::Pixmap::decode_png(png).unwrap();
        let px = pixmap.pixel(x, y).unwrap();
        (px.red(), px.green(), px.blue(), px.alpha())
    }

    #[test]
    fn snapshot_excludes_overlays_and_restores_flags() {
        let mut editor = editor_with_selection();
        editor.show_brush_cursor = true;

        // The live view draws a selection handle at the bounds corner.
        let live = render_editor(&editor, &FontStore::new()).unwrap();
        let handle_px = live.pixel(10, 10).unwrap();
        assert_ne!(
            (handle_px.red(), handle_px.green(), handle_px.blue()),
            (0, 0, 255),
            "live render should show the handle over the layer"
        );

        let capture = snapshot(&mut editor, &FontStore::new()).unwrap();
        // The capture shows the layer itself, not the handle.
        assert_eq!(png_pixel(capture.png(), 10, 10), (0, 0, 255, 255));
        // Flags were restored.
        assert!(editor.show_handles);
        assert!(editor.show_brush_cursor);
    }

    #[test]
    fn stale_captures_are_refused() {
        struct Sink(Vec<u8>);
        impl TextureSink for Sink {
            fn set_texture(&mut self, png: &[u8]) {
                self.0 = png.to_vec();
            }
        }

        let mut editor = editor_with_selection();
        let capture = snapshot(&mut editor, &FontStore::new()).unwrap();

        let mut sink = Sink(Vec::new());
        deliver_preview(&capture, &editor, &mut sink).unwrap();
        assert!(!sink.0.is_empty());

        // Mutate the project; the old capture must now be refused.
        editor.set_tool(Tool::Select);
        let id = editor.project.layers[0].id;
        editor.set_opacity(id, 0.5);

        let mut sink = Sink(Vec::new());
        assert!(matches!(
            deliver_preview(&capture, &editor, &mut sink),
            Err(ExportError::Stale { .. })
        ));
        assert!(sink.0.is_empty());
    }

    struct RecordingTarget {
        requests: RefCell<Vec<PublishRequest>>,
        response: Result<String, String>,
    }

    impl PublishTarget for RecordingTarget {
        fn publish(&self, request: &PublishRequest) -> Result<String, String> {
            self.requests.borrow_mut().push(request.clone());
            self.response.clone()
        }
    }

    #[test]
    fn publish_hands_consistent_artifacts_to_the_collaborator() {
        let mut editor = editor_with_selection();
        let target = RecordingTarget {
            requests: RefCell::new(Vec::new()),
            response: Ok("design-42".into()),
        };

        let mut publisher = Publisher::new();
        let design_id = publisher
            .publish(
                &mut editor,
                &FontStore::new(),
                &target,
                "Blue panel",
                "A very blue panel",
                "user-7",
            )
            .unwrap();
        assert_eq!(design_id, "design-42");
        assert!(!publisher.is_busy());

        let requests = target.requests.borrow();
        let request = &requests[0];
        assert_eq!(request.template_id, "mug-classic");
        assert_eq!(request.owner, "user-7");
        // Both artifacts are usable: the preview decodes, the archive
        // round-trips to the same project.
        assert!(tiny_skia::Pixmap::decode_png(&request.preview_png).is_ok());
        let restored = interchange::deserialize(&request.archive).unwrap();
        assert_eq!(restored.layers, editor.project.layers);
    }

    #[test]
    fn publish_is_refused_while_one_is_in_flight() {
        let mut editor = editor_with_selection();
        let target = RecordingTarget {
            requests: RefCell::new(Vec::new()),
            response: Ok("design-1".into()),
        };

        let mut publisher = Publisher::new();
        publisher.try_begin().unwrap();
        assert!(matches!(
            publisher.publish(
                &mut editor,
                &FontStore::new(),
                &target,
                "t",
                "d",
                "owner"
            ),
            Err(ExportError::Busy)
        ));
        assert!(target.requests.borrow().is_empty());

        publisher.finish();
        assert!(publisher
            .publish(&mut editor, &FontStore::new(), &target, "t", "d", "owner")
            .is_ok());
    }

    #[test]
    fn publish_failure_surfaces_the_collaborator_message() {
        let mut editor = editor_with_selection();
        let layers_before = editor.project.layers.clone();
        let target = RecordingTarget {
            requests: RefCell::new(Vec::new()),
            response: Err("gallery quota exceeded".into()),
        };

        let mut publisher = Publisher::new();
        let err = publisher
            .publish(&mut editor, &FontStore::new(), &target, "t", "d", "owner")
            .unwrap_err();
        assert!(err.to_string().contains("gallery quota exceeded"));
        // Local state is unaffected and the guard is released for a
        // user-initiated retry.
        assert_eq!(editor.project.layers, layers_before);
        assert!(!publisher.is_busy());
    }

    #[test]
    fn thumbnail_downscales_to_the_requested_edge() {
        let mut editor = editor_with_selection();
        let capture = snapshot(&mut editor, &FontStore::new()).unwrap();
        let thumb = thumbnail(capture.png(), 16).unwrap();
        let pixmap = tiny_skia::Pixmap::decode_png(&thumb).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (16, 16));
    }
}
