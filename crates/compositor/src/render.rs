use crate::mask::apply_alpha_mask;
use crate::paint::{self, to_skia_color, PaintContext};
use crate::{FontStore, RenderError};
use glam::Vec2;
use layer::{Project, Template};
use tiny_skia::{
    Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, StrokeDash, Transform,
};

/// Live brush-cursor indicator state.
#[derive(Clone, Copy, Debug)]
pub struct BrushCursor {
    pub position: Vec2,
    pub radius: f32,
}

/// Interactive-only overlays drawn above the masked composite. These never
/// appear in exported rasters: the export pipeline simply renders without
/// them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overlays {
    /// World-space bounds of the current selection; drawn as a dashed
    /// rectangle with corner transform handles.
    pub selection_bounds: Option<(Vec2, Vec2)>,
    pub brush_cursor: Option<BrushCursor>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    pub overlays: Option<Overlays>,
}

/// Produce the final visible image for a project.
///
/// 1. Fill the canvas extent with the project's base color.
/// 2. Multiply by the template alpha mask.
/// 3. Render all layers in reverse-of-authoring order on top.
/// 4. Multiply the combined layer stack by the mask a second time, so no
///    layer content extends beyond the silhouette regardless of its
///    transform, and composite it over the masked base.
/// 5. Draw interactive overlays, if any were requested.
pub fn render(
    project: &Project,
    template: &Template,
    fonts: &FontStore,
    options: &RenderOptions,
) -> Result<Pixmap, RenderError> {
    let size = template.size;
    if template.mask.width() != size || template.mask.height() != size {
        return Err(RenderError::MaskSize {
            expected: size,
            actual: (template.mask.width(), template.mask.height()),
        });
    }

    let mut canvas = Pixmap::new(size, size).ok_or(RenderError::Allocation { size })?;
    canvas.fill(to_skia_color(project.base_color));
    apply_alpha_mask(&mut canvas, &template.mask);

    let mut stack = Pixmap::new(size, size).ok_or(RenderError::Allocation { size })?;
    let ctx = PaintContext { size, fonts };
    // Stored order is most-recent-first; oldest renders at the back.
    for layer in project.layers.iter().rev() {
        if !layer.visible || layer.opacity <= 0.0 {
            continue;
        }
        paint::paint_layer(&mut stack, layer, &ctx);
    }
    apply_alpha_mask(&mut stack, &template.mask);

    canvas.draw_pixmap(
        0,
        0,
        stack.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );

    if let Some(overlays) = &options.overlays {
        draw_overlays(&mut canvas, overlays);
    }

    Ok(canvas)
}

const HANDLE_SIZE: f32 = 8.0;

fn draw_overlays(canvas: &mut Pixmap, overlays: &Overlays) {
    let mut accent = Paint::default();
    accent.set_color_rgba8(36, 131, 226, 255);
    accent.anti_alias = true;

    if let Some((min, max)) = overlays.selection_bounds {
        if let Some(rect) = Rect::from_ltrb(min.x, min.y, max.x, max.y) {
            let mut pb = PathBuilder::new();
            pb.push_rect(rect);
            if let Some(path) = pb.finish() {
                let stroke = Stroke {
                    width: 1.0,
                    dash: StrokeDash::new(vec![4.0, 4.0], 0.0),
                    ..Stroke::default()
                };
                canvas.stroke_path(&path, &accent, &stroke, Transform::identity(), None);
            }
        }

        for corner in [
            min,
            Vec2::new(max.x, min.y),
            max,
            Vec2::new(min.x, max.y),
        ] {
            if let Some(handle) = Rect::from_xywh(
                corner.x - HANDLE_SIZE * 0.5,
                corner.y - HANDLE_SIZE * 0.5,
                HANDLE_SIZE,
                HANDLE_SIZE,
            ) {
                canvas.fill_rect(handle, &accent, Transform::identity(), None);
            }
        }
    }

    if let Some(cursor) = overlays.brush_cursor {
        let mut pb = PathBuilder::new();
        pb.push_circle(cursor.position.x, cursor.position.y, cursor.radius.max(1.0));
        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: 1.0,
                ..Stroke::default()
            };
            canvas.stroke_path(&path, &accent, &stroke, Transform::identity(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer::{
        CircleLayer, FillLayer, ImageSource, Layer, LayerData, Raster, RectLayer,
    };
    use stencil_core::Color;

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    fn rect_layer(width: f32, height: f32, fill: Color) -> Layer {
        Layer::new(
            "rect",
            LayerData::Rect(RectLayer {
                width,
                height,
                corner_radius: 0.0,
                fill,
                stroke: None,
            }),
        )
    }

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let px = pixmap.pixel(x, y).unwrap();
        (px.red(), px.green(), px.blue(), px.alpha())
    }

    /// Base color everywhere inside the mask except where the rectangle
    /// covers it.
    #[test]
    fn base_color_and_rect_scenario() {
        let template = Template::opaque("mug-classic", 64);
        let mut project = Project::new("scenario", "mug-classic", RED);
        project.add_layer(rect_layer(20.0, 10.0, BLUE));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();

        // Inside the rectangle: the rectangle's own fill.
        assert_eq!(pixel(&pixmap, 10, 5), (0, 0, 255, 255));
        // Outside the rectangle but inside the mask: the base color.
        assert_eq!(pixel(&pixmap, 40, 5), (255, 0, 0, 255));
        assert_eq!(pixel(&pixmap, 10, 40), (255, 0, 0, 255));
    }

    /// Full-size variant: red base on an opaque 1024 square with a
    /// 200x100 rectangle at the origin shows red everywhere inside the
    /// mask except the rectangle's own fill.
    #[test]
    fn base_color_and_rect_scenario_at_native_size() {
        let template = Template::opaque("mug-classic", 1024);
        let mut project = Project::new("scenario", "mug-classic", RED);
        project.add_layer(rect_layer(200.0, 100.0, BLUE));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();

        assert_eq!(pixel(&pixmap, 100, 50), (0, 0, 255, 255));
        assert_eq!(pixel(&pixmap, 300, 50), (255, 0, 0, 255));
        assert_eq!(pixel(&pixmap, 100, 200), (255, 0, 0, 255));
        assert_eq!(pixel(&pixmap, 1000, 1000), (255, 0, 0, 255));
    }

    /// No layer pixels survive outside the template's opaque region, no
    /// matter where the layer transform puts them.
    #[test]
    fn mask_confines_layers_and_base() {
        // Opaque left half, transparent right half.
        let mut mask = Raster::new(64, 64);
        for y in 0..64 {
            for x in 0..32 {
                mask.put_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let template = Template::new("half", mask).unwrap();

        let mut project = Project::new("confined", "half", RED);
        // Positioned entirely over the transparent half.
        project.add_layer(rect_layer(20.0, 20.0, BLUE).with_position(glam::Vec2::new(40.0, 10.0)));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();

        // Transparent half: no base color, no layer pixels.
        assert_eq!(pixel(&pixmap, 45, 15), (0, 0, 0, 0));
        assert_eq!(pixel(&pixmap, 50, 50), (0, 0, 0, 0));
        // Opaque half still shows the base.
        assert_eq!(pixel(&pixmap, 10, 10), (255, 0, 0, 255));
    }

    #[test]
    fn straddling_layer_is_clipped_at_the_mask_edge() {
        let mut mask = Raster::new(64, 64);
        for y in 0..64 {
            for x in 0..32 {
                mask.put_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let template = Template::new("half", mask).unwrap();

        let mut project = Project::new("straddle", "half", RED);
        project.add_layer(rect_layer(40.0, 8.0, BLUE).with_position(glam::Vec2::new(10.0, 10.0)));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();

        // Inside the mask the rectangle shows...
        assert_eq!(pixel(&pixmap, 20, 12), (0, 0, 255, 255));
        // ...and past the mask edge it is gone.
        assert_eq!(pixel(&pixmap, 40, 12), (0, 0, 0, 0));
    }

    #[test]
    fn invisible_and_zero_opacity_layers_contribute_no_pixels() {
        let template = Template::opaque("mug-classic", 32);
        let mut project = Project::new("hidden", "mug-classic", RED);
        let mut hidden = rect_layer(10.0, 10.0, BLUE);
        hidden.visible = false;
        project.add_layer(hidden);
        project.add_layer(rect_layer(10.0, 10.0, BLUE).with_opacity(0.0));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();
        assert_eq!(pixel(&pixmap, 5, 5), (255, 0, 0, 255));
    }

    #[test]
    fn newer_layers_render_in_front() {
        let template = Template::opaque("mug-classic", 32);
        let mut project = Project::new("order", "mug-classic", Color::WHITE);
        project.add_layer(rect_layer(16.0, 16.0, RED));
        project.add_layer(rect_layer(16.0, 16.0, BLUE));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();
        // The most recently added layer wins the overlap.
        assert_eq!(pixel(&pixmap, 8, 8), (0, 0, 255, 255));
    }

    #[test]
    fn fill_layer_covers_the_canvas_under_the_mask() {
        let template = Template::opaque("mug-classic", 16);
        let mut project = Project::new("filled", "mug-classic", RED);
        project.add_layer(Layer::new(
            "fill",
            LayerData::Fill(FillLayer {
                raster: ImageSource::Embedded(Raster::solid(16, 16, BLUE)),
            }),
        ));

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();
        assert_eq!(pixel(&pixmap, 2, 2), (0, 0, 255, 255));
        assert_eq!(pixel(&pixmap, 14, 14), (0, 0, 255, 255));
    }

    #[test]
    fn opacity_blends_toward_the_base() {
        let template = Template::opaque("mug-classic", 16);
        let mut project = Project::new("half", "mug-classic", Color::WHITE);
        project.add_layer(
            Layer::new(
                "dot",
                LayerData::Circle(CircleLayer {
                    radius: 6.0,
                    fill: Color::BLACK,
                    stroke: None,
                }),
            )
            .with_position(glam::Vec2::new(8.0, 8.0))
            .with_opacity(0.5),
        );

        let pixmap = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();
        let (r, _, _, a) = pixel(&pixmap, 8, 8);
        assert_eq!(a, 255);
        // Half-black over white sits near mid gray.
        assert!((r as i16 - 128).abs() <= 2, "got {r}");
    }

    #[test]
    fn overlays_draw_only_when_requested() {
        let template = Template::opaque("mug-classic", 64);
        let project = Project::new("plain", "mug-classic", Color::WHITE);

        let plain = render(&project, &template, &FontStore::new(), &RenderOptions::default())
            .unwrap();
        let with_overlays = render(
            &project,
            &template,
            &FontStore::new(),
            &RenderOptions {
                overlays: Some(Overlays {
                    selection_bounds: Some((Vec2::new(10.0, 10.0), Vec2::new(40.0, 40.0))),
                    brush_cursor: Some(BrushCursor {
                        position: Vec2::new(50.0, 50.0),
                        radius: 6.0,
                    }),
                }),
            },
        )
        .unwrap();

        assert_ne!(plain.data(), with_overlays.data());
        // A corner handle sits at (10, 10) only in the overlay render.
        assert_eq!(pixel(&plain, 10, 10), (255, 255, 255, 255));
        assert_ne!(pixel(&with_overlays, 10, 10), (255, 255, 255, 255));
    }
}
