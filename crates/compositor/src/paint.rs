use crate::FontStore;
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use glam::Vec2;
use layer::{
    BrushLayer, CircleLayer, FillLayer, ImageLayer, Layer, LayerData, LineEnd, LineLayer, Raster,
    RectLayer, StarLayer, Stroke as LayerStroke, TextLayer,
};
use stencil_core::Color;
use tiny_skia::{
    FillRule, FilterQuality, Paint, Path, PathBuilder, Pattern, Pixmap, PixmapPaint, Rect,
    SpreadMode, Stroke, Transform,
};

pub(crate) struct PaintContext<'a> {
    pub size: u32,
    pub fonts: &'a FontStore,
}

/// Draw one layer into the stack pixmap using its kind's own drawing rule,
/// under the layer's opacity and position/rotation/scale transform.
pub(crate) fn paint_layer(stack: &mut Pixmap, layer: &Layer, ctx: &PaintContext<'_>) {
    let transform = layer_transform(layer);
    let opacity = layer.opacity.clamp(0.0, 1.0);

    match &layer.data {
        LayerData::Text(text) => paint_text(stack, text, transform, opacity, ctx),
        LayerData::Image(image) => paint_image(stack, layer, image, transform, opacity),
        LayerData::Texture(image) => paint_texture(stack, layer, image, transform, opacity, ctx),
        LayerData::Brush(brush) => paint_brush(stack, brush, transform, opacity),
        LayerData::Line(line) => paint_line(stack, line, transform, opacity),
        LayerData::Star(star) => paint_star(stack, star, transform, opacity),
        LayerData::Rect(rect) => paint_rect(stack, rect, transform, opacity),
        LayerData::Circle(circle) => paint_circle(stack, circle, transform, opacity),
        LayerData::Fill(fill) => paint_fill(stack, layer, fill, opacity),
    }
}

/// Scale-then-rotate-then-translate, pivoting rotation at the layer's
/// position.
pub(crate) fn layer_transform(layer: &Layer) -> Transform {
    Transform::from_translate(layer.position.x, layer.position.y)
        .pre_concat(Transform::from_rotate(layer.rotation))
        .pre_concat(Transform::from_scale(layer.scale.x, layer.scale.y))
}

pub(crate) fn to_skia_color(color: Color) -> tiny_skia::Color {
    let [r, g, b, a] = color.to_rgba8();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn solid_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    let [r, g, b, _] = color.to_rgba8();
    let alpha = ((color.a * opacity).clamp(0.0, 1.0) * 255.0).round() as u8;
    paint.set_color_rgba8(r, g, b, alpha);
    paint.anti_alias = true;
    paint
}

fn fill_and_stroke(
    pixmap: &mut Pixmap,
    path: &Path,
    fill: Option<Color>,
    stroke: Option<&LayerStroke>,
    transform: Transform,
    opacity: f32,
) {
    if let Some(fill) = fill {
        pixmap.fill_path(
            path,
            &solid_paint(fill, opacity),
            FillRule::Winding,
            transform,
            None,
        );
    }
    if let Some(stroke) = stroke {
        pixmap.stroke_path(
            path,
            &solid_paint(stroke.color, opacity),
            &Stroke {
                width: stroke.width,
                ..Stroke::default()
            },
            transform,
            None,
        );
    }
}

// ---- geometric shapes ------------------------------------------------------

fn paint_rect(pixmap: &mut Pixmap, rect: &RectLayer, transform: Transform, opacity: f32) {
    let Some(path) = rounded_rect_path(rect.width, rect.height, rect.corner_radius) else {
        return;
    };
    fill_and_stroke(
        pixmap,
        &path,
        Some(rect.fill),
        rect.stroke.as_ref(),
        transform,
        opacity,
    );
}

fn paint_circle(pixmap: &mut Pixmap, circle: &CircleLayer, transform: Transform, opacity: f32) {
    let mut pb = PathBuilder::new();
    pb.push_circle(0.0, 0.0, circle.radius);
    let Some(path) = pb.finish() else {
        return;
    };
    fill_and_stroke(
        pixmap,
        &path,
        Some(circle.fill),
        circle.stroke.as_ref(),
        transform,
        opacity,
    );
}

fn paint_star(pixmap: &mut Pixmap, star: &StarLayer, transform: Transform, opacity: f32) {
    let Some(path) = star_path(star.points, star.inner_radius, star.outer_radius) else {
        return;
    };
    fill_and_stroke(
        pixmap,
        &path,
        Some(star.fill),
        star.stroke.as_ref(),
        transform,
        opacity,
    );
}

/// Rounded rectangle anchored at the layer origin. A zero radius degrades
/// to a plain rectangle path.
fn rounded_rect_path(width: f32, height: f32, radius: f32) -> Option<Path> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let mut pb = PathBuilder::new();
    let radius = radius.max(0.0).min(width * 0.5).min(height * 0.5);
    if radius == 0.0 {
        pb.push_rect(Rect::from_xywh(0.0, 0.0, width, height)?);
        return pb.finish();
    }

    // Cubic circle-arc approximation constant.
    const K: f32 = 0.552_285;
    let handle = radius * K;
    pb.move_to(radius, 0.0);
    pb.line_to(width - radius, 0.0);
    pb.cubic_to(
        width - radius + handle,
        0.0,
        width,
        radius - handle,
        width,
        radius,
    );
    pb.line_to(width, height - radius);
    pb.cubic_to(
        width,
        height - radius + handle,
        width - radius + handle,
        height,
        width - radius,
        height,
    );
    pb.line_to(radius, height);
    pb.cubic_to(radius - handle, height, 0.0, height - radius + handle, 0.0, height - radius);
    pb.line_to(0.0, radius);
    pb.cubic_to(0.0, radius - handle, radius - handle, 0.0, radius, 0.0);
    pb.close();
    pb.finish()
}

/// Star polygon centered on the layer origin; vertices alternate between
/// the outer and inner radius, starting from the top.
fn star_path(points: u32, inner_radius: f32, outer_radius: f32) -> Option<Path> {
    if points < 2 || outer_radius <= 0.0 {
        return None;
    }
    let mut pb = PathBuilder::new();
    let step = std::f32::consts::PI / points as f32;
    for i in 0..points * 2 {
        let radius = if i % 2 == 0 {
            outer_radius
        } else {
            inner_radius
        };
        let angle = i as f32 * step - std::f32::consts::FRAC_PI_2;
        let (sin, cos) = angle.sin_cos();
        let x = cos * radius;
        let y = sin * radius;
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }
    pb.close();
    pb.finish()
}

// ---- lines and strokes -----------------------------------------------------

fn paint_line(pixmap: &mut Pixmap, line: &LineLayer, transform: Transform, opacity: f32) {
    let start = line.endpoint(LineEnd::Start);
    let end = line.endpoint(LineEnd::End);
    if start == end {
        return;
    }

    let mut pb = PathBuilder::new();
    pb.move_to(start.x, start.y);
    pb.line_to(end.x, end.y);
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(
            &path,
            &solid_paint(line.stroke, opacity),
            &Stroke {
                width: line.stroke_width,
                line_cap: tiny_skia::LineCap::Round,
                ..Stroke::default()
            },
            transform,
            None,
        );
    }

    let paint = solid_paint(line.stroke, opacity);
    if line.arrow_start {
        if let Some(head) = arrow_head_path(start, start - end, line.stroke_width) {
            pixmap.fill_path(&head, &paint, FillRule::Winding, transform, None);
        }
    }
    if line.arrow_end {
        if let Some(head) = arrow_head_path(end, end - start, line.stroke_width) {
            pixmap.fill_path(&head, &paint, FillRule::Winding, transform, None);
        }
    }
}

/// Filled triangle at `tip`, pointing along `direction`.
fn arrow_head_path(tip: Vec2, direction: Vec2, stroke_width: f32) -> Option<Path> {
    let direction = direction.try_normalize()?;
    let length = (stroke_width * 3.0).max(6.0);
    let half_width = length * 0.5;
    let back = tip - direction * length;
    let normal = Vec2::new(-direction.y, direction.x) * half_width;
    let left = back + normal;
    let right = back - normal;

    let mut pb = PathBuilder::new();
    pb.move_to(tip.x, tip.y);
    pb.line_to(left.x, left.y);
    pb.line_to(right.x, right.y);
    pb.close();
    pb.finish()
}

fn paint_brush(pixmap: &mut Pixmap, brush: &BrushLayer, transform: Transform, opacity: f32) {
    let Some(first) = brush.points.first() else {
        return;
    };

    // A single tap leaves a dot rather than an invisible zero-length path.
    if brush.points.len() == 1 {
        let mut pb = PathBuilder::new();
        pb.push_circle(first.x, first.y, brush.stroke_width * 0.5);
        if let Some(path) = pb.finish() {
            pixmap.fill_path(
                &path,
                &solid_paint(brush.color, opacity),
                FillRule::Winding,
                transform,
                None,
            );
        }
        return;
    }

    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for point in &brush.points[1..] {
        pb.line_to(point.x, point.y);
    }
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(
            &path,
            &solid_paint(brush.color, opacity),
            &Stroke {
                width: brush.stroke_width,
                line_cap: tiny_skia::LineCap::Round,
                line_join: tiny_skia::LineJoin::Round,
                ..Stroke::default()
            },
            transform,
            None,
        );
    }
}

// ---- raster layers ---------------------------------------------------------

/// Copy a straight-alpha raster into a premultiplied pixmap.
pub(crate) fn raster_to_pixmap(raster: &Raster) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(raster.width(), raster.height())?;
    let mut rgba = raster.data().to_vec();
    premultiply_rgba_in_place(&mut rgba);
    pixmap.data_mut().copy_from_slice(&rgba);
    Some(pixmap)
}

fn premultiply_rgba_in_place(bytes: &mut [u8]) {
    for pixel in bytes.chunks_exact_mut(4) {
        let alpha = pixel[3] as u16;
        if alpha == 255 {
            continue;
        }
        pixel[0] = ((pixel[0] as u16 * alpha + 127) / 255) as u8;
        pixel[1] = ((pixel[1] as u16 * alpha + 127) / 255) as u8;
        pixel[2] = ((pixel[2] as u16 * alpha + 127) / 255) as u8;
    }
}

fn paint_image(
    pixmap: &mut Pixmap,
    layer: &Layer,
    image: &ImageLayer,
    transform: Transform,
    opacity: f32,
) {
    let Some(raster) = image.source.raster() else {
        log::warn!(
            "image layer {} has an unresolved external source, skipping",
            layer.id
        );
        return;
    };
    let Some(source) = raster_to_pixmap(raster) else {
        return;
    };
    let paint = PixmapPaint {
        opacity,
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
}

/// Tile the texture raster across the whole canvas. The layer transform
/// moves the pattern space, so dragging or scaling a texture shifts its
/// tiling without changing the covered extent.
fn paint_texture(
    pixmap: &mut Pixmap,
    layer: &Layer,
    image: &ImageLayer,
    transform: Transform,
    opacity: f32,
    ctx: &PaintContext<'_>,
) {
    let Some(raster) = image.source.raster() else {
        log::warn!(
            "texture layer {} has an unresolved external source, skipping",
            layer.id
        );
        return;
    };
    let Some(source) = raster_to_pixmap(raster) else {
        return;
    };
    let Some(bounds) = Rect::from_xywh(0.0, 0.0, ctx.size as f32, ctx.size as f32) else {
        return;
    };

    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.shader = Pattern::new(
        source.as_ref(),
        SpreadMode::Repeat,
        FilterQuality::Bilinear,
        opacity,
        transform,
    );
    pixmap.fill_rect(bounds, &paint, Transform::identity(), None);
}

/// Blit a full-canvas fill raster. Fills ignore the layer transform: they
/// always cover the canvas origin at native size.
fn paint_fill(pixmap: &mut Pixmap, layer: &Layer, fill: &FillLayer, opacity: f32) {
    let Some(raster) = fill.raster.raster() else {
        log::warn!(
            "fill layer {} has an unresolved external source, skipping",
            layer.id
        );
        return;
    };
    let Some(source) = raster_to_pixmap(raster) else {
        return;
    };
    let paint = PixmapPaint {
        opacity,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::identity(), None);
}

// ---- text ------------------------------------------------------------------

fn paint_text(
    pixmap: &mut Pixmap,
    text: &TextLayer,
    transform: Transform,
    opacity: f32,
    ctx: &PaintContext<'_>,
) {
    if text.content.is_empty() {
        return;
    }
    let Some(font) = ctx.fonts.resolve(&text.font_family) else {
        log::warn!(
            "no font registered for family {:?}, skipping text layer",
            text.font_family
        );
        return;
    };
    let Some(rendered) = rasterize_text(text, font) else {
        return;
    };
    let paint = PixmapPaint {
        opacity,
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, rendered.as_ref(), &paint, transform, None);
}

/// Rasterize a text layer's glyphs into a tight premultiplied pixmap.
fn rasterize_text(text: &TextLayer, font: &FontArc) -> Option<Pixmap> {
    let scale = PxScale::from(text.font_size.max(1.0));
    let scaled = font.as_scaled(scale);
    let line_height = scaled.height() + scaled.line_gap();
    let lines: Vec<&str> = text.content.split('\n').collect();

    let mut max_width = 0.0f32;
    for line in &lines {
        let mut width = 0.0f32;
        let mut prev = None;
        for ch in line.chars() {
            let glyph = font.glyph_id(ch);
            if let Some(prev) = prev {
                width += scaled.kern(prev, glyph);
            }
            width += scaled.h_advance(glyph);
            prev = Some(glyph);
        }
        max_width = max_width.max(width);
    }

    let width = max_width.ceil() as u32;
    let height = (lines.len() as f32 * line_height).ceil() as u32;
    if width == 0 || height == 0 {
        return None;
    }
    let mut pixmap = Pixmap::new(width, height)?;
    let color = text.fill;

    for (row, line) in lines.iter().enumerate() {
        let baseline = row as f32 * line_height + scaled.ascent();
        let mut x = 0.0f32;
        let mut prev = None;
        for ch in line.chars() {
            let glyph_id = font.glyph_id(ch);
            if let Some(prev) = prev {
                x += scaled.kern(prev, glyph_id);
            }
            let glyph = glyph_id.with_scale_and_position(scale, ab_glyph::point(x, baseline));
            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                outline.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    blend_coverage(&mut pixmap, px, py, color, coverage);
                });
            }
            x += scaled.h_advance(glyph_id);
            prev = Some(glyph_id);
        }
    }

    Some(pixmap)
}

/// Source-over one coverage sample of `color` onto the pixmap.
fn blend_coverage(pixmap: &mut Pixmap, x: i32, y: i32, color: Color, coverage: f32) {
    if x < 0 || y < 0 || x >= pixmap.width() as i32 || y >= pixmap.height() as i32 {
        return;
    }
    let alpha = (color.a * coverage).clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let src = [
        (color.r * alpha * 255.0).round() as u16,
        (color.g * alpha * 255.0).round() as u16,
        (color.b * alpha * 255.0).round() as u16,
        (alpha * 255.0).round() as u16,
    ];
    let inv = 255 - src[3];

    let width = pixmap.width() as usize;
    let i = (y as usize * width + x as usize) * 4;
    let data = pixmap.data_mut();
    for c in 0..4 {
        let dst = data[i + c] as u16;
        data[i + c] = (src[c] + (dst * inv + 127) / 255).min(255) as u8;
    }
}
