use layer::Raster;
use tiny_skia::Pixmap;

/// Multiply a pixmap by a mask raster's alpha channel in place.
///
/// The pixmap stores premultiplied RGBA, so every channel is scaled by the
/// mask alpha; a pixel where the mask is transparent is cleared entirely.
/// This is the destination-constrained composite that keeps both the base
/// color and the combined layer stack inside the template silhouette.
pub fn apply_alpha_mask(pixmap: &mut Pixmap, mask: &Raster) {
    debug_assert_eq!(pixmap.width(), mask.width());
    debug_assert_eq!(pixmap.height(), mask.height());

    let width = pixmap.width() as usize;
    let mask_data = mask.data();
    for (i, pixel) in pixmap.data_mut().chunks_exact_mut(4).enumerate() {
        let x = i % width;
        let y = i / width;
        let mask_alpha = mask_data
            .get((y * width + x) * 4 + 3)
            .copied()
            .unwrap_or(0) as u16;
        if mask_alpha == 255 {
            continue;
        }
        pixel[0] = ((pixel[0] as u16 * mask_alpha + 127) / 255) as u8;
        pixel[1] = ((pixel[1] as u16 * mask_alpha + 127) / 255) as u8;
        pixel[2] = ((pixel[2] as u16 * mask_alpha + 127) / 255) as u8;
        pixel[3] = ((pixel[3] as u16 * mask_alpha + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::Color;

    #[test]
    fn transparent_mask_clears_pixels() {
        let mut pixmap = Pixmap::new(2, 2).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));

        // Opaque on the left column, transparent on the right.
        let mut mask = Raster::new(2, 2);
        mask.put_pixel(0, 0, Color::WHITE.to_rgba8());
        mask.put_pixel(0, 1, Color::WHITE.to_rgba8());

        apply_alpha_mask(&mut pixmap, &mask);

        let left = pixmap.pixel(0, 0).unwrap();
        assert_eq!((left.red(), left.alpha()), (255, 255));
        let right = pixmap.pixel(1, 0).unwrap();
        assert_eq!(right.alpha(), 0);
        assert_eq!(right.red(), 0);
    }

    #[test]
    fn partial_mask_scales_coverage() {
        let mut pixmap = Pixmap::new(1, 1).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(200, 100, 0, 255));

        let mut mask = Raster::new(1, 1);
        mask.put_pixel(0, 0, [255, 255, 255, 128]);

        apply_alpha_mask(&mut pixmap, &mask);
        let px = pixmap.pixel(0, 0).unwrap();
        assert_eq!(px.alpha(), 128);
        assert!((px.red() as i16 - 100).abs() <= 1);
    }
}
