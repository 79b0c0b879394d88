use crate::Raster;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

/// Native edge length of a template mask, in pixels. Templates are square
/// and their extent never changes with on-screen zoom.
pub const TEMPLATE_SIZE: u32 = 1024;

/// A product template: a square raster whose alpha channel defines the
/// paintable silhouette. The mask is applied twice during compositing --
/// once to the base color fill and once to the combined layer stack.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub id: String,
    /// Edge length of the square canvas extent.
    pub size: u32,
    pub mask: Raster,
}

impl Template {
    pub fn new(id: impl Into<String>, mask: Raster) -> Result<Self> {
        if mask.width() != mask.height() {
            return Err(anyhow!(
                "template mask must be square, got {}x{}",
                mask.width(),
                mask.height()
            ));
        }
        if mask.width() == 0 {
            return Err(anyhow!("template mask must not be empty"));
        }
        Ok(Self {
            size: mask.width(),
            id: id.into(),
            mask,
        })
    }

    /// A fully-opaque square template, useful as a blank canvas and in
    /// tests.
    pub fn opaque(id: impl Into<String>, size: u32) -> Self {
        Self {
            id: id.into(),
            size,
            mask: Raster::solid(size, size, stencil_core::Color::WHITE),
        }
    }

    /// Mask alpha at (x, y); zero outside the template.
    pub fn mask_alpha(&self, x: u32, y: u32) -> u8 {
        self.mask.alpha(x, y)
    }
}

/// Resolves a template identifier to a decoded mask raster.
///
/// A failed load is reported to the caller and never retried
/// automatically.
pub trait TemplateSource {
    fn load(&self, id: &str) -> Result<Template>;
}

/// Loads templates from `{root}/{id}/mask.png`.
#[derive(Clone, Debug)]
pub struct DirTemplateSource {
    root: PathBuf,
}

impl DirTemplateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for DirTemplateSource {
    fn load(&self, id: &str) -> Result<Template> {
        let path = self.root.join(id).join("mask.png");
        let image = image::open(&path)
            .with_context(|| format!("failed to load template mask {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let mask = Raster::from_rgba(width, height, image.into_raw())?;
        Template::new(id, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::Color;

    #[test]
    fn rejects_non_square_masks() {
        let mask = Raster::solid(10, 20, Color::WHITE);
        assert!(Template::new("mug", mask).is_err());
    }

    #[test]
    fn opaque_template_is_fully_paintable() {
        let template = Template::opaque("mug", 8);
        assert_eq!(template.size, 8);
        assert_eq!(template.mask_alpha(0, 0), 255);
        assert_eq!(template.mask_alpha(7, 7), 255);
        assert_eq!(template.mask_alpha(8, 0), 0);
    }
}
