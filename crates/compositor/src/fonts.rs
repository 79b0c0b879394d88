use ab_glyph::FontArc;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Maps font family names to loaded fonts for text layer rasterization.
///
/// An unresolvable family is not an error at render time: the text layer
/// draws nothing and a warning is logged, so a missing font can never
/// abort a composite.
#[derive(Clone, Default)]
pub struct FontStore {
    fonts: HashMap<String, FontArc>,
    fallback: Option<FontArc>,
}

impl FontStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register font bytes under a family name. The first registered font
    /// also becomes the fallback for unknown families.
    pub fn register(&mut self, family: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        let family = family.into();
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("failed to parse font data for family {family:?}"))?;
        if self.fallback.is_none() {
            self.fallback = Some(font.clone());
        }
        self.fonts.insert(family, font);
        Ok(())
    }

    /// Load every `.ttf`/`.otf` in a directory, keyed by file stem.
    /// Returns the number of fonts loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read font directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
                .unwrap_or(false);
            if !is_font {
                continue;
            }
            let Some(family) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read font file {}", path.display()))?;
            self.register(family, bytes)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Resolve a family name, falling back to the first registered font.
    pub fn resolve(&self, family: &str) -> Option<&FontArc> {
        self.fonts.get(family).or(self.fallback.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl std::fmt::Debug for FontStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontStore")
            .field("families", &self.fonts.keys().collect::<Vec<_>>())
            .finish()
    }
}
