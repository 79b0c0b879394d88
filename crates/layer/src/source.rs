use crate::Raster;

/// Where an image, texture, or fill layer's pixels come from.
///
/// The embedded/external distinction is an explicit tag rather than being
/// inferred from the content of a string, so an external URL that happens
/// to resemble embedded data can never be misclassified at serialization
/// time. Only `Embedded` sources are externalized into the archive's
/// `images/` directory.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    /// A reference to pixels stored elsewhere. Passed through the archive
    /// untouched.
    External { url: String },
    /// A self-contained decoded pixel buffer.
    Embedded(Raster),
}

impl ImageSource {
    pub fn external(url: impl Into<String>) -> Self {
        Self::External { url: url.into() }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }

    /// The decoded raster, if this source carries one.
    pub fn raster(&self) -> Option<&Raster> {
        match self {
            Self::Embedded(raster) => Some(raster),
            Self::External { .. } => None,
        }
    }

    /// Short human-readable description for layer listings.
    pub fn describe(&self) -> String {
        match self {
            Self::External { url } => url.clone(),
            Self::Embedded(raster) => {
                format!("embedded {}x{}", raster.width(), raster.height())
            }
        }
    }
}
