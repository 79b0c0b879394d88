//! Stencil project archive format.
//!
//! A project serializes to a gzip-compressed tar archive:
//! - `manifest.json` — format version, project metadata, base color,
//!   template id, and the full ordered layer list
//! - `images/` — one PNG per embedded raster, named by layer id with a
//!   prefix distinguishing fill rasters from image/texture rasters
//!
//! Embedded rasters are externalized into `images/` so the manifest stays
//! small and inspectable; external URL sources pass through untouched.
//! Deserialization re-embeds every archived raster before returning the
//! in-memory project, so `deserialize(serialize(p))` is lossless for the
//! template id, base color, and the full ordered layer list.

mod manifest;

pub use manifest::{Manifest, StoredLayer, StoredSource};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use layer::Project;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_PATH: &str = "manifest.json";

/// Error type for archive operations.
#[derive(Debug)]
pub enum ArchiveError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The archive has no `manifest.json` entry.
    MissingManifest,
    /// A layer references an archive path that has no entry.
    MissingImage(String),
    /// The manifest was written by a newer format version.
    UnsupportedVersion(u32),
    /// A layer entry could not be restored.
    InvalidLayer(String),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "archive I/O error: {err}"),
            Self::Json(err) => write!(f, "manifest error: {err}"),
            Self::MissingManifest => write!(f, "archive has no manifest.json"),
            Self::MissingImage(path) => {
                write!(f, "manifest references missing archive file {path:?}")
            }
            Self::UnsupportedVersion(version) => write!(
                f,
                "archive version {version} is newer than supported version {FORMAT_VERSION}"
            ),
            Self::InvalidLayer(msg) => write!(f, "invalid layer entry: {msg}"),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Serialize a project into compressed archive bytes.
pub fn serialize(project: &Project) -> Result<Vec<u8>, ArchiveError> {
    let (manifest, images) = Manifest::from_project(project);
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    {
        let mut builder = tar::Builder::new(&mut encoder);
        append_file(&mut builder, MANIFEST_PATH, &manifest_bytes)?;
        for (path, raster) in &images {
            let png = raster
                .encode_png()
                .map_err(|err| ArchiveError::InvalidLayer(err.to_string()))?;
            append_file(&mut builder, path, &png)?;
        }
        builder.finish()?;
    }
    Ok(encoder.finish()?)
}

/// Deserialize archive bytes back into an in-memory project, re-embedding
/// every raster the manifest references. A malformed archive aborts the
/// load; nothing is partially applied.
pub fn deserialize(bytes: &[u8]) -> Result<Project, ArchiveError> {
    let files = read_entries(bytes)?;
    let manifest_bytes = files
        .get(MANIFEST_PATH)
        .ok_or(ArchiveError::MissingManifest)?;
    let manifest: Manifest = serde_json::from_slice(manifest_bytes)?;
    if manifest.version > FORMAT_VERSION {
        return Err(ArchiveError::UnsupportedVersion(manifest.version));
    }
    manifest.into_project(&files)
}

fn append_file<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    bytes: &[u8],
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, bytes)
}

fn read_entries(bytes: &[u8]) -> Result<HashMap<String, Vec<u8>>, ArchiveError> {
    let decoder = GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);
    let mut files = HashMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        files.insert(path, data);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use layer::{
        BrushLayer, CircleLayer, FillLayer, ImageLayer, ImageSource, Layer, LayerData, LineLayer,
        Raster, RectLayer, StarLayer, Stroke, TextLayer,
    };
    use stencil_core::Color;

    fn sample_project() -> Project {
        let mut project = Project::new("Camo Mug", "mug-classic", Color::rgb(1.0, 0.0, 0.0));
        project.add_layer(
            Layer::new(
                "headline",
                LayerData::Text(TextLayer {
                    content: "Hello\nworld".into(),
                    font_family: "Inter".into(),
                    font_size: 32.0,
                    fill: Color::BLACK,
                }),
            )
            .with_position(Vec2::new(120.0, 80.0))
            .with_rotation(12.5),
        );
        project.add_layer(
            Layer::new(
                "photo",
                LayerData::Image(ImageLayer {
                    source: ImageSource::Embedded(Raster::solid(8, 4, Color::rgb(0.0, 1.0, 0.0))),
                }),
            )
            .with_scale(Vec2::new(2.0, 2.0)),
        );
        project.add_layer(Layer::new(
            "remote",
            LayerData::Texture(ImageLayer {
                source: ImageSource::external("https://assets.example/denim.png"),
            }),
        ));
        project.add_layer(Layer::new(
            "wash",
            LayerData::Fill(FillLayer {
                raster: ImageSource::Embedded(Raster::solid(4, 4, Color::rgb(0.0, 0.0, 1.0))),
            }),
        ));
        project.add_layer(
            Layer::new(
                "divider",
                LayerData::Line(LineLayer {
                    points: [0.0, 0.0, 220.0, -14.0],
                    stroke: Color::BLACK,
                    stroke_width: 3.0,
                    arrow_start: false,
                    arrow_end: true,
                }),
            )
            .with_locked(true),
        );
        project.add_layer(Layer::new(
            "badge",
            LayerData::Star(StarLayer {
                points: 5,
                inner_radius: 12.0,
                outer_radius: 30.0,
                fill: Color::rgb(1.0, 1.0, 0.0),
                stroke: Some(Stroke::default()),
            }),
        ));
        project.add_layer(
            Layer::new(
                "panel",
                LayerData::Rect(RectLayer {
                    width: 200.0,
                    height: 100.0,
                    corner_radius: 8.0,
                    fill: Color::WHITE,
                    stroke: None,
                }),
            )
            .with_opacity(0.75),
        );
        project.add_layer(Layer::new(
            "dot",
            LayerData::Circle(CircleLayer {
                radius: 22.0,
                fill: Color::rgb(1.0, 0.0, 1.0),
                stroke: None,
            }),
        ));
        project.add_layer(Layer::new(
            "doodle",
            LayerData::Brush(BrushLayer {
                points: vec![Vec2::ZERO, Vec2::new(4.0, 9.0), Vec2::new(11.0, 13.0)],
                stroke_width: 5.0,
                color: Color::rgb(0.0, 1.0, 1.0),
            }),
        ));
        project
    }

    #[test]
    fn round_trip_is_lossless() {
        let project = sample_project();
        let bytes = serialize(&project).unwrap();
        let restored = deserialize(&bytes).unwrap();

        assert_eq!(restored.template_id, project.template_id);
        assert_eq!(restored.base_color, project.base_color);
        assert_eq!(restored.name, project.name);
        assert_eq!(restored.created_at, project.created_at);
        assert_eq!(restored.layers, project.layers);
    }

    #[test]
    fn reserialization_is_idempotent_modulo_modified_at() {
        let project = sample_project();
        let first = serialize(&project).unwrap();
        let restored = deserialize(&first).unwrap();
        let second = serialize(&restored).unwrap();

        let mut a: serde_json::Value =
            serde_json::from_slice(read_entries(&first).unwrap().get(MANIFEST_PATH).unwrap())
                .unwrap();
        let mut b: serde_json::Value =
            serde_json::from_slice(read_entries(&second).unwrap().get(MANIFEST_PATH).unwrap())
                .unwrap();
        a.as_object_mut().unwrap().remove("modified_at");
        b.as_object_mut().unwrap().remove("modified_at");
        assert_eq!(a, b);
    }

    #[test]
    fn embedded_rasters_are_externalized_under_images() {
        let mut project = Project::new("One", "mug-classic", Color::WHITE);
        let raster = Raster::solid(6, 3, Color::rgb(0.2, 0.4, 0.6));
        let id = project.add_layer(Layer::new(
            "photo",
            LayerData::Image(ImageLayer {
                source: ImageSource::Embedded(raster.clone()),
            }),
        ));

        let bytes = serialize(&project).unwrap();
        let files = read_entries(&bytes).unwrap();

        let manifest: serde_json::Value =
            serde_json::from_slice(files.get(MANIFEST_PATH).unwrap()).unwrap();
        let source = &manifest["layers"][0]["source"];
        assert_eq!(source["type"], "archive");
        let path = source["path"].as_str().unwrap();
        assert_eq!(path, format!("images/image_{}.png", id.to_uuid_string()));

        // The path exists in the archive and decodes back to the original
        // raster.
        let png = files.get(path).expect("archived raster should exist");
        assert_eq!(Raster::decode(png).unwrap(), raster);
    }

    #[test]
    fn fill_rasters_use_a_distinguishing_prefix() {
        let mut project = Project::new("One", "mug-classic", Color::WHITE);
        let id = project.add_layer(Layer::new(
            "wash",
            LayerData::Fill(FillLayer {
                raster: ImageSource::Embedded(Raster::solid(2, 2, Color::BLACK)),
            }),
        ));

        let bytes = serialize(&project).unwrap();
        let files = read_entries(&bytes).unwrap();
        let expected = format!("images/fill_{}.png", id.to_uuid_string());
        assert!(files.contains_key(expected.as_str()));
    }

    #[test]
    fn external_sources_pass_through_without_archive_entries() {
        let mut project = Project::new("One", "mug-classic", Color::WHITE);
        project.add_layer(Layer::new(
            "remote",
            LayerData::Image(ImageLayer {
                source: ImageSource::external("https://assets.example/cat.png"),
            }),
        ));

        let bytes = serialize(&project).unwrap();
        let files = read_entries(&bytes).unwrap();
        assert_eq!(files.len(), 1, "only the manifest should be present");

        let manifest: serde_json::Value =
            serde_json::from_slice(files.get(MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(manifest["layers"][0]["source"]["type"], "external");
        assert_eq!(
            manifest["layers"][0]["source"]["url"],
            "https://assets.example/cat.png"
        );
    }

    #[test]
    fn malformed_archives_are_rejected() {
        assert!(deserialize(b"not an archive").is_err());
    }

    #[test]
    fn newer_versions_are_rejected() {
        let manifest = serde_json::json!({
            "version": FORMAT_VERSION + 1,
            "name": "future",
            "created_at": "2026-01-01T00:00:00Z",
            "modified_at": "2026-01-01T00:00:00Z",
            "template_id": "mug-classic",
            "base_color": "#ffffff",
            "layers": []
        });
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            append_file(&mut builder, MANIFEST_PATH, &manifest_bytes).unwrap();
            builder.finish().unwrap();
        }
        let bytes = encoder.finish().unwrap();

        match deserialize(&bytes) {
            Err(ArchiveError::UnsupportedVersion(version)) => {
                assert_eq!(version, FORMAT_VERSION + 1);
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn missing_archived_image_is_reported() {
        let manifest = serde_json::json!({
            "version": FORMAT_VERSION,
            "name": "broken",
            "created_at": "2026-01-01T00:00:00Z",
            "modified_at": "2026-01-01T00:00:00Z",
            "template_id": "mug-classic",
            "base_color": "#ffffff",
            "layers": [{
                "id": "3b4bff86-51b8-4a12-a3b4-2a9d0f6c1c2e",
                "name": "photo",
                "visible": true,
                "locked": false,
                "opacity": 1.0,
                "position": [0.0, 0.0],
                "rotation": 0.0,
                "scale": [1.0, 1.0],
                "kind": "image",
                "source": {"type": "archive", "path": "images/gone.png"}
            }]
        });
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            append_file(&mut builder, MANIFEST_PATH, &manifest_bytes).unwrap();
            builder.finish().unwrap();
        }
        let bytes = encoder.finish().unwrap();

        assert!(matches!(
            deserialize(&bytes),
            Err(ArchiveError::MissingImage(_))
        ));
    }
}
