//! Stencil CLI - inspect and render stencil project archives.

mod logger;

use anyhow::{Context, Result};
use canvas::Editor;
use clap::{Parser, Subcommand};
use compositor::FontStore;
use layer::{DirTemplateSource, Template, TemplateSource, TEMPLATE_SIZE};
use logger::StencilLogger;
use std::path::{Path, PathBuf};

/// Stencil CLI - work with masked design project archives
#[derive(Parser)]
#[command(name = "stencil")]
#[command(about = "Inspect and render stencil project archives")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a project archive
    Inspect {
        /// Path to the .tar.gz project archive
        archive: PathBuf,
    },

    /// Composite a project archive into a flattened PNG
    Render {
        /// Path to the .tar.gz project archive
        archive: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Directory of template folders ({dir}/{id}/mask.png); without
        /// it the project renders on an opaque square canvas
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Directory of .ttf/.otf fonts for text layers
        #[arg(long)]
        fonts: Option<PathBuf>,
    },

    /// Write a downscaled preview of a project archive
    Thumbnail {
        /// Path to the .tar.gz project archive
        archive: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Thumbnail edge length in pixels
        #[arg(long, default_value_t = 256)]
        size: u32,

        /// Directory of template folders ({dir}/{id}/mask.png)
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Directory of .ttf/.otf fonts for text layers
        #[arg(long)]
        fonts: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    StencilLogger::init(level)?;

    match cli.command {
        Commands::Inspect { archive } => inspect(&archive),
        Commands::Render {
            archive,
            output,
            templates,
            fonts,
        } => {
            let png = render_archive(&archive, templates.as_deref(), fonts.as_deref())?;
            std::fs::write(&output, png)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("wrote {}", output.display());
            Ok(())
        }
        Commands::Thumbnail {
            archive,
            output,
            size,
            templates,
            fonts,
        } => {
            let png = render_archive(&archive, templates.as_deref(), fonts.as_deref())?;
            let thumb = export::thumbnail(&png, size)?;
            std::fs::write(&output, thumb)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("wrote {}", output.display());
            Ok(())
        }
    }
}

fn load_project(archive: &Path) -> Result<layer::Project> {
    let bytes = std::fs::read(archive)
        .with_context(|| format!("failed to read {}", archive.display()))?;
    let project = interchange::deserialize(&bytes)
        .with_context(|| format!("failed to load project archive {}", archive.display()))?;
    Ok(project)
}

fn inspect(archive: &Path) -> Result<()> {
    let project = load_project(archive)?;

    println!("project:  {}", project.name);
    println!("template: {}", project.template_id);
    println!("base:     {}", project.base_color.to_hex());
    println!("created:  {}", project.created_at);
    println!("layers:   {}", project.layers.len());
    for (index, layer) in project.layers.iter().enumerate() {
        let mut flags = String::new();
        if !layer.visible {
            flags.push_str(" hidden");
        }
        if layer.locked {
            flags.push_str(" locked");
        }
        if layer.opacity < 1.0 {
            flags.push_str(&format!(" opacity={:.2}", layer.opacity));
        }
        println!(
            "  {index:3}  {:<8} {:<24} {}{}",
            layer.kind().to_string(),
            layer.name,
            layer.id,
            flags
        );
    }
    Ok(())
}

fn render_archive(
    archive: &Path,
    templates: Option<&Path>,
    fonts: Option<&Path>,
) -> Result<Vec<u8>> {
    let project = load_project(archive)?;
    let template = load_template(templates, &project.template_id)?;

    let mut font_store = FontStore::new();
    if let Some(dir) = fonts {
        let loaded = font_store.load_dir(dir)?;
        log::debug!("loaded {loaded} fonts from {}", dir.display());
    }

    let mut editor = Editor::new(project, template);
    let capture = export::snapshot(&mut editor, &font_store)?;
    Ok(capture.into_png())
}

fn load_template(templates: Option<&Path>, id: &str) -> Result<Template> {
    match templates {
        Some(dir) => DirTemplateSource::new(dir).load(id),
        None => {
            log::info!("no template directory given, rendering {id} on an opaque canvas");
            Ok(Template::opaque(id, TEMPLATE_SIZE))
        }
    }
}
