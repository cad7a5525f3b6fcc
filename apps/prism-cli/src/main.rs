use anyhow::Context;
use clap::{Parser, Subcommand};
use prism_assets::{AssetSummary, decode_environment, decode_model};
use prism_common::{PixelFormat, ViewportSize};
use prism_render::{DeviceLimits, RenderBackend, SoftwareBackend};
use prism_tools::ViewerInspector;
use prism_viewer::{ModelEntry, Viewer, ViewerConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prism-cli", about = "CLI tool for prism viewer operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Decode a model or environment image and summarize it
    Inspect {
        path: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the viewer headless on the software backend
    Simulate(SimulateArgs),
}

#[derive(clap::Args)]
struct SimulateArgs {
    /// Number of ticks to run
    #[arg(short, long, default_value = "10")]
    ticks: u32,
    /// Seconds per tick
    #[arg(long, default_value = "0.016")]
    dt: f32,
    /// Cubemap face resolution
    #[arg(long, default_value = "256")]
    resolution: u32,
    /// Cubemap channel format: standard or float
    #[arg(long, default_value = "float")]
    pixel_format: PixelFormat,
    /// Reflection rotation speed in radians per second
    #[arg(long)]
    speed: Option<f32>,
    /// Equirectangular reflection image
    #[arg(long)]
    environment: Option<PathBuf>,
    /// glTF/GLB model to place at the origin (repeatable)
    #[arg(long = "model")]
    models: Vec<PathBuf>,
    #[arg(long, default_value = "320")]
    width: u32,
    #[arg(long, default_value = "240")]
    height: u32,
    /// Write the last frame as a PNG
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SimulateArgs {
    fn viewer_config(&self) -> ViewerConfig {
        let mut config = ViewerConfig::default();
        config.capture.resolution = self.resolution;
        config.capture.pixel_format = self.pixel_format;
        if let Some(speed) = self.speed {
            config.capture.rotation_speed = speed;
        }
        config.environment = self.environment.clone();
        config.models = self
            .models
            .iter()
            .map(|path| ModelEntry::at_origin(path.clone()))
            .collect();
        config
    }
}

fn is_model(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gltf") || ext.eq_ignore_ascii_case("glb"))
}

fn inspect(path: &Path) -> anyhow::Result<AssetSummary> {
    let summary = if is_model(path) {
        AssetSummary::of_model(&decode_model(path)?)
    } else {
        AssetSummary::of_environment(&decode_environment(path)?)
    };
    Ok(summary)
}

fn simulate(args: &SimulateArgs) -> anyhow::Result<Viewer<SoftwareBackend>> {
    let size = ViewportSize::new(args.width, args.height);
    let backend = SoftwareBackend::new(DeviceLimits::default());
    let mut viewer = Viewer::new(backend, args.viewer_config(), size)?;
    viewer.load_configured_assets();
    viewer.finish_loads();

    for _ in 0..args.ticks {
        viewer.tick(args.dt, &size);
    }

    if let Some(output) = &args.output {
        let pixels = viewer.backend().framebuffer_srgb8();
        let out = viewer.backend().size();
        let image = image::RgbaImage::from_raw(out.width, out.height, pixels)
            .context("framebuffer does not match its size")?;
        image
            .save(output)
            .with_context(|| format!("writing {}", output.display()))?;
        tracing::info!(path = %output.display(), "wrote frame");
    }
    Ok(viewer)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("prism-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", prism_common::crate_info());
            println!("scene: {}", prism_scene::crate_info());
            println!("render: {}", prism_render::crate_info());
            println!("assets: {}", prism_assets::crate_info());
            println!("viewer: {}", prism_viewer::crate_info());
            println!("tools: {}", prism_tools::crate_info());
        }
        Commands::Inspect { path, json } => {
            let summary = inspect(&path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{:?} {} [{}]", summary.kind, summary.name, summary.id);
                if summary.primitives > 0 {
                    println!(
                        "  primitives={} triangles={} textures={}",
                        summary.primitives, summary.triangles, summary.textures
                    );
                } else {
                    println!("  {}x{}", summary.width, summary.height);
                }
            }
        }
        Commands::Simulate(args) => {
            let viewer = simulate(&args)?;
            let summary = ViewerInspector::summary(&viewer);
            let stats = viewer.backend().stats();
            println!("{summary}");
            println!(
                "Backend: renders={} captures={} resizes={} meshes={} textures={}",
                stats.renders, stats.captures, stats.resizes, stats.meshes, stats.textures
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> SimulateArgs {
        let mut argv = vec!["prism-cli", "simulate"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Simulate(args) => args,
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn simulate_defaults() {
        let args = args(&[]);
        assert_eq!(args.ticks, 10);
        assert_eq!(args.resolution, 256);
        assert_eq!(args.pixel_format, PixelFormat::Float);
        let config = args.viewer_config();
        assert_eq!(config.capture.rotation_speed, 0.1);
        assert!(config.environment.is_none());
    }

    #[test]
    fn model_extensions() {
        assert!(is_model(Path::new("a/helmet.GLB")));
        assert!(is_model(Path::new("scene.gltf")));
        assert!(!is_model(Path::new("sky.hdr")));
        assert!(!is_model(Path::new("noext")));
    }

    #[test]
    fn simulate_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let sky = dir.path().join("sky.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([0, 255, 0, 255]))
            .save(&sky)
            .unwrap();
        let out = dir.path().join("frame.png");
        let args = args(&[
            "--ticks",
            "2",
            "--resolution",
            "4",
            "--pixel-format",
            "standard",
            "--width",
            "8",
            "--height",
            "6",
            "--environment",
            sky.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ]);

        let viewer = simulate(&args).unwrap();
        assert_eq!(viewer.frame_count(), 2);
        assert!(viewer.reflection().image().is_some());

        let frame = image::open(&out).unwrap().to_rgba8();
        assert_eq!(frame.dimensions(), (8, 6));
        let centre = frame.get_pixel(4, 3);
        assert!(centre[1] > 200, "background shows the green environment: {centre:?}");
        assert!(centre[0] < 20 && centre[2] < 20);
    }

    #[test]
    fn infinite_dt_leaves_angle_unchanged() {
        let args = args(&["--ticks", "3", "--dt", "inf", "--resolution", "4"]);
        let viewer = simulate(&args).unwrap();
        assert_eq!(viewer.frame_count(), 3);
        assert_eq!(viewer.reflection().angle(), 0.0);
    }

    #[test]
    fn inspect_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();
        let summary = inspect(&path).unwrap();
        assert_eq!((summary.width, summary.height), (8, 4));
        assert_eq!(summary.name, "sky.png");
        assert!(inspect(&dir.path().join("missing.glb")).is_err());
    }
}
