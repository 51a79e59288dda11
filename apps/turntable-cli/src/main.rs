use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;
use turntable_assets::load_model;
use turntable_common::{AssetId, Transform};
use turntable_render::{BloomGraph, BloomSettings, RecordingExecutor, StageEvent};
use turntable_scene::{
    Camera, ExposurePhase, FLICKER_FRAMES, FLICKER_ODDS, FrameController, SceneGraph, SceneNode,
};

#[derive(Parser)]
#[command(name = "turntable-cli", about = "CLI tool for turntable operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Replay the flicker controller headlessly and report statistics
    Flicker {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "1500")]
        frames: u64,
        /// RNG seed for the flicker trigger
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Simulated frame rate
        #[arg(long, default_value = "60.0")]
        fps: f64,
    },
    /// Load a model from disk and print its summary as JSON
    Inspect {
        /// Model name, resolved to <assets-dir>/models/<name>.{obj,mtl}
        #[arg(short, long, default_value = "teapot")]
        name: String,
        /// Directory holding the models/ folder
        #[arg(long, default_value = "./assets")]
        assets_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("turntable-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", turntable_common::crate_info());
            println!("scene: {}", turntable_scene::crate_info());
            println!("assets: {}", turntable_assets::crate_info());
            println!("render: {}", turntable_render::crate_info());
        }
        Commands::Flicker { frames, seed, fps } => {
            println!("Headless flicker replay: seed={seed}, frames={frames}, fps={fps}");

            let mut scene = SceneGraph::new();
            scene.insert(SceneNode::ambient(Vec3::splat(0.8)));
            let model = scene.insert(SceneNode::mesh(
                AssetId(1),
                Transform {
                    position: Vec3::new(0.0, 1.0, 0.0),
                    ..Transform::default()
                },
            ));

            let mut camera = Camera::default();
            let mut controller = FrameController::new(seed);
            controller.attach_model(model);

            let graph = BloomGraph::new(BloomSettings::default());
            let mut executor = RecordingExecutor::new();

            let mut triggers = 0u64;
            let mut dim_frames = 0u64;
            let mut last_spin = 0.0f32;
            for frame in 0..frames {
                let elapsed = Duration::from_secs_f64(frame as f64 / fps);
                let update = controller.advance(&mut scene, &mut camera, elapsed);
                graph.render_frame(&mut executor, &scene, &camera, update.exposure)?;
                if update.phase == ExposurePhase::Dim {
                    dim_frames += 1;
                }
                if controller.countdown() == FLICKER_FRAMES {
                    triggers += 1;
                }
                if let Some(angle) = update.spin {
                    last_spin = angle;
                }
            }

            let expected = frames as f64 / FLICKER_ODDS as f64;
            println!("Triggers: {triggers} (expected ~{expected:.1})");
            println!(
                "Dim frames: {dim_frames}/{frames} ({:.1}%)",
                100.0 * dim_frames as f64 / frames as f64
            );
            println!("Final spin: {last_spin:.4} rad");

            let events = executor.events();
            let paired = events.len() == 2 * frames as usize
                && events.chunks(2).all(|pair| {
                    matches!(
                        pair,
                        [StageEvent::Extraction { version }, StageEvent::Composition { bloom, .. }]
                        if version == bloom
                    )
                });
            println!(
                "Stages: {} events, pairing {}",
                events.len(),
                if paired { "OK" } else { "MISMATCH" }
            );
        }
        Commands::Inspect { name, assets_dir } => {
            let model = load_model(Path::new(&assets_dir), &name)?;
            println!("{}", serde_json::to_string_pretty(&model.summary())?);
        }
    }

    Ok(())
}
