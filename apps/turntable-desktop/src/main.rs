use anyhow::Result;
use clap::Parser;
use glam::Vec3;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use turntable_assets::{PendingModel, spawn_load};
use turntable_render::{BloomGraph, BloomSettings};
use turntable_render_wgpu::WgpuExecutor;
use turntable_scene::{Camera, FrameController, SceneGraph, SceneNode};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "turntable-desktop", about = "Turntable model viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Model to load: resolves models/<name>.obj and models/<name>.mtl
    #[arg(long, default_value = "teapot")]
    model_name: String,

    /// Asset directory root
    #[arg(long, default_value = "./assets")]
    assets_dir: String,

    /// Flicker seed; taken from the clock when omitted
    #[arg(long)]
    seed: Option<u64>,
}

/// Application state independent of the window and GPU.
struct AppState {
    scene: SceneGraph,
    camera: Camera,
    controller: FrameController,
    graph: BloomGraph,
    pending: Option<PendingModel>,
    started: Instant,
}

impl AppState {
    fn new(model_name: String, assets_dir: String, seed: u64) -> Self {
        let mut scene = SceneGraph::new();
        scene.insert(SceneNode::ambient(Vec3::splat(0.8)));

        tracing::info!(model = %model_name, dir = %assets_dir, seed, "starting background load");
        let pending = spawn_load(PathBuf::from(assets_dir), model_name);

        Self {
            scene,
            camera: Camera::default(),
            controller: FrameController::new(seed),
            graph: BloomGraph::new(BloomSettings::default()),
            pending: Some(pending),
            started: Instant::now(),
        }
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    config: Option<wgpu::SurfaceConfiguration>,
    executor: Option<WgpuExecutor>,
}

impl GpuApp {
    fn new(model_name: String, assets_dir: String, seed: u64) -> Self {
        Self {
            state: AppState::new(model_name, assets_dir, seed),
            window: None,
            surface: None,
            config: None,
            executor: None,
        }
    }

    fn redraw(&mut self) {
        let (Some(surface), Some(executor)) = (&self.surface, &mut self.executor) else {
            return;
        };

        // The load result arrives at most once; until then keep polling.
        if let Some(mut pending) = self.state.pending.take() {
            match pending.poll() {
                Some(Ok(model)) => {
                    let asset = executor.upload_model(&model);
                    let node = SceneNode::mesh(asset, model.display_transform());
                    let id = self.state.scene.insert(node);
                    self.state.controller.attach_model(id);
                    tracing::info!(
                        name = %model.name,
                        triangles = model.mesh.triangle_count(),
                        "model attached"
                    );
                }
                Some(Err(e)) => tracing::error!("model load failed: {e}"),
                None => self.state.pending = Some(pending),
            }
        }

        let update = self.state.controller.advance(
            &mut self.state.scene,
            &mut self.state.camera,
            self.state.started.elapsed(),
        );

        let frame = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(config) = &self.config {
                    surface.configure(executor.device(), config);
                }
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        executor.set_output(view);
        if let Err(e) = self.state.graph.render_frame(
            executor,
            &self.state.scene,
            &self.state.camera,
            update.exposure,
        ) {
            tracing::error!("render failed: {e}");
            return;
        }
        frame.present();

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Turntable")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("turntable_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.state.camera.set_viewport(config.width, config.height);

        let executor = WgpuExecutor::new(
            device,
            queue,
            surface_format,
            config.width,
            config.height,
            self.state.graph.settings(),
        );

        self.window = Some(window);
        self.surface = Some(surface);
        self.config = Some(config);
        self.executor = Some(executor);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(config), Some(executor)) =
                    (&self.surface, &mut self.config, &mut self.executor)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(executor.device(), config);
                    self.state.camera.set_viewport(config.width, config.height);
                    executor.resize(config.width, config.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Millisecond clock seed for runs without an explicit one.
fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(42, |d| d.as_millis() as u64)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("turntable-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let seed = cli.seed.unwrap_or_else(clock_seed);
    let mut app = GpuApp::new(cli.model_name, cli.assets_dir, seed);
    event_loop.run_app(&mut app)?;

    Ok(())
}
