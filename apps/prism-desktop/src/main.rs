use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use prism_common::{PixelFormat, ViewportSize};
use prism_render::RenderBackend;
use prism_render_wgpu::WgpuBackend;
use prism_tools::{FrameTimer, ViewerInspector};
use prism_viewer::{Canvas, FrameClock, ModelEntry, Viewer, ViewerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "prism-desktop", about = "Prism 3D viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML viewer config
    #[arg(long)]
    config: Option<PathBuf>,

    /// glTF/GLB model to load at the origin (repeatable)
    #[arg(long = "model")]
    models: Vec<PathBuf>,

    /// Equirectangular reflection image
    #[arg(long)]
    environment: Option<PathBuf>,

    /// Edge length of each cubemap face in texels
    #[arg(long)]
    capture_resolution: Option<u32>,

    /// Cubemap channel format: standard or float
    #[arg(long)]
    pixel_format: Option<PixelFormat>,

    /// Reflection rotation speed in radians per second
    #[arg(long)]
    rotation_speed: Option<f32>,
}

impl Cli {
    /// Config file (or defaults) with command line overrides applied.
    fn viewer_config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ViewerConfig::default(),
        };
        config
            .models
            .extend(self.models.iter().map(|path| ModelEntry::at_origin(path.clone())));
        if let Some(path) = &self.environment {
            config.environment = Some(path.clone());
        }
        if let Some(resolution) = self.capture_resolution {
            config.capture.resolution = resolution;
        }
        if let Some(format) = self.pixel_format {
            config.capture.pixel_format = format;
        }
        if let Some(speed) = self.rotation_speed {
            config.capture.rotation_speed = speed;
        }
        Ok(config)
    }
}

/// The window's inner size, polled by the viewer every tick.
struct WindowCanvas<'a>(&'a Window);

impl Canvas for WindowCanvas<'_> {
    fn size(&self) -> ViewportSize {
        let size = self.0.inner_size();
        ViewportSize::new(size.width, size.height)
    }
}

/// Mouse state feeding the orbit controls.
#[derive(Default)]
struct OrbitInput {
    rotating: bool,
    panning: bool,
    cursor: Option<PhysicalPosition<f64>>,
}

struct GpuApp {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer<WgpuBackend>>,
    clock: FrameClock,
    timer: FrameTimer,
    input: OrbitInput,
    show_overlay: bool,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(config: ViewerConfig) -> Self {
        Self {
            clock: FrameClock::new(config.max_frame_delta),
            config,
            window: None,
            viewer: None,
            timer: FrameTimer::default(),
            input: OrbitInput::default(),
            show_overlay: true,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Prism Viewer")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("creating window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("creating surface")?;

        let canvas = WindowCanvas(&window).size();
        let backend = pollster::block_on(WgpuBackend::new(&instance, surface, canvas))?;
        let surface_format = backend.surface_format();

        let mut viewer = Viewer::new(backend, self.config.clone(), canvas)?;
        viewer.load_configured_assets();

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(viewer.backend().device(), surface_format, None, 1, false);

        self.window = Some(window);
        self.viewer = Some(viewer);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);
        Ok(())
    }

    fn handle_mouse(&mut self, event: &WindowEvent) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.input.rotating = pressed,
                    MouseButton::Right => self.input.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(last) = self.input.cursor {
                    let dx = (position.x - last.x) as f32;
                    let dy = (position.y - last.y) as f32;
                    if self.input.rotating {
                        viewer.controls_mut().rotate(dx, dy);
                    } else if self.input.panning {
                        viewer.controls_mut().pan(dx, dy);
                    }
                }
                self.input.cursor = Some(*position);
            }
            WindowEvent::CursorLeft { .. } => {
                self.input.cursor = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                };
                viewer.controls_mut().zoom(steps);
            }
            _ => {}
        }
    }

    fn redraw(&mut self) {
        let Self {
            window,
            viewer,
            clock,
            timer,
            show_overlay,
            egui_ctx,
            egui_winit,
            egui_renderer,
            ..
        } = self;
        let (Some(window), Some(viewer), Some(egui_winit), Some(egui_renderer)) =
            (window.as_ref(), viewer.as_mut(), egui_winit.as_mut(), egui_renderer.as_mut())
        else {
            return;
        };

        let dt = clock.delta();
        let canvas = WindowCanvas(window);
        if canvas.size().width == 0 || canvas.size().height == 0 {
            // Minimized; nothing to draw into.
            return;
        }
        timer.record_secs(dt);
        viewer.tick(dt, &canvas);

        let raw_input = egui_winit.take_egui_input(window);
        let full_output = egui_ctx.run(raw_input, |ctx| {
            if *show_overlay {
                draw_overlay(ctx, viewer, timer);
            }
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let backend = viewer.backend();
        let Some(view) = backend.frame_view() else {
            return;
        };
        let (device, queue) = (backend.device(), backend.queue());
        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let size = backend.size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        viewer.backend_mut().present();
    }
}

fn draw_overlay(ctx: &EguiContext, viewer: &mut Viewer<WgpuBackend>, timer: &FrameTimer) {
    let summary = ViewerInspector::summary(viewer);

    egui::SidePanel::left("inspector")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Prism Viewer");
            ui.separator();
            ui.label(format!(
                "Frame {}  {:.1} fps ({:.2} ms)",
                summary.frames,
                timer.fps(),
                timer.average().as_secs_f64() * 1000.0
            ));
            ui.label(format!("Canvas: {}x{}", summary.width, summary.height));
            ui.label(format!(
                "Camera: ({:.2}, {:.2}, {:.2})",
                summary.camera_position.x, summary.camera_position.y, summary.camera_position.z
            ));
            ui.label(format!(
                "Scene: {} nodes, {} meshes, {} lights",
                summary.nodes, summary.meshes, summary.lights
            ));
            if summary.pending_loads > 0 {
                ui.label(format!("Loading {} asset(s)...", summary.pending_loads));
            }

            ui.separator();
            ui.heading("Reflection");
            ui.label(format!(
                "Cubemap: {0}x{0} {1}",
                summary.capture_resolution, summary.capture_format
            ));
            ui.label(format!(
                "Angle: {:.3} rad  Captures: {}",
                summary.reflection_angle, summary.captures
            ));
            if !summary.has_reflection_image {
                ui.label("No reflection image loaded");
            }
            let mut speed = summary.reflection_speed;
            if ui
                .add(egui::Slider::new(&mut speed, 0.0..=2.0).text("rad/s"))
                .changed()
            {
                viewer.reflection_mut().set_speed(speed);
            }

            ui.separator();
            ui.heading("Assets");
            for asset in viewer.registry().iter() {
                ui.label(format!("{:?} {} [{}]", asset.kind, asset.name, asset.id));
            }

            ui.separator();
            ui.small("F1: Toggle Overlay | LMB: Orbit | RMB: Pan | Wheel: Zoom");
        });
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("startup failed: {e:#}");
            event_loop.exit();
            return;
        }
        tracing::info!("window and GPU initialized");
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(window), Some(egui_winit)) = (&self.window, &mut self.egui_winit) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key {
                KeyCode::F1 => self.show_overlay = !self.show_overlay,
                KeyCode::Escape => event_loop.exit(),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            other => self.handle_mouse(&other),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("prism-desktop starting");
    let config = cli.viewer_config()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
