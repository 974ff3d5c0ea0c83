use anyhow::{bail, Context, Result};
use quatcube_config::{AppConfig, CubeStyle, RenderConfig};
use quatcube_imu::{ImuClient, OrientationStore};
use quatcube_renderer::camera::Camera;
use quatcube_renderer::cube;
use quatcube_renderer::limiter::FrameLimiter;
use quatcube_renderer::pipeline::{create_depth_texture, CubeGpuMesh, CubePipeline, Uniforms};
use quatcube_renderer::rotation;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Application state.
struct App {
    config: RenderConfig,
    store: OrientationStore,
    imu_client: ImuClient,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    camera: Camera,
    limiter: FrameLimiter,
    /// The render loop ended because the IMU reader stopped.
    link_lost: bool,
    /// Fatal error raised inside the event loop.
    error: Option<anyhow::Error>,
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    pipeline: CubePipeline,
    mesh: CubeGpuMesh,
    depth: wgpu::TextureView,
    frame_count: u64,
}

impl GpuState {
    fn new(window: Arc<Window>, config: &RenderConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let (device, queue, adapter) = pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .context("No suitable GPU adapter found")?;

            info!(name = %adapter.get_info().name, "Using GPU");

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("quatcube_device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::downlevel_defaults(),
                        memory_hints: Default::default(),
                    },
                    None,
                )
                .await
                .context("Failed to create device")?;

            anyhow::Ok((device, queue, adapter))
        })?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no supported formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let mesh = cube::mesh_for(config.style);
        let pipeline = CubePipeline::new(&device, format, mesh.topology);
        let mesh = CubeGpuMesh::new(&device, &mesh);
        let depth = create_depth_texture(&device, surface_config.width, surface_config.height);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            pipeline,
            mesh,
            depth,
            frame_count: 0,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth = create_depth_texture(&self.device, width, height);
    }

    /// Draw one frame. Returns whether it reached the screen.
    fn render(&mut self, uniforms: &Uniforms) -> bool {
        self.pipeline.write_uniforms(&self.queue, uniforms);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return false;
            }
            Err(e) => {
                warn!(?e, "Failed to get surface texture");
                return false;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("cube_render"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cube_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.pipeline.draw(&mut pass, &self.mesh);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.frame_count += 1;
        true
    }
}

/// Presented frames between render heartbeats.
const HEARTBEAT_FRAMES: u64 = 300;

/// Frames that never reached the screen do not advance `frame_count`, so
/// they must not repeat the previous heartbeat.
fn heartbeat_due(presented: bool, frame_count: u64) -> bool {
    presented && frame_count % HEARTBEAT_FRAMES == 0
}

impl App {
    fn new(config: RenderConfig, store: OrientationStore, imu_client: ImuClient) -> Self {
        Self {
            camera: Camera::from_config(&config),
            limiter: FrameLimiter::new(config.target_fps),
            config,
            store,
            imu_client,
            window: None,
            gpu: None,
            link_lost: false,
            error: None,
        }
    }

    fn draw_frame(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        // Freshest sample; anything published since the last frame is skipped.
        let orientation = self.store.read();
        let model = rotation::model_matrix(orientation.quaternion, self.config.rotation);
        let uniforms = Uniforms::new(
            model,
            self.camera.view_projection(),
            self.config.color,
            self.config.style == CubeStyle::Solid,
        );

        let presented = gpu.render(&uniforms);
        if heartbeat_due(presented, gpu.frame_count) {
            debug!(
                frames = gpu.frame_count,
                samples = self.store.publish_count(),
                "Render heartbeat"
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("quatcube: IMU orientation")
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.error = Some(anyhow::Error::new(e).context("Failed to create window"));
                event_loop.exit();
                return;
            }
        };

        match GpuState::new(window.clone(), &self.config) {
            Ok(gpu) => {
                self.camera
                    .set_viewport(gpu.surface_config.width, gpu.surface_config.height);
                self.gpu = Some(gpu);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
                return;
            }
        }
        self.window = Some(window);

        info!(
            style = ?self.config.style,
            rotation = ?self.config.rotation,
            fps = self.config.target_fps,
            "Renderer initialized"
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

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = &mut self.gpu {
                        gpu.resize(size.width, size.height);
                        self.camera.set_viewport(size.width, size.height);
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    event_loop.exit();
                }
            }

            WindowEvent::RedrawRequested => {
                self.draw_frame();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.imu_client.is_running() {
            error!("IMU reader stopped, closing");
            self.link_lost = true;
            event_loop.exit();
            return;
        }

        let now = Instant::now();
        if self.limiter.is_due(now) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.limiter.advance(now);
        }

        let next = self
            .limiter
            .deadline()
            .unwrap_or(now + self.limiter.period());
        event_loop.set_control_flow(ControlFlow::WaitUntil(next));
    }
}

fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quatcube=info,quatcube_imu=info,quatcube_renderer=info".into()
            }),
        )
        .init();

    info!("quatcube starting");

    let mut config = quatcube_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // First run: leave a config file to edit.
    match quatcube_config::config_path() {
        Ok(path) if !path.exists() => {
            if let Err(e) = quatcube_config::save_config(&config) {
                warn!(?e, "Failed to write default config");
            }
        }
        Ok(_) => {}
        Err(e) => warn!(?e, "No config location available"),
    }

    if let Some(port) = std::env::args().nth(1) {
        config.serial.port = port;
    }

    info!(
        port = %config.serial.port,
        baud_rate = config.serial.baud_rate,
        protocol = ?config.serial.protocol,
        "Config loaded"
    );

    let store = OrientationStore::new();
    let imu_client = ImuClient::connect(&config.serial, store.clone())
        .context("IMU serial link unavailable")?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config.render, store, imu_client);
    let run_result = event_loop.run_app(&mut app);

    // Close the transport before reporting anything.
    let App {
        imu_client,
        link_lost,
        error,
        ..
    } = app;
    let reader_result = imu_client.shutdown();

    run_result?;
    if let Some(e) = error {
        return Err(e);
    }
    match reader_result {
        Err(e) => return Err(e.context("IMU link failed")),
        Ok(()) if link_lost => bail!("IMU link closed"),
        Ok(()) => {}
    }

    info!("quatcube exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_only_after_presented_frames() {
        assert!(heartbeat_due(true, HEARTBEAT_FRAMES));
        assert!(heartbeat_due(true, HEARTBEAT_FRAMES * 2));
        assert!(!heartbeat_due(true, HEARTBEAT_FRAMES + 1));

        // Surface errors before the first frame leave the count at zero.
        assert!(!heartbeat_due(false, 0));
        assert!(!heartbeat_due(false, HEARTBEAT_FRAMES));
    }
}
