//! Lumen demo - a textured, lit cube spinning in a resizable window
//!
//! The shaders are loaded as SPIR-V from `--shader-dir`. Compile them once with:
//!
//! ```text
//! glslc lumen_demo/shaders/textured.vert -o lumen_demo/shaders/textured.vert.spv
//! glslc lumen_demo/shaders/textured.frag -o lumen_demo/shaders/textured.frag.spv
//! ```

use clap::{Parser, ValueEnum};
use lumen_engine::glam::{Mat4, Vec3};
use lumen_engine::lumen::device::{Extent2D, GraphicsDevice, PresentMode, ShaderStage};
use lumen_engine::lumen::log::FacadeLogger;
use lumen_engine::lumen::resource::{
    ImageResource, MaterialId, MaterialResource, MeshData, RenderObject, RenderObjectKey, ShaderResource,
    TextureRole,
};
use lumen_engine::lumen::{Application, Config, DebugSeverity, Engine, Error, Result};
use lumen_engine_renderer_vulkan::{print_validation_stats_report, VulkanGraphicsDevice};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const CUBE_MATERIAL: MaterialId = MaterialId(1);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

impl From<CliDebugSeverity> for DebugSeverity {
    fn from(severity: CliDebugSeverity) -> Self {
        match severity {
            CliDebugSeverity::ErrorsOnly => DebugSeverity::ErrorsOnly,
            CliDebugSeverity::ErrorsAndWarnings => DebugSeverity::ErrorsAndWarnings,
            CliDebugSeverity::All => DebugSeverity::All,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

impl From<CliPresentMode> for PresentMode {
    fn from(mode: CliPresentMode) -> Self {
        match mode {
            CliPresentMode::Immediate => PresentMode::Immediate,
            CliPresentMode::Mailbox => PresentMode::Mailbox,
            CliPresentMode::Fifo => PresentMode::Fifo,
            CliPresentMode::FifoRelaxed => PresentMode::FifoRelaxed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lumen_demo", about = "Lumen renderer demo: a textured spinning cube", long_about = None)]
struct Args {
    /// Enable Vulkan validation layers
    #[arg(long)]
    validation: bool,

    /// Validation messages forwarded to the log
    #[arg(long, value_enum, default_value = "errors-and-warnings")]
    debug_severity: CliDebugSeverity,

    /// Number of frames in flight
    #[arg(long, default_value_t = 2)]
    frames_in_flight: usize,

    /// Frame rate cap
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Render a single frame, then exit
    #[arg(long)]
    single_frame: bool,

    /// Preferred present mode (falls back to MAILBOX, then FIFO)
    #[arg(long, value_enum)]
    present_mode: Option<CliPresentMode>,

    /// Directory holding textured.vert.spv and textured.frag.spv
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"))]
    shader_dir: PathBuf,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 720)]
    height: u32,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            app_name: "Lumen Demo".to_string(),
            enable_validation: self.validation,
            debug_severity: self.debug_severity.into(),
            concurrent_frames: self.frames_in_flight,
            single_frame: self.single_frame,
            target_fps: self.fps,
            present_mode_preference: self.present_mode.map(PresentMode::from),
            clear_color: [0.02, 0.02, 0.05, 1.0],
        }
    }
}

/// Camera looking at the origin, with the Y flip Vulkan clip space needs
fn view_projection(extent: Extent2D) -> Mat4 {
    let aspect = if extent.is_zero() { 1.0 } else { extent.width as f32 / extent.height as f32 };
    let mut projection = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 100.0);
    projection.y_axis.y *= -1.0;
    let view = Mat4::look_at_rh(Vec3::new(0.0, 1.5, 4.0), Vec3::ZERO, Vec3::Y);
    projection * view
}

fn cube_transform(seconds: f32) -> Mat4 {
    Mat4::from_rotation_y(seconds * 0.8) * Mat4::from_rotation_x(seconds * 0.3)
}

fn extent_of(size: PhysicalSize<u32>) -> Extent2D {
    Extent2D::new(size.width, size.height)
}

/// Window plus the application rendering into it
///
/// `application` is declared first so it is dropped (and the device with it)
/// before the window whose surface it renders to.
struct Demo {
    application: Option<Application>,
    cube: Option<RenderObjectKey>,
    window: Option<Arc<Window>>,
    args: Args,
    started: Instant,
    last_title_update: Instant,
    error: Option<Error>,
}

impl Demo {
    fn new(args: Args) -> Self {
        Self {
            application: None,
            cube: None,
            window: None,
            args,
            started: Instant::now(),
            last_title_update: Instant::now(),
            error: None,
        }
    }

    fn create_scene(&mut self, window: &Window) -> Result<()> {
        let config = self.args.config();
        let extent = extent_of(window.inner_size());
        let device: Arc<dyn GraphicsDevice> = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
        let mut application = Application::new(device, config, extent)?;

        let mut material = MaterialResource::new("checkered");
        material.vertex_shader = Some(Arc::new(ShaderResource::load(
            self.args.shader_dir.join("textured.vert.spv"),
            ShaderStage::Vertex,
        )?));
        material.fragment_shader = Some(Arc::new(ShaderResource::load(
            self.args.shader_dir.join("textured.frag.spv"),
            ShaderStage::Fragment,
        )?));
        material.textures.insert(
            TextureRole::Diffuse,
            Arc::new(ImageResource::checkerboard("checker", 256, 32, [230, 230, 230, 255], [40, 90, 200, 255])?),
        );

        let material_id = application.add_material_from_resource(CUBE_MATERIAL, &material)?;
        let mesh = application.add_mesh(&MeshData::cube())?;
        let cube = application.add_render_object(RenderObject::new(material_id, mesh, Mat4::IDENTITY))?;
        application.set_view_projection(view_projection(extent));

        log::info!("Scene ready: 1 material, 1 mesh, 1 render object");
        self.cube = Some(cube);
        self.application = Some(application);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        log::error!("Fatal: {}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(application) = self.application.as_mut() else {
            return;
        };

        let seconds = self.started.elapsed().as_secs_f32();
        if let Some(object) = self.cube.and_then(|cube| application.render_object_mut(cube)) {
            object.transform = cube_transform(seconds);
        }

        if let Err(error) = application.run_frame() {
            self.fail(event_loop, error);
            return;
        }

        if let Some(window) = &self.window {
            if self.last_title_update.elapsed() >= Duration::from_secs(1) {
                window.set_title(&format!("Lumen Demo | {}", application.stats()));
                self.last_title_update = Instant::now();
            }
        }

        if application.is_finished() {
            log::info!("Run finished after {} frame(s)", application.stats().frame_count());
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for Demo {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Lumen Demo")
            .with_inner_size(PhysicalSize::new(self.args.width, self.args.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, Error::InitializationFailed(format!("Failed to create window: {}", e)));
                return;
            }
        };

        if let Err(error) = self.create_scene(&window) {
            self.fail(event_loop, error);
            return;
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let extent = extent_of(size);
                if let Some(application) = self.application.as_mut() {
                    application.notify_resized(extent);
                    application.set_view_projection(view_projection(extent));
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Engine::set_logger(FacadeLogger);

    let args = Args::parse();
    let validation = args.validation;
    log::info!("Starting Lumen demo ({} frames in flight, {} fps cap)", args.frames_in_flight, args.fps);

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut demo = Demo::new(args);
    if let Err(e) = event_loop.run_app(&mut demo) {
        log::error!("Event loop error: {}", e);
        std::process::exit(1);
    }

    let error = demo.error.take();
    drop(demo);
    if validation {
        print_validation_stats_report();
    }
    if error.is_some() {
        std::process::exit(1);
    }
}
