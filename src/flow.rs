//! Application event loop and frame driver.
//!
//! A "flow" is the scene the viewer shows. The driver owns the window, the
//! GPU context, the fly camera, the light and the animation clock, and calls
//! into the flow once per frame:
//!
//! 1. Apply keyboard input (camera, light, playback toggle, quit)
//! 2. Advance the animation clock by `dt * playback_speed` while playing
//! 3. `on_update` with this frame's [`FrameContext`]
//! 4. Shadow pass: `on_depth_render` into the shadow map
//! 5. Color pass: `on_render` into the surface
//! 6. Present
//!
//! Every two seconds the window title shows the average frame rate.

use std::{fmt::Debug, future::Future, iter, pin::Pin, sync::Arc};

use cgmath::{Deg, EuclideanSpace, Matrix4, Point3};
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    camera::{FlyCamera, PointLight, Projection},
    config::ViewerConfig,
    context::{Context, FrameContext, InitContext},
    render::{begin_color_pass, begin_shadow_pass},
};

/// A scene driven by the viewer.
///
/// # Lifecycle
///
/// 1. The [`FlowConstructor`] loads and uploads the scene's objects
/// 2. `on_key` sees every key press the driver didn't consume
/// 3. `on_update` advances scene state once per frame
/// 4. `on_depth_render` draws shadow casters from the light
/// 5. `on_render` draws everything from the camera
pub trait GraphicsFlow {
    fn on_key(&mut self, _key: KeyCode) {}

    fn on_update(&mut self, ctx: &Context, frame: &FrameContext);

    fn on_depth_render(
        &mut self,
        ctx: &Context,
        render_pass: &mut wgpu::RenderPass<'_>,
        light_view_proj: Matrix4<f32>,
    );

    fn on_render(
        &mut self,
        ctx: &Context,
        render_pass: &mut wgpu::RenderPass<'_>,
        frame: &FrameContext,
    );
}

const WINDOW_TITLE: &str = "dome-viewer";

/// Seconds of frames averaged into one frame rate report.
const FRAME_RATE_PERIOD: f32 = 2.0;

pub type FlowConstructor<F> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<F>>>>>;

/// Animation time that only advances while playing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationClock {
    pub time: f32,
    pub speed: f32,
    pub playing: bool,
}

impl AnimationClock {
    pub fn new(speed: f32) -> Self {
        Self {
            time: 0.0,
            speed,
            playing: true,
        }
    }

    pub fn advance(&mut self, dt: Duration) -> f32 {
        if self.playing {
            self.time += dt.as_secs_f32() * self.speed;
        }
        self.time
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
        log::info!("animation {}", if self.playing { "resumed" } else { "paused" });
    }
}

/// Counts frames and reports their average rate once per period.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameRate {
    frames: u32,
    elapsed: f32,
}

impl FrameRate {
    /// Count one frame that took `dt` seconds. Returns frames per second
    /// once more than `FRAME_RATE_PERIOD` seconds have passed, then starts over.
    pub fn tick(&mut self, dt: f32) -> Option<f32> {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed <= FRAME_RATE_PERIOD {
            return None;
        }
        let fps = self.frames as f32 / self.elapsed;
        *self = Self::default();
        Some(fps)
    }
}

fn frame_rate_title(fps: f32) -> String {
    format!("{} | Frames per second (FPS): {:.2}", WINDOW_TITLE, fps)
}

/// What a key press asks of the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyAction {
    Consumed,
    Exit,
    Ignored,
}

/// Camera, light and clock: everything the driver controls besides the GPU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub camera: FlyCamera,
    pub projection: Projection,
    pub light: PointLight,
    pub clock: AnimationClock,
}

impl ViewState {
    pub fn new(config: &ViewerConfig, width: u32, height: u32) -> Self {
        let camera = FlyCamera::new(
            config.eye.into(),
            config.lookat.into(),
            config.move_dist(),
            Deg(config.move_angle_deg),
        );
        let projection = Projection::new(
            width,
            height,
            Deg(config.fov_deg),
            config.znear,
            config.zfar,
        );
        let light = PointLight {
            position: config.light_position().into(),
            target: Point3::origin(),
            intensity: config.light_intensity,
            step: config.light_step,
            projection: Projection::new(
                1,
                1,
                Deg(config.shadow_fov_deg),
                config.shadow_near,
                config.shadow_far,
            ),
        };
        Self {
            camera,
            projection,
            light,
            clock: AnimationClock::new(config.playback_speed),
        }
    }

    fn handle_key(&mut self, key: KeyCode) -> KeyAction {
        match key {
            KeyCode::Escape => KeyAction::Exit,
            KeyCode::KeyP => {
                self.clock.toggle();
                KeyAction::Consumed
            }
            _ if self.camera.handle_key(key) || self.light.handle_key(key) => KeyAction::Consumed,
            _ => KeyAction::Ignored,
        }
    }

    pub fn frame_context(&self) -> FrameContext {
        FrameContext {
            view_proj: self.projection.calc_matrix() * self.camera.view_matrix(),
            light_position: self.light.position.to_vec(),
            light_intensity: self.light.intensity,
            light_view_proj: self.light.view_proj(),
            time: self.clock.time,
            camera_position: self.camera.eye,
        }
    }
}

#[derive(Debug)]
pub struct AppState<F> {
    pub(crate) ctx: Context,
    flow: F,
    view: ViewState,
    is_surface_configured: bool,
}

impl<F: GraphicsFlow> AppState<F> {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.resize(width, height);
            self.view.projection.resize(width, height);
            self.is_surface_configured = true;
        }
    }

    fn update(&mut self, dt: Duration) {
        self.view.clock.advance(dt);
        let frame = self.view.frame_context();
        self.flow.on_update(&self.ctx, &frame);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let frame = self.view.frame_context();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut shadow_pass = begin_shadow_pass(&mut encoder, &self.ctx.shadow_map);
            self.flow
                .on_depth_render(&self.ctx, &mut shadow_pass, frame.light_view_proj);
        }
        {
            let mut render_pass = begin_color_pass(
                &mut encoder,
                &view,
                &self.ctx.depth_texture,
                self.ctx.clear_colour,
            );
            self.flow.on_render(&self.ctx, &mut render_pass, &frame);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App<F: 'static> {
    async_runtime: tokio::runtime::Runtime,
    config: ViewerConfig,
    state: Option<AppState<F>>,
    // taken once the window exists
    constructor: Option<FlowConstructor<F>>,
    last_time: Instant,
    frame_rate: FrameRate,
}

impl<F: GraphicsFlow + 'static> App<F> {
    fn new(config: ViewerConfig, constructor: FlowConstructor<F>) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            state: None,
            constructor: Some(constructor),
            last_time: Instant::now(),
            frame_rate: FrameRate::default(),
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let Some(constructor) = self.constructor.take() else {
            return Ok(());
        };
        let window_attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let config = self.config.clone();
        let (ctx, flow) = self.async_runtime.block_on(async move {
            let ctx = Context::new(window, &config).await?;
            let flow = constructor(ctx.init_context(&config)).await?;
            anyhow::Ok((ctx, flow))
        })?;

        let size = ctx.window.inner_size();
        let view = ViewState::new(&self.config, size.width.max(1), size.height.max(1));
        let mut state = AppState {
            ctx,
            flow,
            view,
            is_surface_configured: false,
        };
        state.resize(size.width, size.height);
        state.ctx.window.request_redraw();
        self.state = Some(state);
        self.last_time = Instant::now();
        Ok(())
    }
}

impl<F: GraphicsFlow + 'static> ApplicationHandler for App<F> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.init(event_loop) {
            log::error!("Viewer initialization failed: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match state.view.handle_key(code) {
                KeyAction::Exit => event_loop.exit(),
                KeyAction::Consumed => (),
                KeyAction::Ignored => state.flow.on_key(code),
            },
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                if let Some(fps) = self.frame_rate.tick(dt.as_secs_f32()) {
                    state.ctx.window.set_title(&frame_rate_title(fps));
                }
                state.update(dt);

                match state.render() {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

impl<F> Debug for App<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("initialized", &self.state.is_some())
            .finish()
    }
}

/// Open the viewer window and run `constructor`'s scene until it closes.
pub fn run<F: GraphicsFlow + 'static>(
    config: ViewerConfig,
    constructor: FlowConstructor<F>,
) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, constructor)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
