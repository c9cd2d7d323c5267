use std::sync::Arc;

use anyhow::Context as _;
use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector3};
use winit::window::Window;

use crate::{
    config::ViewerConfig,
    data_structures::texture,
    pipelines::{ShaderProgram, shadow::mk_shadow_program, skinned::mk_skinned_program},
};

/// Bind group index every scene object uses for its own group.
pub const OBJECT_BINDING_SLOT: u32 = 0;

/// What the frame driver hands to every object for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    /// Camera projection * view.
    pub view_proj: Matrix4<f32>,
    pub light_position: Vector3<f32>,
    pub light_intensity: f32,
    /// Light projection * view, also used for the shadow pass.
    pub light_view_proj: Matrix4<f32>,
    /// Animation time in seconds.
    pub time: f32,
    pub camera_position: Point3<f32>,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            view_proj: Matrix4::identity(),
            light_position: Vector3::new(0.0, 0.0, 0.0),
            light_intensity: 0.0,
            light_view_proj: Matrix4::identity(),
            time: 0.0,
            camera_position: Point3::origin(),
        }
    }
}

/// What a scene gets to load and upload its objects. Device and queue are
/// reference counted, so this is a cheap copy of the [`Context`] handles.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub color_program: Arc<ShaderProgram>,
    pub depth_program: Arc<ShaderProgram>,
    /// Surface format, for pipelines a scene builds itself.
    pub color_format: wgpu::TextureFormat,
    pub config: ViewerConfig,
}

/// GPU device, surface and the shared render targets and programs.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub shadow_map: texture::Texture,
    pub color_program: Arc<ShaderProgram>,
    pub depth_program: Arc<ShaderProgram>,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Cannot create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No graphics adapter is compatible with the window surface")?;
        log::info!("Device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Cannot open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shaders assume an sRGB surface; anything else renders too dark.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );
        let shadow_map = texture::Texture::create_shadow_map(&device, viewer.shadow_resolution);
        let color_program = Arc::new(mk_skinned_program(
            &device,
            config.format,
            OBJECT_BINDING_SLOT,
        ));
        let depth_program = Arc::new(mk_shadow_program(&device, OBJECT_BINDING_SLOT));

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            shadow_map,
            color_program,
            depth_program,
            clear_colour: wgpu::Color::BLACK,
        })
    }

    pub fn init_context(&self, config: &ViewerConfig) -> InitContext {
        InitContext {
            device: self.device.clone(),
            queue: self.queue.clone(),
            color_program: self.color_program.clone(),
            depth_program: self.depth_program.clone(),
            color_format: self.config.format,
            config: config.clone(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = texture::Texture::create_depth_texture(
                &self.device,
                [width, height],
                "depth_texture",
            );
        }
    }
}
