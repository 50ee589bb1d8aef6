//! 窗口协作者
//!
//! 根据后端的窗口提示创建 winit 窗口：
//! - `ClientApi::OpenGl`：通过 glutin 选择像素格式、创建 GL 上下文与窗口表面
//! - `ClientApi::NoApi`：普通窗口，Direct3D 11 直接使用其 HWND

use std::ffi::{c_void, CString};
use std::num::NonZeroU32;
use std::sync::Arc;

use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{ContextApi, ContextAttributesBuilder, GlProfile, PossiblyCurrentContext, Version};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::prelude::{NotCurrentGlContext, PossiblyCurrentGlContext};
use glutin::surface::{GlSurface as _, Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use rwh_05::HasRawWindowHandle;
use tracing::{debug, warn};
use winit::dpi::LogicalSize;
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use crate::core::config::{BackendKind, Config};
use crate::core::error::{CgRenderError, GraphicsError, ResourceError, Result};
use crate::gfx::{ClientApi, GlSurface, OpenGlBackend, RenderBackend};

/// 窗口与绑定在其上的后端
pub struct PlatformWindow {
    pub event_loop: EventLoop<()>,
    pub window: Arc<Window>,
    pub backend: Box<dyn RenderBackend>,
}

/// glutin 窗口表面 + 当前上下文
pub struct GlutinSurface {
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    size: (u32, u32),
}

impl GlSurface for GlutinSurface {
    fn make_current(&self) -> Result<()> {
        self.context
            .make_current(&self.surface)
            .map_err(|e| GraphicsError::ContextCreation(e.to_string()).into())
    }

    fn get_proc_address(&self, symbol: &str) -> *const c_void {
        match CString::new(symbol) {
            Ok(symbol) => self.context.display().get_proc_address(&symbol),
            Err(_) => std::ptr::null(),
        }
    }

    fn swap_buffers(&self) -> Result<()> {
        self.surface
            .swap_buffers(&self.context)
            .map_err(|e| GraphicsError::SwapchainError(e.to_string()).into())
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}

fn window_builder(config: &Config) -> WindowBuilder {
    WindowBuilder::new()
        .with_title(format!("{} [{}]", config.window.title, config.graphics.backend.name()))
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .with_resizable(config.window.resizable)
}

/// 创建窗口，并在其上创建配置选定的后端
pub fn create_window(config: &Config) -> Result<PlatformWindow> {
    let kind = config.graphics.backend;
    if !kind.needs_window() {
        return Err(CgRenderError::Initialization(format!(
            "{} backend does not use a window",
            kind.name()
        )));
    }

    let event_loop = EventLoop::new().map_err(|e| CgRenderError::Initialization(e.to_string()))?;

    match kind.window_hints(config.graphics.debug) {
        ClientApi::OpenGl {
            major,
            minor,
            core_profile,
            debug,
        } => {
            let (window, surface) = create_gl_window(&event_loop, config, (major, minor), core_profile, debug)?;
            let backend = OpenGlBackend::new(Box::new(surface), debug)?;
            Ok(PlatformWindow {
                event_loop,
                window,
                backend: Box::new(backend),
            })
        }
        ClientApi::NoApi => {
            let window = window_builder(config)
                .build(&event_loop)
                .map_err(|e| CgRenderError::Initialization(format!("Failed to create window: {}", e)))?;
            let window = Arc::new(window);
            let backend = create_native_backend(kind, &window, config)?;
            Ok(PlatformWindow {
                event_loop,
                window,
                backend,
            })
        }
    }
}

fn create_gl_window(
    event_loop: &EventLoop<()>,
    config: &Config,
    version: (u8, u8),
    core_profile: bool,
    debug: bool,
) -> Result<(Arc<Window>, GlutinSurface)> {
    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(24);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder(config)));

    let (window, gl_config) = display_builder
        .build(event_loop, template, |configs| {
            // glutin 保证至少返回一个配置
            configs
                .reduce(|best, candidate| {
                    if candidate.num_samples() > best.num_samples() {
                        candidate
                    } else {
                        best
                    }
                })
                .expect("glutin returned no GL configs")
        })
        .map_err(|e| GraphicsError::ContextCreation(e.to_string()))?;

    let window = window.ok_or_else(|| CgRenderError::Initialization("glutin did not create a window".to_string()))?;
    let raw_window_handle = window.raw_window_handle();

    let profile = if core_profile {
        GlProfile::Core
    } else {
        GlProfile::Compatibility
    };
    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(version.0, version.1))))
        .with_profile(profile)
        .with_debug(debug)
        .build(Some(raw_window_handle));

    let gl_display = gl_config.display();
    let not_current = unsafe { gl_display.create_context(&gl_config, &context_attributes) }
        .map_err(|e| GraphicsError::ContextCreation(e.to_string()))?;

    let surface_attributes = window.build_surface_attributes(Default::default());
    let surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attributes) }
        .map_err(|e| GraphicsError::ContextCreation(e.to_string()))?;

    let context = not_current
        .make_current(&surface)
        .map_err(|e| GraphicsError::ContextCreation(e.to_string()))?;

    let interval = if config.graphics.vsync {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    if let Err(e) = surface.set_swap_interval(&context, interval) {
        warn!(error = %e, "Failed to set swap interval");
    }

    let size = window.inner_size();
    debug!(
        samples = gl_config.num_samples(),
        width = size.width,
        height = size.height,
        "GL window surface created"
    );

    Ok((
        Arc::new(window),
        GlutinSurface {
            surface,
            context,
            size: (size.width, size.height),
        },
    ))
}

#[cfg(target_os = "windows")]
fn create_native_backend(kind: BackendKind, window: &Window, config: &Config) -> Result<Box<dyn RenderBackend>> {
    use windows::Win32::Foundation::HWND;
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};

    use crate::gfx::{D3d11Backend, SwapchainConfig};

    if kind != BackendKind::Direct3D11 {
        return Err(ResourceError::UnsupportedBackend(kind).into());
    }

    let handle = window
        .window_handle()
        .map_err(|e| CgRenderError::Initialization(format!("Failed to get window handle: {}", e)))?;
    let hwnd = match handle.as_raw() {
        RawWindowHandle::Win32(h) => HWND(h.hwnd.get() as *mut c_void),
        _ => return Err(CgRenderError::Initialization("Not a Win32 window".to_string())),
    };

    let size = window.inner_size();
    let swapchain = SwapchainConfig {
        buffer_count: config.graphics.swapchain_buffers,
        vsync: config.graphics.vsync,
        ..SwapchainConfig::new(size.width, size.height)
    };

    let backend = D3d11Backend::new(hwnd, swapchain, config.graphics.debug)?;
    Ok(Box::new(backend))
}

#[cfg(not(target_os = "windows"))]
fn create_native_backend(kind: BackendKind, _window: &Window, _config: &Config) -> Result<Box<dyn RenderBackend>> {
    Err(ResourceError::UnsupportedBackend(kind).into())
}
