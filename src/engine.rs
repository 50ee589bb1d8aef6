//! 引擎引导
//!
//! 按固定顺序组装运行时：
//!
//! 1. 根据后端类型得到窗口提示
//! 2. 创建窗口（离屏后端跳过）
//! 3. 创建设备与上下文
//! 4. 构造 `Renderer`
//!
//! `Engine::run` 驱动 winit 事件循环，每次重绘依次调用帧回调、
//! `execute_commands` 和 `present`。

use std::sync::Arc;

use tracing::{debug, error, info};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::{CgRenderError, Result};
use crate::core::log::Logger;
use crate::gfx;
use crate::platform;
use crate::renderer::Renderer;
use crate::{engine_error, engine_info};

/// 引擎：渲染器 + 可选的窗口与事件循环
pub struct Engine {
    renderer: Renderer,
    window: Option<(EventLoop<()>, Arc<Window>)>,
}

impl Engine {
    /// 使用配置中的日志设置创建引擎
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_logger(config, Logger::from_config(&config.logging))
    }

    /// 使用给定的日志对象创建引擎
    pub fn with_logger(config: &Config, logger: Logger) -> Result<Self> {
        let _guard = logger.enter();
        let kind = config.graphics.backend;

        info!(
            backend = kind.name(),
            width = config.window.width,
            height = config.window.height,
            debug = config.graphics.debug,
            "Initializing engine"
        );

        let (backend, window) = if kind.needs_window() {
            let platform::PlatformWindow {
                event_loop,
                window,
                backend,
            } = platform::create_window(config)?;
            (backend, Some((event_loop, window)))
        } else {
            (gfx::create_offscreen_backend(kind)?, None)
        };

        let renderer = Renderer::new(backend, &config.limits, logger.clone());
        engine_info!(
            backend = kind.name(),
            device = %renderer.device_properties(),
            "Engine initialized"
        );

        Ok(Self { renderer, window })
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// 是否带窗口
    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// 执行一帧：帧回调、命令执行、呈现
    fn frame<F>(renderer: &mut Renderer, frame: &mut F) -> Result<()>
    where
        F: FnMut(&mut Renderer) -> Result<()>,
    {
        frame(renderer)?;
        let report = renderer.execute_commands();
        if report.skipped > 0 {
            debug!(skipped = report.skipped, executed = report.executed, "Frame executed with skipped commands");
        }
        renderer.present()
    }

    /// 运行主循环
    ///
    /// 离屏后端只执行一帧；窗口后端运行到窗口关闭或帧回调返回错误。
    pub fn run<F>(self, mut frame: F) -> Result<()>
    where
        F: FnMut(&mut Renderer) -> Result<()>,
    {
        let Self { mut renderer, window } = self;

        let Some((event_loop, window)) = window else {
            let result = Self::frame(&mut renderer, &mut frame);
            renderer.destroy();
            return result;
        };

        info!("Entering main loop...");
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut failure: Option<CgRenderError> = None;
        let failure_slot = &mut failure;

        event_loop
            .run(move |event, elwt| match event {
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    info!("Close requested, shutting down...");
                    elwt.exit();
                }
                Event::WindowEvent {
                    event: WindowEvent::Resized(size),
                    ..
                } => {
                    debug!(width = size.width, height = size.height, "Window resized");
                }
                Event::WindowEvent {
                    event: WindowEvent::RedrawRequested,
                    ..
                } => {
                    if let Err(e) = Self::frame(&mut renderer, &mut frame) {
                        engine_error!(error = %e, "Frame failed");
                        *failure_slot = Some(e);
                        elwt.exit();
                    }
                }
                Event::AboutToWait => window.request_redraw(),
                Event::LoopExiting => renderer.destroy(),
                _ => (),
            })
            .map_err(|e| {
                error!("Event loop failed: {}", e);
                CgRenderError::Runtime(e.to_string())
            })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
