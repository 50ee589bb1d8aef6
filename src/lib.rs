//! cg_render - 跨后端渲染核心
//!
//! 应用程序通过统一的命令队列与资源句柄描述渲染工作，
//! 引擎在构造时选定一个图形后端（Direct3D 11 / OpenGL / 无头 / 空），
//! 之后把命令逐条翻译为该后端的调用。
//!
//! # 模块结构
//!
//! - `core`: 配置、错误处理、日志、文件读取
//! - `renderer`: 渲染器门面、命令、资源池、顶点布局、命令执行
//! - `gfx`: 图形后端抽象层与各后端实现
//! - `platform`: 窗口与图形上下文创建（winit + glutin）
//! - `engine`: 引导流程与主循环
//!
//! # 使用示例
//!
//! ```
//! use cg_render::core::config::{BackendKind, Config};
//! use cg_render::core::Logger;
//! use cg_render::engine::Engine;
//! use cg_render::renderer::command::{self, color, ClearFlags};
//!
//! let mut config = Config::default();
//! config.graphics.backend = BackendKind::Headless;
//!
//! let mut engine = Engine::with_logger(&config, Logger::disabled()).unwrap();
//! engine
//!     .renderer_mut()
//!     .add_commands(&[command::set_view_clear(0, ClearFlags::COLOR, color::CORNFLOWER_BLUE)])
//!     .unwrap();
//! engine.run(|_| Ok(())).unwrap();
//! ```

pub mod core;
pub mod engine;
pub mod gfx;
pub mod platform;
pub mod renderer;
