//! OpenGL 图形后端实现
//!
//! 本模块提供了基于 OpenGL 4.5+ 直接状态访问（DSA）的图形后端实现。
//!
//! # 主要组件
//!
//! - `GlContext`：上下文创建、入口加载、设备属性查询和调试回调
//! - `GlSurface`：平台层实现的窗口表面接口
//! - `OpenGlBackend`：实现 `RenderBackend` 的资源创建与命令执行

mod backend;
mod context;

pub use backend::OpenGlBackend;
pub use context::{GlContext, GlSurface};
