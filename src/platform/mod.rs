//! 平台层：窗口与图形上下文的创建

pub mod window;

pub use window::{create_window, GlutinSurface, PlatformWindow};
