//! 图形后端模块
//!
//! 本模块封装了不同图形 API 的底层实现，包括：
//! - Direct3D 11：Windows 平台，交换链 + 立即上下文
//! - OpenGL 4.5：直接状态访问（DSA），通过 glutin 创建上下文
//! - Headless：不访问 GPU，记录后端调用，用于测试与离屏运行
//! - None：占位后端，资源创建全部失败
//!
//! 所有后端都实现了统一的 `RenderBackend` trait，
//! 渲染器只在构造时选择一次后端，之后所有操作都通过 trait 分发。

pub mod backend;
#[cfg(target_os = "windows")]
pub mod d3d11;
pub mod headless;
pub mod none;
pub mod opengl;

pub use backend::{
    foreign_handle, DeviceProperties, NativeHandle, ObjectKind, PresentFn, RenderBackend, SwapchainConfig,
};
#[cfg(target_os = "windows")]
pub use d3d11::D3d11Backend;
pub use headless::HeadlessBackend;
pub use none::NullBackend;
pub use opengl::{GlSurface, OpenGlBackend};

use crate::core::config::BackendKind;
use crate::core::error::{CgRenderError, ResourceError, Result};

/// 创建窗口前需要告知窗口系统的客户端 API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientApi {
    /// 窗口不附带 GL 上下文（Direct3D 或离屏后端）
    NoApi,
    /// 需要一个 OpenGL 上下文
    OpenGl {
        major: u8,
        minor: u8,
        core_profile: bool,
        debug: bool,
    },
}

impl BackendKind {
    /// 该后端创建窗口时需要的客户端 API
    ///
    /// # 示例
    ///
    /// ```
    /// use cg_render::core::config::BackendKind;
    /// use cg_render::gfx::ClientApi;
    ///
    /// assert_eq!(BackendKind::Direct3D11.window_hints(false), ClientApi::NoApi);
    /// assert!(matches!(BackendKind::OpenGl.window_hints(true), ClientApi::OpenGl { major: 4, .. }));
    /// ```
    pub fn window_hints(&self, debug: bool) -> ClientApi {
        match self {
            BackendKind::OpenGl => ClientApi::OpenGl {
                major: 4,
                minor: 6,
                core_profile: true,
                debug,
            },
            _ => ClientApi::NoApi,
        }
    }
}

/// 创建不需要窗口的后端
///
/// `Direct3D11` 与 `OpenGl` 需要窗口，应通过平台层创建；
/// `Direct3D12` 与 `Vulkan` 尚未实现。
pub fn create_offscreen_backend(kind: BackendKind) -> Result<Box<dyn RenderBackend>> {
    match kind {
        BackendKind::None => Ok(Box::new(NullBackend::new())),
        BackendKind::Headless => Ok(Box::new(HeadlessBackend::new(1))),
        BackendKind::Direct3D12 | BackendKind::Vulkan => Err(ResourceError::UnsupportedBackend(kind).into()),
        BackendKind::Direct3D11 | BackendKind::OpenGl => Err(CgRenderError::Initialization(format!(
            "{} backend requires a window",
            kind.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_hints() {
        assert_eq!(BackendKind::Headless.window_hints(true), ClientApi::NoApi);
        assert_eq!(
            BackendKind::OpenGl.window_hints(false),
            ClientApi::OpenGl {
                major: 4,
                minor: 6,
                core_profile: true,
                debug: false
            }
        );
    }

    #[test]
    fn test_offscreen_backends() {
        assert_eq!(create_offscreen_backend(BackendKind::None).unwrap().kind(), BackendKind::None);
        assert_eq!(
            create_offscreen_backend(BackendKind::Headless).unwrap().kind(),
            BackendKind::Headless
        );

        // 未实现的后端
        let err = create_offscreen_backend(BackendKind::Vulkan).err().unwrap();
        assert!(matches!(
            err,
            CgRenderError::Resource(ResourceError::UnsupportedBackend(BackendKind::Vulkan))
        ));

        // 需要窗口的后端
        let err = create_offscreen_backend(BackendKind::OpenGl).err().unwrap();
        assert!(matches!(err, CgRenderError::Initialization(_)));
    }
}
