//! 图形后端的统一抽象接口
//!
//! 本模块定义了所有图形后端（Direct3D 11、OpenGL、无头记录后端等）必须实现的统一接口。
//! 渲染器在构造时选定一个后端（`Box<dyn RenderBackend>`），之后所有资源创建与
//! 命令执行都通过这个 trait 分发，上层代码不需要任何后端相关的分支。

use std::fmt;

use crate::core::config::BackendKind;
use crate::core::error::{GraphicsError, Result};
use crate::renderer::command::{ClearFlags, Rgba};
use crate::renderer::layout::VertexLayout;
use crate::renderer::resource::{Buffer, BufferDesc, LayoutResource, Shader, ShaderDesc, ShaderProgram, Viewport};

/// 原生对象类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    VertexShader,
    FragmentShader,
    Program,
    VertexLayout,
}

/// 原生句柄
///
/// 每个后端一个变体，只有创建它的后端能解释其内容。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeHandle {
    /// Direct3D 11：后端内部 COM 对象表中的槽位
    D3d11 { kind: ObjectKind, slot: u32 },
    /// OpenGL：对象名
    Gl { kind: ObjectKind, name: u32 },
    /// 无头后端：合成的递增 id
    Headless { kind: ObjectKind, id: u32 },
}

impl NativeHandle {
    pub fn kind(&self) -> ObjectKind {
        match *self {
            NativeHandle::D3d11 { kind, .. }
            | NativeHandle::Gl { kind, .. }
            | NativeHandle::Headless { kind, .. } => kind,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            NativeHandle::D3d11 { .. } => "Direct3D 11",
            NativeHandle::Gl { .. } => "OpenGL",
            NativeHandle::Headless { .. } => "Headless",
        }
    }
}

/// 后端收到不属于自己的句柄时使用的错误
pub fn foreign_handle(expected: &str, handle: &NativeHandle) -> crate::core::error::CgRenderError {
    GraphicsError::ForeignHandle(format!(
        "{} backend received a {} handle ({:?})",
        expected,
        handle.backend_name(),
        handle.kind()
    ))
    .into()
}

/// 设备属性
///
/// 在上下文创建时查询并记录到日志。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub shading_language_version: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub extension_count: u32,
    /// 专用显存（字节）
    pub dedicated_video_memory: u64,
    /// 专用系统内存（字节）
    pub dedicated_system_memory: u64,
}

impl fmt::Display for DeviceProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.renderer, self.vendor, self.version)
    }
}

/// 交换链配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
    pub vsync: bool,
    pub windowed: bool,
}

impl SwapchainConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffer_count: 2,
            vsync: true,
            windowed: true,
        }
    }
}

/// 每帧调用一次的呈现回调，在上下文创建时绑定
pub type PresentFn = Box<dyn FnMut() -> Result<()>>;

/// 图形后端的统一接口
///
/// # 约定
///
/// - 创建方法失败时必须先释放本次调用中创建的中间对象，再返回错误
/// - 收到其他后端的 `NativeHandle` 时返回 `GraphicsError::ForeignHandle`
/// - `shutdown` 先销毁上下文再销毁设备，可重复调用
pub trait RenderBackend {
    /// 后端类型
    fn kind(&self) -> BackendKind;

    /// 设备属性
    fn device_properties(&self) -> &DeviceProperties;

    /// 创建顶点 / 索引 / 常量缓冲区
    fn create_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> Result<NativeHandle>;

    /// 编译着色器
    fn create_shader(&mut self, desc: &ShaderDesc, source: &[u8]) -> Result<NativeHandle>;

    /// 链接着色器程序
    fn create_program(&mut self, shaders: &[&Shader]) -> Result<NativeHandle>;

    /// 创建顶点输入布局
    ///
    /// # 参数
    ///
    /// * `layout` - 已计算的布局
    /// * `vertex_buffer` - 布局描述的顶点缓冲区
    /// * `vertex_shader` - 输入签名来源（Direct3D 11 必需）
    fn create_vertex_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_buffer: &Buffer,
        vertex_shader: Option<&Shader>,
    ) -> Result<NativeHandle>;

    /// 释放原生对象
    fn release(&mut self, handle: NativeHandle);

    /// 绑定渲染目标并清除
    fn clear_view(&mut self, view: u8, flags: ClearFlags, color: Rgba) -> Result<()>;

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;

    fn bind_program(&mut self, program: &ShaderProgram) -> Result<()>;

    fn bind_shader(&mut self, shader: &Shader) -> Result<()>;

    /// 绑定顶点缓冲区，步长取自关联布局（若有）
    fn bind_vertex_buffer(&mut self, buffer: &Buffer, layout: Option<&LayoutResource>) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Buffer) -> Result<()>;

    fn draw(&mut self, count: u32, start: u32) -> Result<()>;

    fn draw_indexed(&mut self, count: u32, start: u32) -> Result<()>;

    /// 绑定程序并执行后端的最终提交步骤
    fn submit(&mut self, view: u8, program: &ShaderProgram) -> Result<()>;

    /// 呈现当前帧
    fn present(&mut self) -> Result<()>;

    /// 销毁上下文与设备
    fn shutdown(&mut self);
}

/// 绑定顶点缓冲区时使用的步长
pub fn vertex_stride(buffer: &Buffer, layout: Option<&LayoutResource>) -> u32 {
    layout.map_or(buffer.desc.stride, |l| l.layout.stride())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_handle_kind() {
        let handle = NativeHandle::Gl {
            kind: ObjectKind::Program,
            name: 3,
        };
        assert_eq!(handle.kind(), ObjectKind::Program);

        let err = foreign_handle("Direct3D 11", &handle);
        assert!(err.is_backend_failure());
        assert!(err.to_string().contains("OpenGL"));
    }

    #[test]
    fn test_swapchain_defaults() {
        let config = SwapchainConfig::new(800, 600);
        assert_eq!(config.buffer_count, 2);
        assert!(config.windowed);
    }
}
