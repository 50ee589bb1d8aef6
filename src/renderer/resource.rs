//! 资源描述与资源记录
//!
//! 本模块定义了与后端无关的资源描述（`BufferDesc`、`ShaderDesc`）、
//! 资源池中保存的记录（`Buffer`、`Shader`、`ShaderProgram`、`LayoutResource`）
//! 以及应用程序持有的类型化句柄。
//!
//! # 句柄语义
//!
//! 句柄就是资源在池中的分配下标，创建后永久有效：
//! 池只追加，不复用、不压缩，销毁是整池拆除。

use std::fmt;

use crate::core::error::{ResourceError, Result};
use crate::gfx::NativeHandle;

use super::layout::VertexLayout;

/// 缓冲区类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
}

/// 缓冲区使用方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// 创建后不再修改
    #[default]
    Static,
    /// CPU 会频繁更新
    Dynamic,
}

/// 缓冲区描述信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub kind: BufferKind,
    pub usage: BufferUsage,
    /// 元素数量（顶点数 / 索引数）
    pub element_count: u32,
    /// 单个元素的字节大小
    pub stride: u32,
}

impl BufferDesc {
    /// 静态顶点缓冲区描述
    pub fn vertex(element_count: u32, stride: u32) -> Self {
        Self {
            kind: BufferKind::Vertex,
            usage: BufferUsage::Static,
            element_count,
            stride,
        }
    }

    /// 静态索引缓冲区描述，`stride` 为 2（u16）或 4（u32）
    pub fn index(element_count: u32, stride: u32) -> Self {
        Self {
            kind: BufferKind::Index,
            usage: BufferUsage::Static,
            element_count,
            stride,
        }
    }

    /// 设置使用方式
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// 总字节大小
    pub fn byte_size(&self) -> usize {
        self.element_count as usize * self.stride as usize
    }

    /// 校验描述与数据是否一致
    ///
    /// 数据必须非空，数量与步长都必须为正，且数据长度恰好等于 `byte_size()`。
    /// 索引缓冲区的步长只能是 2 或 4。
    pub fn validate(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(invalid("buffer data is empty"));
        }
        if self.element_count == 0 || self.stride == 0 {
            return Err(invalid("buffer element count and stride must be positive"));
        }
        if data.len() != self.byte_size() {
            return Err(ResourceError::InvalidInput(format!(
                "buffer data is {} bytes, descriptor expects {}",
                data.len(),
                self.byte_size()
            ))
            .into());
        }
        if self.kind == BufferKind::Index && !matches!(self.stride, 2 | 4) {
            return Err(ResourceError::InvalidInput(format!(
                "index stride must be 2 or 4, got {}",
                self.stride
            ))
            .into());
        }
        Ok(())
    }
}

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// 着色器描述信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    /// 入口函数名（GLSL 忽略，固定为 main）
    pub entry_point: String,
    /// 源标识，通常是文件名，用于日志和编译错误
    pub source_name: String,
}

impl ShaderDesc {
    pub fn new(stage: ShaderStage, entry_point: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            stage,
            entry_point: entry_point.into(),
            source_name: source_name.into(),
        }
    }

    pub fn vertex(entry_point: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::new(ShaderStage::Vertex, entry_point, source_name)
    }

    pub fn fragment(entry_point: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::new(ShaderStage::Fragment, entry_point, source_name)
    }
}

/// 视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// 句柄
// ---------------------------------------------------------------------------

macro_rules! pool_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

pool_handle!(
    /// 顶点缓冲区句柄
    VertexBufferHandle
);
pool_handle!(
    /// 索引缓冲区句柄
    IndexBufferHandle
);
pool_handle!(
    /// 顶点布局句柄
    VertexLayoutHandle
);
pool_handle!(
    /// 着色器程序句柄
    ProgramHandle
);

/// 着色器句柄
///
/// 顶点与片段着色器分别存放在各自的子池中，句柄同时记录阶段和下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle {
    pub stage: ShaderStage,
    pub index: u32,
}

impl fmt::Display for ShaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderHandle({}, {})", self.stage.name(), self.index)
    }
}

/// 视口句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportHandle(pub u8);

impl ViewportHandle {
    pub fn index(self) -> u32 {
        self.0 as u32
    }
}

// ---------------------------------------------------------------------------
// 资源记录
// ---------------------------------------------------------------------------

/// 缓冲区记录
#[derive(Debug, Clone)]
pub struct Buffer {
    pub desc: BufferDesc,
    pub native: NativeHandle,
    /// 与此顶点缓冲区关联的布局（创建布局时设置）
    pub layout: Option<VertexLayoutHandle>,
}

/// 着色器记录
#[derive(Debug, Clone)]
pub struct Shader {
    pub desc: ShaderDesc,
    pub native: NativeHandle,
}

/// 已链接的着色器程序记录
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub shaders: Vec<ShaderHandle>,
    pub native: NativeHandle,
}

/// 顶点布局记录
#[derive(Debug, Clone)]
pub struct LayoutResource {
    pub layout: VertexLayout,
    pub vertex_buffer: VertexBufferHandle,
    pub native: NativeHandle,
}

fn invalid(msg: &str) -> crate::core::error::CgRenderError {
    ResourceError::InvalidInput(msg.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_desc_byte_size() {
        let desc = BufferDesc::vertex(4, 12);
        assert_eq!(desc.byte_size(), 48);
        assert!(desc.validate(&[0u8; 48]).is_ok());
        assert!(desc.validate(&[0u8; 47]).is_err());
        assert!(desc.validate(&[]).is_err());
    }

    #[test]
    fn test_index_stride_validation() {
        assert!(BufferDesc::index(6, 2).validate(&[0u8; 12]).is_ok());
        assert!(BufferDesc::index(6, 4).validate(&[0u8; 24]).is_ok());
        // u8 索引不支持
        assert!(BufferDesc::index(6, 1).validate(&[0u8; 6]).is_err());
    }

    #[test]
    fn test_zero_count_rejected() {
        let desc = BufferDesc::vertex(0, 12);
        assert!(desc.validate(&[0u8; 12]).is_err());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(VertexBufferHandle(3).to_string(), "VertexBufferHandle(3)");
        let shader = ShaderHandle {
            stage: ShaderStage::Fragment,
            index: 1,
        };
        assert_eq!(shader.to_string(), "ShaderHandle(fragment, 1)");
    }
}
