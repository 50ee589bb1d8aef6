//! 渲染命令
//!
//! 应用程序通过工厂函数构造与后端无关的渲染命令，追加到渲染器的命令池中，
//! 再由执行器按插入顺序翻译为后端调用。
//!
//! # 命令类型
//!
//! | 命令 | 效果 |
//! |---|---|
//! | `SetViewClear` | 绑定渲染目标并按标志清除颜色/深度/模板 |
//! | `SetViewport` | 应用已创建的视口 |
//! | `SetPipelineState` | 绑定着色器程序 |
//! | `SetVertexShader` / `SetFragmentShader` | 绑定单个着色器 |
//! | `SetVertexBuffer` / `SetIndexBuffer` | 绑定输入装配缓冲区 |
//! | `Draw` / `DrawIndexed` | 非索引 / 索引绘制 |
//! | `Submit` | 绑定程序并执行后端的最终提交步骤 |
//! | `None` | 终止本次执行 |

use bitflags::bitflags;

use crate::core::error::{ResourceError, Result};

use super::resource::{IndexBufferHandle, ProgramHandle, ShaderHandle, VertexBufferHandle, ViewportHandle};

bitflags! {
    /// 清除标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x1 << 1;
        const STENCIL = 0x1 << 2;
    }
}

/// 打包的 RGBA 颜色常量（`0xRRGGBBAA`）
pub mod color {
    pub const BLACK: u32 = 0x0000_00FF;
    pub const WHITE: u32 = 0xFFFF_FFFF;
    pub const RED: u32 = 0xFF00_00FF;
    pub const GREEN: u32 = 0x00FF_00FF;
    pub const BLUE: u32 = 0x0000_FFFF;
    pub const CORNFLOWER_BLUE: u32 = 0x6495_EDFF;
}

/// 归一化的 RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    /// 从 `0xRRGGBBAA` 解包，每个通道除以 255
    pub fn from_packed(packed: u32) -> Self {
        Self {
            r: ((packed >> 24) & 0xFF) as f32 / 255.0,
            g: ((packed >> 16) & 0xFF) as f32 / 255.0,
            b: ((packed >> 8) & 0xFF) as f32 / 255.0,
            a: (packed & 0xFF) as f32 / 255.0,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// 渲染命令
///
/// 载荷只按变体解释，执行器对变体做穷尽匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderCommand {
    SetViewClear {
        view: u8,
        flags: ClearFlags,
        color: u32,
    },
    SetViewport {
        viewport: ViewportHandle,
    },
    SetPipelineState {
        program: ProgramHandle,
    },
    SetVertexShader {
        shader: ShaderHandle,
    },
    SetFragmentShader {
        shader: ShaderHandle,
    },
    SetVertexBuffer {
        buffer: VertexBufferHandle,
    },
    SetIndexBuffer {
        buffer: IndexBufferHandle,
    },
    Draw {
        buffer: VertexBufferHandle,
        count: u32,
        start: u32,
    },
    DrawIndexed {
        count: u32,
        start: u32,
    },
    Submit {
        view: u8,
        program: ProgramHandle,
    },
    #[default]
    None,
}

impl RenderCommand {
    /// 命令名称，用于日志
    pub fn name(&self) -> &'static str {
        match self {
            RenderCommand::SetViewClear { .. } => "SetViewClear",
            RenderCommand::SetViewport { .. } => "SetViewport",
            RenderCommand::SetPipelineState { .. } => "SetPipelineState",
            RenderCommand::SetVertexShader { .. } => "SetVertexShader",
            RenderCommand::SetFragmentShader { .. } => "SetFragmentShader",
            RenderCommand::SetVertexBuffer { .. } => "SetVertexBuffer",
            RenderCommand::SetIndexBuffer { .. } => "SetIndexBuffer",
            RenderCommand::Draw { .. } => "Draw",
            RenderCommand::DrawIndexed { .. } => "DrawIndexed",
            RenderCommand::Submit { .. } => "Submit",
            RenderCommand::None => "None",
        }
    }
}

// 命令工厂函数：无副作用，不会失败

pub fn set_view_clear(view: u8, flags: ClearFlags, color: u32) -> RenderCommand {
    RenderCommand::SetViewClear { view, flags, color }
}

pub fn set_viewport(viewport: ViewportHandle) -> RenderCommand {
    RenderCommand::SetViewport { viewport }
}

pub fn set_pipeline_state(program: ProgramHandle) -> RenderCommand {
    RenderCommand::SetPipelineState { program }
}

pub fn set_vertex_shader(shader: ShaderHandle) -> RenderCommand {
    RenderCommand::SetVertexShader { shader }
}

pub fn set_fragment_shader(shader: ShaderHandle) -> RenderCommand {
    RenderCommand::SetFragmentShader { shader }
}

pub fn set_vertex_buffer(buffer: VertexBufferHandle) -> RenderCommand {
    RenderCommand::SetVertexBuffer { buffer }
}

pub fn set_index_buffer(buffer: IndexBufferHandle) -> RenderCommand {
    RenderCommand::SetIndexBuffer { buffer }
}

pub fn draw(buffer: VertexBufferHandle, count: u32, start: u32) -> RenderCommand {
    RenderCommand::Draw { buffer, count, start }
}

pub fn draw_indexed(count: u32, start: u32) -> RenderCommand {
    RenderCommand::DrawIndexed { count, start }
}

pub fn submit(view: u8, program: ProgramHandle) -> RenderCommand {
    RenderCommand::Submit { view, program }
}

/// 固定容量的命令池
///
/// `0 <= len <= capacity` 恒成立。追加是全有或全无的。
#[derive(Debug)]
pub struct CommandPool {
    commands: Vec<RenderCommand>,
    capacity: usize,
}

impl CommandPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::new(),
            capacity,
        }
    }

    /// 追加一组命令
    ///
    /// 列表为空或追加后超出容量时返回错误，池保持不变。
    pub fn add(&mut self, commands: &[RenderCommand]) -> Result<()> {
        if commands.is_empty() {
            return Err(ResourceError::InvalidInput("command list is empty".to_string()).into());
        }

        if self.commands.len() + commands.len() > self.capacity {
            return Err(ResourceError::CapacityExhausted {
                pool: "render command",
                capacity: self.capacity,
            }
            .into());
        }

        self.commands.extend_from_slice(commands);
        Ok(())
    }

    /// 清空命令池
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn as_slice(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_red() {
        let c = Rgba::from_packed(0xFF0000FF);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!(c.g.abs() < 1e-6);
        assert!(c.b.abs() < 1e-6);
        assert!((c.a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unpack_channels() {
        let c = Rgba::from_packed(color::BLUE);
        assert_eq!(c.to_array(), [0.0, 0.0, 1.0, 1.0]);

        let c = Rgba::from_packed(0x80402000);
        assert!((c.r - 128.0 / 255.0).abs() < 1e-6);
        assert!((c.g - 64.0 / 255.0).abs() < 1e-6);
        assert!((c.b - 32.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.a, 0.0);
    }

    #[test]
    fn test_command_pool_overflow() {
        let mut pool = CommandPool::with_capacity(128);
        let filler = vec![draw_indexed(3, 0); 127];
        pool.add(&filler).unwrap();
        assert_eq!(pool.len(), 127);

        // 127 + 2 > 128
        let err = pool.add(&[draw_indexed(3, 0), draw_indexed(3, 0)]).unwrap_err();
        assert!(err.is_capacity_exhausted());
        assert_eq!(pool.len(), 127);

        pool.add(&[RenderCommand::None]).unwrap();
        assert_eq!(pool.len(), 128);
    }

    #[test]
    fn test_command_pool_large_capacity_is_lazy() {
        let mut pool = CommandPool::with_capacity(usize::MAX);
        pool.add(&[draw_indexed(3, 0)]).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_command_pool_empty_rejected() {
        let mut pool = CommandPool::with_capacity(4);
        assert!(pool.add(&[]).unwrap_err().is_invalid_input());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_command_pool_preserves_order() {
        let mut pool = CommandPool::with_capacity(8);
        let vb = VertexBufferHandle(0);
        pool.add(&[set_view_clear(0, ClearFlags::COLOR, color::BLACK)]).unwrap();
        pool.add(&[set_vertex_buffer(vb), draw(vb, 3, 0)]).unwrap();

        let names: Vec<&str> = pool.as_slice().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["SetViewClear", "SetVertexBuffer", "Draw"]);

        pool.reset();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_clear_flags_bits() {
        assert_eq!(ClearFlags::COLOR.bits(), 1);
        assert_eq!(ClearFlags::DEPTH.bits(), 2);
        assert_eq!(ClearFlags::STENCIL.bits(), 4);
        assert_eq!((ClearFlags::COLOR | ClearFlags::DEPTH).bits(), 3);
    }
}
