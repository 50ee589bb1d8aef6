//! 命令执行器
//!
//! 按插入顺序遍历命令池，把句柄解析为资源记录后分发给选定的后端。
//!
//! # 失败策略
//!
//! - 遇到 `RenderCommand::None` 立即停止，报告中 `terminated = true`
//! - 句柄越界、着色器阶段不符或后端调用失败：跳过该命令，记录警告，继续执行后续命令

use tracing::{debug, warn};

use crate::core::error::Result;
use crate::gfx::RenderBackend;

use super::command::{RenderCommand, Rgba};
use super::pool::ResourcePools;
use super::resource::{ShaderStage, VertexBufferHandle};

/// 一次执行的结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionReport {
    /// 成功执行的命令数
    pub executed: usize,
    /// 被跳过的命令数
    pub skipped: usize,
    /// 是否因 `None` 命令提前终止
    pub terminated: bool,
}

/// 单次执行期间的绑定状态
#[derive(Debug, Default)]
struct ExecutorState {
    bound_vertex_buffer: Option<VertexBufferHandle>,
}

/// 执行一组命令
pub fn execute(
    commands: &[RenderCommand],
    pools: &ResourcePools,
    backend: &mut dyn RenderBackend,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    let mut state = ExecutorState::default();

    for (position, command) in commands.iter().enumerate() {
        if let RenderCommand::None = command {
            debug!(position, "Command stream terminated by None");
            report.terminated = true;
            break;
        }

        match execute_one(command, pools, backend, &mut state) {
            Ok(()) => report.executed += 1,
            Err(e) => {
                warn!(position, command = command.name(), error = %e, "Skipping render command");
                report.skipped += 1;
            }
        }
    }

    report
}

fn execute_one(
    command: &RenderCommand,
    pools: &ResourcePools,
    backend: &mut dyn RenderBackend,
    state: &mut ExecutorState,
) -> Result<()> {
    match *command {
        RenderCommand::SetViewClear { view, flags, color } => {
            backend.clear_view(view, flags, Rgba::from_packed(color))
        }
        RenderCommand::SetViewport { viewport } => {
            let viewport = pools.viewport(viewport)?;
            backend.set_viewport(viewport)
        }
        RenderCommand::SetPipelineState { program } => {
            let program = pools.program(program)?;
            backend.bind_program(program)
        }
        RenderCommand::SetVertexShader { shader } => {
            let shader = pools.shaders.get_stage(shader, ShaderStage::Vertex)?;
            backend.bind_shader(shader)
        }
        RenderCommand::SetFragmentShader { shader } => {
            let shader = pools.shaders.get_stage(shader, ShaderStage::Fragment)?;
            backend.bind_shader(shader)
        }
        RenderCommand::SetVertexBuffer { buffer } => bind_vertex_buffer(buffer, pools, backend, state),
        RenderCommand::SetIndexBuffer { buffer } => {
            let buffer = pools.index_buffer(buffer)?;
            backend.bind_index_buffer(buffer)
        }
        RenderCommand::Draw { buffer, count, start } => {
            if state.bound_vertex_buffer != Some(buffer) {
                bind_vertex_buffer(buffer, pools, backend, state)?;
            }
            backend.draw(count, start)
        }
        RenderCommand::DrawIndexed { count, start } => backend.draw_indexed(count, start),
        RenderCommand::Submit { view, program } => {
            let program = pools.program(program)?;
            backend.submit(view, program)
        }
        // 已在 execute 中处理
        RenderCommand::None => Ok(()),
    }
}

fn bind_vertex_buffer(
    handle: VertexBufferHandle,
    pools: &ResourcePools,
    backend: &mut dyn RenderBackend,
    state: &mut ExecutorState,
) -> Result<()> {
    let buffer = pools.vertex_buffer(handle)?;
    let layout = match buffer.layout {
        Some(layout) => Some(pools.vertex_layout(layout)?),
        None => None,
    };
    backend.bind_vertex_buffer(buffer, layout)?;
    state.bound_vertex_buffer = Some(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LimitsConfig;
    use crate::gfx::headless::{BackendCall, FailPoint, HeadlessBackend};
    use crate::gfx::{NativeHandle, ObjectKind};
    use crate::renderer::command::{self, color, ClearFlags};
    use crate::renderer::resource::{Buffer, BufferDesc, ProgramHandle, Shader, ShaderDesc, ShaderHandle};

    fn pools_with_vertex_buffer() -> ResourcePools {
        let mut pools = ResourcePools::new(&LimitsConfig::default());
        pools
            .vertex_buffers
            .push(Buffer {
                desc: BufferDesc::vertex(3, 12),
                native: NativeHandle::Headless {
                    kind: ObjectKind::Buffer,
                    id: 0,
                },
                layout: None,
            })
            .unwrap();
        pools
    }

    #[test]
    fn test_call_order() {
        let pools = pools_with_vertex_buffer();
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();
        let vb = VertexBufferHandle(0);

        let commands = [
            command::set_view_clear(0, ClearFlags::COLOR, color::RED),
            command::set_vertex_buffer(vb),
            command::draw(vb, 3, 0),
        ];
        let report = execute(&commands, &pools, &mut backend);

        assert_eq!(report.executed, 3);
        assert_eq!(report.skipped, 0);

        let calls = recorder.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], BackendCall::ClearView { view: 0, .. }));
        assert_eq!(calls[1], BackendCall::BindVertexBuffer { id: 0, stride: 12 });
        assert_eq!(calls[2], BackendCall::Draw { count: 3, start: 0 });
    }

    #[test]
    fn test_draw_binds_unbound_buffer() {
        let pools = pools_with_vertex_buffer();
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();

        execute(&[command::draw(VertexBufferHandle(0), 3, 0)], &pools, &mut backend);

        assert_eq!(
            recorder.calls(),
            vec![
                BackendCall::BindVertexBuffer { id: 0, stride: 12 },
                BackendCall::Draw { count: 3, start: 0 },
            ]
        );
    }

    #[test]
    fn test_shader_binds_follow_stage() {
        let mut pools = pools_with_vertex_buffer();
        pools
            .shaders
            .vertex
            .push(Shader {
                desc: ShaderDesc::vertex("main", "a.vert"),
                native: NativeHandle::Headless {
                    kind: ObjectKind::VertexShader,
                    id: 1,
                },
            })
            .unwrap();
        pools
            .shaders
            .fragment
            .push(Shader {
                desc: ShaderDesc::fragment("main", "a.frag"),
                native: NativeHandle::Headless {
                    kind: ObjectKind::FragmentShader,
                    id: 2,
                },
            })
            .unwrap();
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();

        let commands = [
            command::set_vertex_shader(ShaderHandle {
                stage: ShaderStage::Vertex,
                index: 0,
            }),
            command::set_fragment_shader(ShaderHandle {
                stage: ShaderStage::Fragment,
                index: 0,
            }),
        ];
        let report = execute(&commands, &pools, &mut backend);

        assert_eq!(report.executed, 2);
        assert_eq!(
            recorder.calls(),
            vec![
                BackendCall::BindShader {
                    stage: ShaderStage::Vertex,
                    id: 1,
                },
                BackendCall::BindShader {
                    stage: ShaderStage::Fragment,
                    id: 2,
                },
            ]
        );
    }

    #[test]
    fn test_none_stops_execution() {
        let pools = pools_with_vertex_buffer();
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();

        let commands = [
            command::draw_indexed(6, 0),
            RenderCommand::None,
            command::draw_indexed(3, 0),
        ];
        let report = execute(&commands, &pools, &mut backend);

        assert!(report.terminated);
        assert_eq!(report.executed, 1);
        assert_eq!(recorder.calls(), vec![BackendCall::DrawIndexed { count: 6, start: 0 }]);
    }

    #[test]
    fn test_invalid_handles_are_skipped() {
        let pools = pools_with_vertex_buffer();
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();

        let commands = [
            command::set_vertex_buffer(VertexBufferHandle(42)),
            command::set_pipeline_state(ProgramHandle(0)),
            command::set_vertex_shader(ShaderHandle {
                stage: ShaderStage::Fragment,
                index: 0,
            }),
            command::set_view_clear(3, ClearFlags::COLOR, color::BLACK),
            command::draw_indexed(6, 0),
        ];
        let report = execute(&commands, &pools, &mut backend);

        assert_eq!(report.skipped, 4);
        assert_eq!(report.executed, 1);
        assert!(!report.terminated);
        assert_eq!(recorder.calls(), vec![BackendCall::DrawIndexed { count: 6, start: 0 }]);
    }

    #[test]
    fn test_backend_failure_is_skipped() {
        let pools = pools_with_vertex_buffer();
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();
        recorder.fail(FailPoint::Draw);

        let report = execute(
            &[command::draw_indexed(6, 0), command::set_view_clear(0, ClearFlags::COLOR, color::WHITE)],
            &pools,
            &mut backend,
        );

        assert_eq!(report.skipped, 1);
        assert_eq!(report.executed, 1);
    }
}
