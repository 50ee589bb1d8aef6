//! 无头记录后端
//!
//! 不需要 GPU 或窗口。它为每次创建分发合成的 `NativeHandle::Headless`，
//! 并把每个后端调用按顺序记录为 [`BackendCall`]，供测试断言调用顺序和参数。
//!
//! 后端被装箱交给渲染器后，测试通过 [`HeadlessRecorder`] 继续观察调用记录、
//! 注入创建失败以及统计存活对象数量。
//!
//! # 示例
//!
//! ```
//! use cg_render::gfx::headless::{HeadlessBackend, FailPoint};
//!
//! let backend = HeadlessBackend::new(1);
//! let recorder = backend.recorder();
//! recorder.fail(FailPoint::CreateShader);
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::trace;

use crate::core::config::BackendKind;
use crate::core::error::{GraphicsError, Result};
use crate::renderer::command::{ClearFlags, Rgba};
use crate::renderer::layout::VertexLayout;
use crate::renderer::resource::{
    Buffer, BufferDesc, BufferKind, LayoutResource, Shader, ShaderDesc, ShaderProgram, ShaderStage, Viewport,
};

use super::backend::{foreign_handle, vertex_stride, DeviceProperties, NativeHandle, ObjectKind, RenderBackend};

/// 一次被记录的后端调用
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateBuffer { kind: BufferKind, size: usize },
    CreateShader { stage: ShaderStage },
    CreateProgram { shaders: usize },
    CreateVertexLayout { stride: u32 },
    Release { kind: ObjectKind, id: u32 },
    ClearView { view: u8, flags: ClearFlags, color: Rgba },
    SetViewport(Viewport),
    BindProgram { id: u32 },
    BindShader { stage: ShaderStage, id: u32 },
    BindVertexBuffer { id: u32, stride: u32 },
    BindIndexBuffer { id: u32, index_stride: u32 },
    Draw { count: u32, start: u32 },
    DrawIndexed { count: u32, start: u32 },
    Submit { view: u8, program: u32 },
    Present,
    Shutdown,
}

/// 可注入失败的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateBuffer,
    CreateShader,
    CreateProgram,
    CreateVertexLayout,
    Draw,
}

#[derive(Debug, Default)]
struct HeadlessState {
    calls: Vec<BackendCall>,
    failures: HashSet<FailPoint>,
    next_id: u32,
    live: usize,
}

/// 装箱后观察无头后端的探针
#[derive(Debug, Clone)]
pub struct HeadlessRecorder {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessRecorder {
    /// 迄今为止记录的全部调用
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// 让之后的某类调用失败
    pub fn fail(&self, point: FailPoint) {
        self.state.borrow_mut().failures.insert(point);
    }

    /// 取消失败注入
    pub fn heal(&self, point: FailPoint) {
        self.state.borrow_mut().failures.remove(&point);
    }

    /// 已创建但尚未释放的对象数量
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live
    }
}

/// 无头记录后端
#[derive(Debug)]
pub struct HeadlessBackend {
    state: Rc<RefCell<HeadlessState>>,
    view_count: u8,
    properties: DeviceProperties,
    shut_down: bool,
}

impl HeadlessBackend {
    /// 创建拥有 `view_count` 个渲染目标视图的后端
    pub fn new(view_count: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState::default())),
            view_count,
            properties: DeviceProperties {
                vendor: "cg_render".to_string(),
                renderer: "Headless".to_string(),
                version: "1.0".to_string(),
                version_major: 1,
                ..DeviceProperties::default()
            },
            shut_down: false,
        }
    }

    pub fn recorder(&self) -> HeadlessRecorder {
        HeadlessRecorder {
            state: Rc::clone(&self.state),
        }
    }

    fn record(&self, call: BackendCall) {
        trace!(?call, "Headless backend call");
        self.state.borrow_mut().calls.push(call);
    }

    fn should_fail(&self, point: FailPoint) -> bool {
        self.state.borrow().failures.contains(&point)
    }

    fn allocate(&self, kind: ObjectKind) -> NativeHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.live += 1;
        NativeHandle::Headless { kind, id }
    }

    fn check_view(&self, view: u8) -> Result<()> {
        if view >= self.view_count {
            return Err(GraphicsError::InvalidView(view).into());
        }
        Ok(())
    }
}

/// 取出无头句柄的 id，并检查对象类别
fn headless_id(handle: &NativeHandle, expected: ObjectKind) -> Result<u32> {
    match *handle {
        NativeHandle::Headless { kind, id } if kind == expected => Ok(id),
        NativeHandle::Headless { kind, .. } => Err(GraphicsError::CommandExecution(format!(
            "expected a {:?} object, got {:?}",
            expected, kind
        ))
        .into()),
        ref other => Err(foreign_handle("Headless", other)),
    }
}

fn shader_kind(stage: ShaderStage) -> ObjectKind {
    match stage {
        ShaderStage::Vertex => ObjectKind::VertexShader,
        ShaderStage::Fragment => ObjectKind::FragmentShader,
    }
}

impl RenderBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> Result<NativeHandle> {
        if self.should_fail(FailPoint::CreateBuffer) {
            return Err(GraphicsError::ResourceCreation("injected buffer failure".to_string()).into());
        }
        self.record(BackendCall::CreateBuffer {
            kind: desc.kind,
            size: data.len(),
        });
        Ok(self.allocate(ObjectKind::Buffer))
    }

    fn create_shader(&mut self, desc: &ShaderDesc, _source: &[u8]) -> Result<NativeHandle> {
        if self.should_fail(FailPoint::CreateShader) {
            return Err(GraphicsError::ShaderCompilation(format!(
                "{}: injected compile failure",
                desc.source_name
            ))
            .into());
        }
        self.record(BackendCall::CreateShader { stage: desc.stage });
        Ok(self.allocate(shader_kind(desc.stage)))
    }

    fn create_program(&mut self, shaders: &[&Shader]) -> Result<NativeHandle> {
        for shader in shaders {
            headless_id(&shader.native, shader_kind(shader.desc.stage))?;
        }
        if self.should_fail(FailPoint::CreateProgram) {
            return Err(GraphicsError::ProgramLink("injected link failure".to_string()).into());
        }
        self.record(BackendCall::CreateProgram {
            shaders: shaders.len(),
        });
        Ok(self.allocate(ObjectKind::Program))
    }

    fn create_vertex_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_buffer: &Buffer,
        _vertex_shader: Option<&Shader>,
    ) -> Result<NativeHandle> {
        headless_id(&vertex_buffer.native, ObjectKind::Buffer)?;
        if self.should_fail(FailPoint::CreateVertexLayout) {
            return Err(GraphicsError::ResourceCreation("injected layout failure".to_string()).into());
        }
        self.record(BackendCall::CreateVertexLayout {
            stride: layout.stride(),
        });
        Ok(self.allocate(ObjectKind::VertexLayout))
    }

    fn release(&mut self, handle: NativeHandle) {
        if let NativeHandle::Headless { kind, id } = handle {
            self.record(BackendCall::Release { kind, id });
            let mut state = self.state.borrow_mut();
            state.live = state.live.saturating_sub(1);
        }
    }

    fn clear_view(&mut self, view: u8, flags: ClearFlags, color: Rgba) -> Result<()> {
        self.check_view(view)?;
        self.record(BackendCall::ClearView { view, flags, color });
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.record(BackendCall::SetViewport(*viewport));
        Ok(())
    }

    fn bind_program(&mut self, program: &ShaderProgram) -> Result<()> {
        let id = headless_id(&program.native, ObjectKind::Program)?;
        self.record(BackendCall::BindProgram { id });
        Ok(())
    }

    fn bind_shader(&mut self, shader: &Shader) -> Result<()> {
        let id = headless_id(&shader.native, shader_kind(shader.desc.stage))?;
        self.record(BackendCall::BindShader {
            stage: shader.desc.stage,
            id,
        });
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Buffer, layout: Option<&LayoutResource>) -> Result<()> {
        let id = headless_id(&buffer.native, ObjectKind::Buffer)?;
        self.record(BackendCall::BindVertexBuffer {
            id,
            stride: vertex_stride(buffer, layout),
        });
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        let id = headless_id(&buffer.native, ObjectKind::Buffer)?;
        self.record(BackendCall::BindIndexBuffer {
            id,
            index_stride: buffer.desc.stride,
        });
        Ok(())
    }

    fn draw(&mut self, count: u32, start: u32) -> Result<()> {
        if self.should_fail(FailPoint::Draw) {
            return Err(GraphicsError::CommandExecution("injected draw failure".to_string()).into());
        }
        self.record(BackendCall::Draw { count, start });
        Ok(())
    }

    fn draw_indexed(&mut self, count: u32, start: u32) -> Result<()> {
        if self.should_fail(FailPoint::Draw) {
            return Err(GraphicsError::CommandExecution("injected draw failure".to_string()).into());
        }
        self.record(BackendCall::DrawIndexed { count, start });
        Ok(())
    }

    fn submit(&mut self, view: u8, program: &ShaderProgram) -> Result<()> {
        self.check_view(view)?;
        let id = headless_id(&program.native, ObjectKind::Program)?;
        self.record(BackendCall::Submit { view, program: id });
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.record(BackendCall::Present);
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.record(BackendCall::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();

        backend.clear_view(0, ClearFlags::COLOR, Rgba::default()).unwrap();
        backend.draw(3, 0).unwrap();
        backend.present().unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], BackendCall::ClearView { view: 0, .. }));
        assert_eq!(calls[1], BackendCall::Draw { count: 3, start: 0 });
        assert_eq!(calls[2], BackendCall::Present);
    }

    #[test]
    fn test_invalid_view() {
        let mut backend = HeadlessBackend::new(1);
        let err = backend.clear_view(1, ClearFlags::COLOR, Rgba::default()).unwrap_err();
        assert!(err.is_backend_failure());
    }

    #[test]
    fn test_failure_injection() {
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();

        recorder.fail(FailPoint::CreateBuffer);
        assert!(backend.create_buffer(&BufferDesc::vertex(1, 4), &[0; 4]).is_err());
        assert_eq!(recorder.live_objects(), 0);

        recorder.heal(FailPoint::CreateBuffer);
        let handle = backend.create_buffer(&BufferDesc::vertex(1, 4), &[0; 4]).unwrap();
        assert_eq!(recorder.live_objects(), 1);

        backend.release(handle);
        assert_eq!(recorder.live_objects(), 0);
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut backend = HeadlessBackend::new(1);
        let buffer = Buffer {
            desc: BufferDesc::vertex(1, 4),
            native: NativeHandle::Gl {
                kind: ObjectKind::Buffer,
                name: 1,
            },
            layout: None,
        };
        assert!(backend.bind_vertex_buffer(&buffer, None).is_err());
        assert!(backend.recorder().calls().is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();
        backend.shutdown();
        backend.shutdown();
        assert_eq!(recorder.calls(), vec![BackendCall::Shutdown]);
    }
}
