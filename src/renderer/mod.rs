//! 渲染器模块
//!
//! 本模块提供了统一的渲染接口，封装了不同图形 API 的具体实现。
//! 应用程序通过 [`Renderer`] 创建资源、录制命令并执行，
//! 而不需要关心具体使用的是哪个图形后端。
//!
//! # 架构设计
//!
//! - `Renderer`：对外的渲染器门面，拥有资源池、命令池、日志对象和选定的后端
//! - `command`：渲染命令、命令工厂函数和固定容量的命令池
//! - `executor`：把命令流翻译为后端调用
//! - `pool` / `resource`：资源池、资源记录和类型化句柄
//! - `layout`：顶点布局计算
//! - 后端实现在 `gfx` 模块中，按 API 分类组织
//!
//! # 使用示例
//!
//! ```
//! use cg_render::core::{config::LimitsConfig, Logger};
//! use cg_render::gfx::headless::HeadlessBackend;
//! use cg_render::renderer::command::{self, color, ClearFlags};
//! use cg_render::renderer::Renderer;
//!
//! let mut renderer = Renderer::new(
//!     Box::new(HeadlessBackend::new(1)),
//!     &LimitsConfig::default(),
//!     Logger::disabled(),
//! );
//! renderer
//!     .add_commands(&[command::set_view_clear(0, ClearFlags::COLOR, color::BLUE)])
//!     .unwrap();
//! let report = renderer.execute_commands();
//! assert_eq!(report.executed, 1);
//! ```

use tracing::{debug, info};

use crate::core::config::{BackendKind, LimitsConfig};
use crate::core::error::{CgRenderError, ResourceError, Result};
use crate::core::log::Logger;
use crate::gfx::{DeviceProperties, RenderBackend};

pub mod command;
pub mod executor;
pub mod layout;
pub mod pool;
pub mod resource;

use command::{CommandPool, RenderCommand};
use executor::ExecutionReport;
use layout::{VertexElementDesc, VertexLayout};
use pool::ResourcePools;
use resource::{
    Buffer, BufferDesc, BufferKind, IndexBufferHandle, LayoutResource, ProgramHandle, Shader, ShaderDesc,
    ShaderHandle, ShaderProgram, ShaderStage, VertexBufferHandle, VertexLayoutHandle, Viewport, ViewportHandle,
};

/// 渲染器
///
/// 单线程使用。后端在构造时选定，之后不再改变。
pub struct Renderer {
    backend: Box<dyn RenderBackend>,
    pools: ResourcePools,
    commands: CommandPool,
    logger: Logger,
    destroyed: bool,
}

impl Renderer {
    /// 创建渲染器
    ///
    /// # 参数
    ///
    /// * `backend` - 已完成设备与上下文创建的后端
    /// * `limits` - 资源池与命令池容量
    /// * `logger` - 渲染器范围内使用的日志对象
    pub fn new(backend: Box<dyn RenderBackend>, limits: &LimitsConfig, logger: Logger) -> Self {
        {
            let _guard = logger.enter();
            info!(
                backend = backend.kind().name(),
                device = %backend.device_properties(),
                max_commands = limits.max_render_commands,
                "Renderer created"
            );
        }

        Self {
            backend,
            pools: ResourcePools::new(limits),
            commands: CommandPool::with_capacity(limits.max_render_commands),
            logger,
            destroyed: false,
        }
    }

    /// 当前后端类型
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn device_properties(&self) -> &DeviceProperties {
        self.backend.device_properties()
    }

    /// 只读访问资源池
    pub fn pools(&self) -> &ResourcePools {
        &self.pools
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(CgRenderError::Runtime("renderer has been destroyed".to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // 资源创建
    // -----------------------------------------------------------------------

    /// 创建顶点缓冲区
    ///
    /// 容量与输入校验都在调用后端之前完成；后端失败时池保持不变。
    pub fn create_vertex_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> Result<VertexBufferHandle> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;

        if desc.kind != BufferKind::Vertex {
            return Err(ResourceError::InvalidInput(format!("expected a vertex buffer, got {:?}", desc.kind)).into());
        }

        let index = self.create_buffer(desc, data, BufferKind::Vertex)?;
        debug!(handle = index, size = data.len(), "Vertex buffer created");
        Ok(VertexBufferHandle(index))
    }

    /// 创建索引缓冲区，索引步长为 2 或 4 字节
    pub fn create_index_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> Result<IndexBufferHandle> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;

        if desc.kind != BufferKind::Index {
            return Err(ResourceError::InvalidInput(format!("expected an index buffer, got {:?}", desc.kind)).into());
        }

        let index = self.create_buffer(desc, data, BufferKind::Index)?;
        debug!(handle = index, count = desc.element_count, "Index buffer created");
        Ok(IndexBufferHandle(index))
    }

    fn create_buffer(&mut self, desc: &BufferDesc, data: &[u8], kind: BufferKind) -> Result<u32> {
        let pool = match kind {
            BufferKind::Index => &mut self.pools.index_buffers,
            _ => &mut self.pools.vertex_buffers,
        };
        pool.ensure_space()?;
        desc.validate(data)?;

        let native = self.backend.create_buffer(desc, data)?;
        let record = Buffer {
            desc: *desc,
            native,
            layout: None,
        };

        pool.push(record).inspect_err(|_| self.backend.release(native))
    }

    /// 编译着色器，按阶段放入对应的子池
    pub fn create_shader(&mut self, desc: &ShaderDesc, source: &[u8]) -> Result<ShaderHandle> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;

        let pool = self.pools.shaders.stage_mut(desc.stage);
        pool.ensure_space()?;

        if source.is_empty() {
            return Err(ResourceError::InvalidInput(format!("shader source {} is empty", desc.source_name)).into());
        }

        let native = self.backend.create_shader(desc, source)?;
        let record = Shader {
            desc: desc.clone(),
            native,
        };
        let index = pool.push(record).inspect_err(|_| self.backend.release(native))?;

        debug!(stage = desc.stage.name(), source = %desc.source_name, handle = index, "Shader compiled");
        Ok(ShaderHandle {
            stage: desc.stage,
            index,
        })
    }

    /// 链接着色器程序
    ///
    /// 至少需要一个着色器；任何句柄无效或链接失败时整体失败，池保持不变。
    pub fn create_shader_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;

        self.pools.programs.ensure_space()?;

        if shaders.is_empty() {
            return Err(ResourceError::InvalidInput("shader program needs at least one shader".to_string()).into());
        }

        let records = shaders
            .iter()
            .map(|&handle| self.pools.shaders.get(handle))
            .collect::<Result<Vec<&Shader>>>()?;

        let native = self.backend.create_program(&records)?;
        let record = ShaderProgram {
            shaders: shaders.to_vec(),
            native,
        };
        let index = self.pools.programs.push(record).inspect_err(|_| self.backend.release(native))?;

        debug!(handle = index, shaders = shaders.len(), "Shader program linked");
        Ok(ProgramHandle(index))
    }

    /// 创建顶点布局并与顶点缓冲区关联
    ///
    /// # 参数
    ///
    /// * `elements` - 有序的元素声明
    /// * `vertex_buffer` - 布局描述的顶点缓冲区
    /// * `vertex_shader` - 提供输入签名的顶点着色器（Direct3D 11 必需）
    pub fn create_vertex_layout(
        &mut self,
        elements: &[VertexElementDesc],
        vertex_buffer: VertexBufferHandle,
        vertex_shader: Option<ShaderHandle>,
    ) -> Result<VertexLayoutHandle> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;

        self.pools.vertex_layouts.ensure_space()?;
        let layout = VertexLayout::compute(elements)?;

        let buffer = self.pools.vertex_buffers.get(vertex_buffer.index())?;
        if buffer.desc.stride != layout.stride() {
            return Err(ResourceError::InvalidInput(format!(
                "layout stride {} does not match vertex buffer stride {}",
                layout.stride(),
                buffer.desc.stride
            ))
            .into());
        }
        let shader = vertex_shader
            .map(|handle| self.pools.shaders.get_stage(handle, ShaderStage::Vertex))
            .transpose()?;

        let native = self.backend.create_vertex_layout(&layout, buffer, shader)?;
        let stride = layout.stride();
        let record = LayoutResource {
            layout,
            vertex_buffer,
            native,
        };
        let index = self.pools.vertex_layouts.push(record).inspect_err(|_| self.backend.release(native))?;
        let handle = VertexLayoutHandle(index);

        self.pools.vertex_buffers.get_mut(vertex_buffer.index())?.layout = Some(handle);

        debug!(handle = index, stride, buffer = vertex_buffer.index(), "Vertex layout created");
        Ok(handle)
    }

    /// 创建视口
    pub fn create_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<ViewportHandle> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;

        self.pools.viewports.ensure_space()?;

        if width <= 0.0 || height <= 0.0 {
            return Err(ResourceError::InvalidInput(format!("viewport size {}x{} is not positive", width, height)).into());
        }

        // 视口句柄只有 8 位
        let index = u8::try_from(self.pools.viewports.len()).map_err(|_| ResourceError::CapacityExhausted {
            pool: "viewport",
            capacity: u8::MAX as usize + 1,
        })?;

        self.pools.viewports.push(Viewport::new(x, y, width, height))?;
        Ok(ViewportHandle(index))
    }

    // -----------------------------------------------------------------------
    // 命令
    // -----------------------------------------------------------------------

    /// 追加命令，全有或全无
    pub fn add_commands(&mut self, commands: &[RenderCommand]) -> Result<()> {
        let _guard = self.logger.enter();
        self.commands.add(commands)
    }

    /// 清空命令池
    pub fn reset_commands(&mut self) {
        self.commands.reset();
    }

    /// 已录制的命令
    pub fn commands(&self) -> &[RenderCommand] {
        self.commands.as_slice()
    }

    /// 按插入顺序执行已录制的命令
    ///
    /// 命令池不会被清空，同一组命令可以每帧重复执行。
    pub fn execute_commands(&mut self) -> ExecutionReport {
        let _guard = self.logger.enter();
        if self.destroyed {
            return ExecutionReport::default();
        }
        executor::execute(self.commands.as_slice(), &self.pools, self.backend.as_mut())
    }

    /// 呈现当前帧
    pub fn present(&mut self) -> Result<()> {
        let _guard = self.logger.enter();
        self.ensure_alive()?;
        self.backend.present()
    }

    /// 销毁全部资源并关闭后端
    ///
    /// 拆除顺序：顶点布局、着色器程序、着色器、索引缓冲区、顶点缓冲区，最后是上下文和设备。
    /// 可以重复调用，`Drop` 时也会自动调用。
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let _guard = self.logger.enter();

        let natives = self
            .pools
            .vertex_layouts
            .drain()
            .into_iter()
            .map(|l| l.native)
            .chain(self.pools.programs.drain().into_iter().map(|p| p.native))
            .chain(self.pools.shaders.vertex.drain().into_iter().map(|s| s.native))
            .chain(self.pools.shaders.fragment.drain().into_iter().map(|s| s.native))
            .chain(self.pools.index_buffers.drain().into_iter().map(|b| b.native))
            .chain(self.pools.vertex_buffers.drain().into_iter().map(|b| b.native))
            .collect::<Vec<_>>();

        let released = natives.len();
        for native in natives {
            self.backend.release(native);
        }
        self.pools.viewports.drain();
        self.commands.reset();

        self.backend.shutdown();
        self.destroyed = true;

        info!(released, "Renderer destroyed");
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::headless::{BackendCall, FailPoint, HeadlessBackend, HeadlessRecorder};
    use crate::gfx::none::NullBackend;
    use crate::gfx::ObjectKind;
    use command::{color, ClearFlags};
    use layout::{VertexAttribute, VertexFormat};

    fn headless_renderer(limits: &LimitsConfig) -> (Renderer, HeadlessRecorder) {
        let backend = HeadlessBackend::new(1);
        let recorder = backend.recorder();
        (Renderer::new(Box::new(backend), limits, Logger::disabled()), recorder)
    }

    fn triangle_bytes() -> Vec<u8> {
        let vertices: [f32; 9] = [0.0, 0.5, 0.0, 0.5, -0.5, 0.0, -0.5, -0.5, 0.0];
        bytemuck::cast_slice(&vertices).to_vec()
    }

    #[test]
    fn test_handles_are_sequential() {
        let (mut renderer, _) = headless_renderer(&LimitsConfig::default());
        let data = triangle_bytes();

        let handles: Vec<u32> = (0..5)
            .map(|_| renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).unwrap().index())
            .collect();

        assert_eq!(handles, vec![0, 1, 2, 3, 4]);
        assert_eq!(renderer.pools().vertex_buffers.len(), 5);
    }

    #[test]
    fn test_failed_creation_leaves_pool_unchanged() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());
        let data = triangle_bytes();
        renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).unwrap();

        // 后端失败
        recorder.fail(FailPoint::CreateBuffer);
        assert!(renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).is_err());
        assert_eq!(renderer.pools().vertex_buffers.len(), 1);
        recorder.heal(FailPoint::CreateBuffer);

        // 输入无效
        assert!(renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &[]).is_err());
        assert!(renderer.create_vertex_buffer(&BufferDesc::index(3, 2), &[0; 6]).is_err());
        assert_eq!(renderer.pools().vertex_buffers.len(), 1);

        let next = renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).unwrap();
        assert_eq!(next, VertexBufferHandle(1));
    }

    #[test]
    fn test_capacity_exhausted() {
        let limits = LimitsConfig {
            max_vertex_buffers: 2,
            ..LimitsConfig::default()
        };
        let (mut renderer, recorder) = headless_renderer(&limits);
        let data = triangle_bytes();

        renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).unwrap();
        renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).unwrap();
        recorder.clear_calls();

        let err = renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &data).unwrap_err();
        assert!(err.is_capacity_exhausted());
        // 容量检查在调用后端之前
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_shaders_are_classified_by_stage() {
        let (mut renderer, _) = headless_renderer(&LimitsConfig::default());

        let vs = renderer.create_shader(&ShaderDesc::vertex("main", "a.vert"), b"void main() {}").unwrap();
        let fs = renderer.create_shader(&ShaderDesc::fragment("main", "a.frag"), b"void main() {}").unwrap();
        let vs2 = renderer.create_shader(&ShaderDesc::vertex("main", "b.vert"), b"void main() {}").unwrap();

        assert_eq!(vs.index, 0);
        assert_eq!(fs.index, 0);
        assert_eq!(vs2.index, 1);
        assert_eq!(renderer.pools().shaders.vertex.len(), 2);
        assert_eq!(renderer.pools().shaders.fragment.len(), 1);

        assert!(renderer.create_shader(&ShaderDesc::vertex("main", "empty.vert"), b"").is_err());
    }

    #[test]
    fn test_program_creation() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());
        let vs = renderer.create_shader(&ShaderDesc::vertex("main", "a.vert"), b"v").unwrap();
        let fs = renderer.create_shader(&ShaderDesc::fragment("main", "a.frag"), b"f").unwrap();

        assert!(renderer.create_shader_program(&[]).is_err());

        // 无效句柄让整个链接失败
        let bogus = ShaderHandle {
            stage: ShaderStage::Fragment,
            index: 9,
        };
        assert!(renderer.create_shader_program(&[vs, bogus]).is_err());

        recorder.fail(FailPoint::CreateProgram);
        assert!(renderer.create_shader_program(&[vs, fs]).is_err());
        assert_eq!(renderer.pools().programs.len(), 0);
        recorder.heal(FailPoint::CreateProgram);

        let program = renderer.create_shader_program(&[vs, fs]).unwrap();
        assert_eq!(program, ProgramHandle(0));
        assert_eq!(renderer.pools().program(program).unwrap().shaders, vec![vs, fs]);
    }

    #[test]
    fn test_layout_stride_is_bound() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());

        // Position:Float3 + Color:Float4，3 个顶点
        let data = vec![0u8; 3 * 28];
        let vb = renderer.create_vertex_buffer(&BufferDesc::vertex(3, 28), &data).unwrap();
        let layout = renderer
            .create_vertex_layout(
                &[
                    VertexElementDesc::new(VertexAttribute::Position, VertexFormat::Float3),
                    VertexElementDesc::new(VertexAttribute::Color, VertexFormat::Float4),
                ],
                vb,
                None,
            )
            .unwrap();

        assert_eq!(renderer.pools().vertex_buffer(vb).unwrap().layout, Some(layout));
        let stride = renderer.pools().vertex_layout(layout).unwrap().layout.stride();
        assert_eq!(stride, 28);

        recorder.clear_calls();
        renderer.add_commands(&[command::set_vertex_buffer(vb)]).unwrap();
        renderer.execute_commands();

        assert!(recorder
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::BindVertexBuffer { stride: 28, .. })));
    }

    #[test]
    fn test_layout_rejects_fragment_shader() {
        let (mut renderer, _) = headless_renderer(&LimitsConfig::default());
        let vb = renderer.create_vertex_buffer(&BufferDesc::vertex(1, 12), &[0; 12]).unwrap();
        let fs = renderer.create_shader(&ShaderDesc::fragment("main", "a.frag"), b"f").unwrap();

        let elements = [VertexElementDesc::new(VertexAttribute::Position, VertexFormat::Float3)];
        assert!(renderer.create_vertex_layout(&elements, vb, Some(fs)).is_err());
        assert!(renderer.create_vertex_layout(&[], vb, None).is_err());
        assert!(renderer.create_vertex_layout(&elements, VertexBufferHandle(5), None).is_err());
        assert!(renderer.pools().vertex_layouts.is_empty());
    }

    #[test]
    fn test_layout_stride_must_match_buffer() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());
        let vb = renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &triangle_bytes()).unwrap();
        recorder.clear_calls();

        // 28 字节的布局描述 12 字节步长的缓冲区
        let elements = [
            VertexElementDesc::new(VertexAttribute::Position, VertexFormat::Float3),
            VertexElementDesc::new(VertexAttribute::Color, VertexFormat::Float4),
        ];
        let err = renderer.create_vertex_layout(&elements, vb, None).unwrap_err();
        assert!(err.is_invalid_input());

        // 后端未被调用，缓冲区保持无布局
        assert!(recorder.calls().is_empty());
        assert!(renderer.pools().vertex_layouts.is_empty());
        assert_eq!(renderer.pools().vertex_buffer(vb).unwrap().layout, None);
    }

    #[test]
    fn test_shader_failure_leaves_pools_unchanged() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());

        recorder.fail(FailPoint::CreateShader);
        assert!(renderer.create_shader(&ShaderDesc::vertex("main", "a.vert"), b"v").is_err());
        assert!(renderer.create_shader(&ShaderDesc::fragment("main", "a.frag"), b"f").is_err());
        assert!(renderer.pools().shaders.vertex.is_empty());
        assert!(renderer.pools().shaders.fragment.is_empty());
        assert_eq!(recorder.live_objects(), 0);
        recorder.heal(FailPoint::CreateShader);

        // 下一个句柄仍从 0 开始
        let vs = renderer.create_shader(&ShaderDesc::vertex("main", "a.vert"), b"v").unwrap();
        let fs = renderer.create_shader(&ShaderDesc::fragment("main", "a.frag"), b"f").unwrap();
        assert_eq!((vs.stage, vs.index), (ShaderStage::Vertex, 0));
        assert_eq!((fs.stage, fs.index), (ShaderStage::Fragment, 0));
    }

    #[test]
    fn test_layout_failure_leaves_buffer_unbound() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());
        let vb = renderer.create_vertex_buffer(&BufferDesc::vertex(3, 12), &triangle_bytes()).unwrap();
        let elements = [VertexElementDesc::new(VertexAttribute::Position, VertexFormat::Float3)];

        recorder.fail(FailPoint::CreateVertexLayout);
        assert!(renderer.create_vertex_layout(&elements, vb, None).is_err());
        assert!(renderer.pools().vertex_layouts.is_empty());
        assert_eq!(renderer.pools().vertex_buffer(vb).unwrap().layout, None);
        recorder.heal(FailPoint::CreateVertexLayout);

        let layout = renderer.create_vertex_layout(&elements, vb, None).unwrap();
        assert_eq!(layout, VertexLayoutHandle(0));
        assert_eq!(renderer.pools().vertex_buffer(vb).unwrap().layout, Some(layout));
    }

    #[test]
    fn test_viewports() {
        let limits = LimitsConfig {
            max_viewports: 1,
            ..LimitsConfig::default()
        };
        let (mut renderer, recorder) = headless_renderer(&limits);

        assert!(renderer.create_viewport(0.0, 0.0, 0.0, 600.0).is_err());
        let viewport = renderer.create_viewport(0.0, 0.0, 800.0, 600.0).unwrap();
        assert_eq!(viewport, ViewportHandle(0));
        assert!(renderer.create_viewport(0.0, 0.0, 800.0, 600.0).unwrap_err().is_capacity_exhausted());

        renderer.add_commands(&[command::set_viewport(viewport)]).unwrap();
        renderer.execute_commands();
        assert_eq!(recorder.calls(), vec![BackendCall::SetViewport(Viewport::new(0.0, 0.0, 800.0, 600.0))]);
    }

    #[test]
    fn test_command_overflow_through_renderer() {
        let limits = LimitsConfig {
            max_render_commands: 4,
            ..LimitsConfig::default()
        };
        let (mut renderer, _) = headless_renderer(&limits);

        renderer.add_commands(&[command::draw_indexed(3, 0); 3]).unwrap();
        assert!(renderer.add_commands(&[command::draw_indexed(3, 0); 2]).is_err());
        assert_eq!(renderer.commands().len(), 3);

        renderer.reset_commands();
        assert!(renderer.commands().is_empty());
    }

    #[test]
    fn test_full_frame() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());

        let vs = renderer.create_shader(&ShaderDesc::vertex("main", "quad.vert"), b"v").unwrap();
        let fs = renderer.create_shader(&ShaderDesc::fragment("main", "quad.frag"), b"f").unwrap();
        let program = renderer.create_shader_program(&[vs, fs]).unwrap();
        let vb = renderer.create_vertex_buffer(&BufferDesc::vertex(4, 12), &[0; 48]).unwrap();
        let indices: [u16; 6] = [0, 1, 3, 1, 2, 3];
        let ib = renderer
            .create_index_buffer(&BufferDesc::index(6, 2), bytemuck::cast_slice(&indices))
            .unwrap();
        let viewport = renderer.create_viewport(0.0, 0.0, 800.0, 600.0).unwrap();

        renderer
            .add_commands(&[
                command::set_view_clear(0, ClearFlags::COLOR, color::BLUE),
                command::set_viewport(viewport),
                command::set_pipeline_state(program),
                command::set_vertex_buffer(vb),
                command::set_index_buffer(ib),
                command::draw_indexed(6, 0),
                command::submit(0, program),
            ])
            .unwrap();

        recorder.clear_calls();
        let report = renderer.execute_commands();
        renderer.present().unwrap();

        assert_eq!(report.executed, 7);
        assert_eq!(report.skipped, 0);

        let calls = recorder.calls();
        assert_eq!(calls.len(), 8);
        assert!(matches!(calls[4], BackendCall::BindIndexBuffer { index_stride: 2, .. }));
        assert_eq!(calls[5], BackendCall::DrawIndexed { count: 6, start: 0 });
        assert_eq!(calls[7], BackendCall::Present);
    }

    #[test]
    fn test_destroy_releases_in_reverse_order() {
        let (mut renderer, recorder) = headless_renderer(&LimitsConfig::default());

        let vb = renderer.create_vertex_buffer(&BufferDesc::vertex(1, 12), &[0; 12]).unwrap();
        renderer.create_index_buffer(&BufferDesc::index(3, 2), &[0; 6]).unwrap();
        let vs = renderer.create_shader(&ShaderDesc::vertex("main", "a.vert"), b"v").unwrap();
        renderer.create_shader_program(&[vs]).unwrap();
        renderer
            .create_vertex_layout(
                &[VertexElementDesc::new(VertexAttribute::Position, VertexFormat::Float3)],
                vb,
                Some(vs),
            )
            .unwrap();
        assert_eq!(recorder.live_objects(), 5);

        recorder.clear_calls();
        renderer.destroy();
        renderer.destroy();

        let kinds: Vec<ObjectKind> = recorder
            .calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Release { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ObjectKind::VertexLayout,
                ObjectKind::Program,
                ObjectKind::VertexShader,
                ObjectKind::Buffer,
                ObjectKind::Buffer,
            ]
        );
        assert_eq!(recorder.calls().last(), Some(&BackendCall::Shutdown));
        assert_eq!(recorder.live_objects(), 0);

        // 销毁后不能再创建资源
        assert!(renderer.create_vertex_buffer(&BufferDesc::vertex(1, 12), &[0; 12]).is_err());
        assert_eq!(renderer.execute_commands(), ExecutionReport::default());
    }

    #[test]
    fn test_drop_shuts_down_backend() {
        let (renderer, recorder) = headless_renderer(&LimitsConfig::default());
        drop(renderer);
        assert_eq!(recorder.calls(), vec![BackendCall::Shutdown]);
    }

    #[test]
    fn test_null_backend_renderer() {
        let mut renderer = Renderer::new(Box::new(NullBackend::new()), &LimitsConfig::default(), Logger::disabled());
        assert_eq!(renderer.backend_kind(), BackendKind::None);

        let err = renderer.create_vertex_buffer(&BufferDesc::vertex(1, 12), &[0; 12]).unwrap_err();
        assert!(matches!(
            err,
            CgRenderError::Resource(ResourceError::UnsupportedBackend(BackendKind::None))
        ));
        assert!(renderer.pools().vertex_buffers.is_empty());

        renderer
            .add_commands(&[command::set_view_clear(0, ClearFlags::COLOR, color::BLACK)])
            .unwrap();
        assert_eq!(renderer.execute_commands().executed, 1);
        assert!(renderer.present().is_ok());
    }
}
