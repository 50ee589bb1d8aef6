//! OpenGL 后端
//!
//! 使用 GL 4.5 直接状态访问（DSA）入口创建对象，不依赖绑定点。
//!
//! # 对象映射
//!
//! - 缓冲区：`glCreateBuffers` + `glNamedBufferStorage`
//! - 顶点布局：顶点数组对象（VAO），创建时挂接顶点缓冲区并设置属性格式
//! - 索引缓冲区：绑定时挂接到当前 VAO
//! - 渲染目标视图 0：默认帧缓冲

use std::ffi::{c_void, CString};

use gl::types::*;
use tracing::{debug, info};

use crate::core::config::BackendKind;
use crate::core::error::{CgRenderError, GraphicsError, ResourceError, Result};
use crate::gfx::backend::{foreign_handle, vertex_stride, DeviceProperties, NativeHandle, ObjectKind, RenderBackend};
use crate::renderer::command::{ClearFlags, Rgba};
use crate::renderer::layout::VertexLayout;
use crate::renderer::resource::{
    Buffer, BufferDesc, BufferUsage, LayoutResource, Shader, ShaderDesc, ShaderProgram, ShaderStage, Viewport,
};

use super::context::{GlContext, GlSurface};

/// OpenGL 4.5 DSA 后端
pub struct OpenGlBackend {
    context: Option<GlContext>,
    properties: DeviceProperties,
    /// 没有布局的顶点缓冲区使用的空 VAO
    fallback_vao: GLuint,
    vertex_array: VertexArrayState,
    index_type: GLenum,
    index_size: u32,
}

impl OpenGlBackend {
    /// 在窗口表面上创建设备与上下文
    pub fn new(surface: Box<dyn GlSurface>, debug: bool) -> Result<Self> {
        let context = GlContext::create(surface, debug)?;
        let properties = context.properties().clone();

        let mut fallback_vao: GLuint = 0;
        unsafe {
            gl::CreateVertexArrays(1, &mut fallback_vao);
        }
        check_error().map_err(GraphicsError::ContextCreation)?;

        info!(size = ?context.size(), debug = context.debug_output(), "OpenGL backend initialized");

        Ok(Self {
            context: Some(context),
            properties,
            fallback_vao,
            vertex_array: VertexArrayState::default(),
            index_type: gl::UNSIGNED_SHORT,
            index_size: 2,
        })
    }

    fn context(&mut self) -> Result<&mut GlContext> {
        self.context
            .as_mut()
            .ok_or_else(|| CgRenderError::Runtime("OpenGL context has been destroyed".to_string()))
    }

    fn check_view(view: u8) -> Result<()> {
        // 只有默认帧缓冲
        if view != 0 {
            return Err(GraphicsError::InvalidView(view).into());
        }
        Ok(())
    }
}

/// 取出 GL 对象名，并检查对象类别
fn gl_name(handle: &NativeHandle, expected: ObjectKind) -> Result<GLuint> {
    match *handle {
        NativeHandle::Gl { kind, name } if kind == expected => Ok(name),
        NativeHandle::Gl { kind, .. } => Err(GraphicsError::CommandExecution(format!(
            "expected a {:?} object, got {:?}",
            expected, kind
        ))
        .into()),
        ref other => Err(foreign_handle("OpenGL", other)),
    }
}

fn shader_kind(stage: ShaderStage) -> ObjectKind {
    match stage {
        ShaderStage::Vertex => ObjectKind::VertexShader,
        ShaderStage::Fragment => ObjectKind::FragmentShader,
    }
}

fn shader_type(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
    }
}

fn clear_mask(flags: ClearFlags) -> GLbitfield {
    let mut mask = 0;
    if flags.contains(ClearFlags::COLOR) {
        mask |= gl::COLOR_BUFFER_BIT;
    }
    if flags.contains(ClearFlags::DEPTH) {
        mask |= gl::DEPTH_BUFFER_BIT;
    }
    if flags.contains(ClearFlags::STENCIL) {
        mask |= gl::STENCIL_BUFFER_BIT;
    }
    mask
}

/// 当前绑定的 VAO 与索引缓冲区
///
/// 索引缓冲区属于 VAO 状态。切换 VAO 时把当前索引缓冲区挂到新 VAO 上，
/// `SetIndexBuffer` 与 `SetVertexBuffer` 的先后顺序因此不影响绘制结果。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct VertexArrayState {
    vao: GLuint,
    element_buffer: GLuint,
}

impl VertexArrayState {
    /// 切换到 `vao`，返回需要挂到它上面的索引缓冲区
    fn switch_vao(&mut self, vao: GLuint) -> Option<GLuint> {
        self.vao = vao;
        (self.element_buffer != 0).then_some(self.element_buffer)
    }

    /// 记录索引缓冲区，返回要挂接的 VAO 以及该 VAO 是否需要先绑定
    fn set_element_buffer(&mut self, buffer: GLuint, fallback_vao: GLuint) -> (GLuint, bool) {
        self.element_buffer = buffer;
        if self.vao == 0 {
            self.vao = fallback_vao;
            return (fallback_vao, true);
        }
        (self.vao, false)
    }

    fn forget_vao(&mut self, vao: GLuint) {
        if self.vao == vao {
            self.vao = 0;
        }
    }

    fn forget_buffer(&mut self, buffer: GLuint) {
        if self.element_buffer == buffer {
            self.element_buffer = 0;
        }
    }
}

fn index_type(stride: u32) -> Result<GLenum> {
    match stride {
        2 => Ok(gl::UNSIGNED_SHORT),
        4 => Ok(gl::UNSIGNED_INT),
        other => Err(ResourceError::InvalidInput(format!("index stride must be 2 or 4, got {}", other)).into()),
    }
}

/// 读取 `glGetError`，有错误时返回描述
fn check_error() -> std::result::Result<(), String> {
    let code = unsafe { gl::GetError() };
    match code {
        gl::NO_ERROR => Ok(()),
        gl::INVALID_ENUM => Err("[GL] An unacceptable value is specified for an enumerated argument.".to_string()),
        gl::INVALID_VALUE => Err("[GL] A numeric argument is out of range.".to_string()),
        gl::INVALID_OPERATION => Err("[GL] The specified operation is not allowed in the current state.".to_string()),
        gl::INVALID_FRAMEBUFFER_OPERATION => Err("[GL] The framebuffer object is not complete.".to_string()),
        gl::OUT_OF_MEMORY => Err("[GL] There is not enough memory left to execute the command.".to_string()),
        other => Err(format!("[GL] Unknown error 0x{:X}.", other)),
    }
}

unsafe fn shader_info_log(shader: GLuint) -> String {
    let mut len: GLint = 0;
    gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
    if len <= 1 {
        return String::new();
    }
    let mut buf = vec![0u8; len as usize];
    gl::GetShaderInfoLog(shader, len, std::ptr::null_mut(), buf.as_mut_ptr() as *mut GLchar);
    String::from_utf8_lossy(&buf[..len as usize - 1]).into_owned()
}

unsafe fn program_info_log(program: GLuint) -> String {
    let mut len: GLint = 0;
    gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
    if len <= 1 {
        return String::new();
    }
    let mut buf = vec![0u8; len as usize];
    gl::GetProgramInfoLog(program, len, std::ptr::null_mut(), buf.as_mut_ptr() as *mut GLchar);
    String::from_utf8_lossy(&buf[..len as usize - 1]).into_owned()
}

impl RenderBackend for OpenGlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenGl
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> Result<NativeHandle> {
        self.context()?;

        let flags = match desc.usage {
            BufferUsage::Static => 0,
            BufferUsage::Dynamic => gl::DYNAMIC_STORAGE_BIT,
        };

        let mut name: GLuint = 0;
        unsafe {
            gl::CreateBuffers(1, &mut name);
            gl::NamedBufferStorage(name, data.len() as GLsizeiptr, data.as_ptr() as *const c_void, flags);
        }

        if let Err(e) = check_error() {
            unsafe { gl::DeleteBuffers(1, &name) };
            return Err(GraphicsError::ResourceCreation(e).into());
        }

        Ok(NativeHandle::Gl {
            kind: ObjectKind::Buffer,
            name,
        })
    }

    fn create_shader(&mut self, desc: &ShaderDesc, source: &[u8]) -> Result<NativeHandle> {
        self.context()?;

        // 文件末尾可能带 NUL
        let trimmed = source.strip_suffix(&[0]).unwrap_or(source);
        let c_source = CString::new(trimmed).map_err(|_| {
            ResourceError::InvalidInput(format!("shader source {} contains a NUL byte", desc.source_name))
        })?;

        unsafe {
            let shader = gl::CreateShader(shader_type(desc.stage));
            if shader == 0 {
                return Err(GraphicsError::ShaderCompilation(format!(
                    "{}: glCreateShader failed",
                    desc.source_name
                ))
                .into());
            }

            gl::ShaderSource(shader, 1, &c_source.as_ptr(), std::ptr::null());
            gl::CompileShader(shader);

            let mut status = GLint::from(gl::FALSE);
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);

            if status != GLint::from(gl::TRUE) {
                let log = shader_info_log(shader);
                gl::DeleteShader(shader);
                return Err(GraphicsError::ShaderCompilation(format!(
                    "{} shader {}: {}",
                    desc.stage.name(),
                    desc.source_name,
                    log
                ))
                .into());
            }

            debug!(source = %desc.source_name, name = shader, "GLSL shader compiled");
            Ok(NativeHandle::Gl {
                kind: shader_kind(desc.stage),
                name: shader,
            })
        }
    }

    fn create_program(&mut self, shaders: &[&Shader]) -> Result<NativeHandle> {
        self.context()?;

        let names = shaders
            .iter()
            .map(|s| gl_name(&s.native, shader_kind(s.desc.stage)))
            .collect::<Result<Vec<GLuint>>>()?;

        unsafe {
            let program = gl::CreateProgram();
            if program == 0 {
                return Err(GraphicsError::ProgramLink("glCreateProgram failed".to_string()).into());
            }

            for &name in &names {
                gl::AttachShader(program, name);
            }
            gl::LinkProgram(program);

            let mut status = GLint::from(gl::FALSE);
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);

            // 链接后着色器对象不再需要挂在程序上
            for &name in &names {
                gl::DetachShader(program, name);
            }

            if status != GLint::from(gl::TRUE) {
                let log = program_info_log(program);
                gl::DeleteProgram(program);
                return Err(GraphicsError::ProgramLink(log).into());
            }

            Ok(NativeHandle::Gl {
                kind: ObjectKind::Program,
                name: program,
            })
        }
    }

    fn create_vertex_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_buffer: &Buffer,
        _vertex_shader: Option<&Shader>,
    ) -> Result<NativeHandle> {
        self.context()?;
        let buffer = gl_name(&vertex_buffer.native, ObjectKind::Buffer)?;

        let mut vao: GLuint = 0;
        unsafe {
            gl::CreateVertexArrays(1, &mut vao);
            gl::VertexArrayVertexBuffer(vao, 0, buffer, 0, layout.stride() as GLsizei);

            for (location, element) in layout.elements().iter().enumerate() {
                let location = location as GLuint;
                let components = element.format.component_count() as GLint;

                gl::EnableVertexArrayAttrib(vao, location);
                if element.format.is_float() {
                    gl::VertexArrayAttribFormat(vao, location, components, gl::FLOAT, gl::FALSE, element.offset);
                } else {
                    gl::VertexArrayAttribIFormat(vao, location, components, gl::UNSIGNED_INT, element.offset);
                }
                gl::VertexArrayAttribBinding(vao, location, 0);
            }
        }

        if let Err(e) = check_error() {
            unsafe { gl::DeleteVertexArrays(1, &vao) };
            return Err(GraphicsError::ResourceCreation(e).into());
        }

        Ok(NativeHandle::Gl {
            kind: ObjectKind::VertexLayout,
            name: vao,
        })
    }

    fn release(&mut self, handle: NativeHandle) {
        if self.context.is_none() {
            return;
        }
        let NativeHandle::Gl { kind, name } = handle else {
            return;
        };

        unsafe {
            match kind {
                ObjectKind::Buffer => {
                    self.vertex_array.forget_buffer(name);
                    gl::DeleteBuffers(1, &name)
                }
                ObjectKind::VertexShader | ObjectKind::FragmentShader => gl::DeleteShader(name),
                ObjectKind::Program => gl::DeleteProgram(name),
                ObjectKind::VertexLayout => {
                    self.vertex_array.forget_vao(name);
                    gl::DeleteVertexArrays(1, &name)
                }
            }
        }
    }

    fn clear_view(&mut self, view: u8, flags: ClearFlags, color: Rgba) -> Result<()> {
        Self::check_view(view)?;
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
            gl::ClearColor(color.r, color.g, color.b, color.a);
            gl::Clear(clear_mask(flags));
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        unsafe {
            gl::Viewport(
                viewport.x as GLint,
                viewport.y as GLint,
                viewport.width as GLsizei,
                viewport.height as GLsizei,
            );
            gl::DepthRangef(viewport.min_depth, viewport.max_depth);
        }
        Ok(())
    }

    fn bind_program(&mut self, program: &ShaderProgram) -> Result<()> {
        let name = gl_name(&program.native, ObjectKind::Program)?;
        unsafe { gl::UseProgram(name) };
        Ok(())
    }

    fn bind_shader(&mut self, shader: &Shader) -> Result<()> {
        gl_name(&shader.native, shader_kind(shader.desc.stage))?;
        Err(GraphicsError::CommandExecution(format!(
            "OpenGL binds {} shaders through linked programs",
            shader.desc.stage.name()
        ))
        .into())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Buffer, layout: Option<&LayoutResource>) -> Result<()> {
        let name = gl_name(&buffer.native, ObjectKind::Buffer)?;

        let vao = match layout {
            Some(layout) => gl_name(&layout.native, ObjectKind::VertexLayout)?,
            None => {
                unsafe {
                    gl::VertexArrayVertexBuffer(
                        self.fallback_vao,
                        0,
                        name,
                        0,
                        vertex_stride(buffer, None) as GLsizei,
                    );
                }
                self.fallback_vao
            }
        };

        let element_buffer = self.vertex_array.switch_vao(vao);
        unsafe {
            if let Some(element_buffer) = element_buffer {
                gl::VertexArrayElementBuffer(vao, element_buffer);
            }
            gl::BindVertexArray(vao);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        let name = gl_name(&buffer.native, ObjectKind::Buffer)?;
        let index_type = index_type(buffer.desc.stride)?;

        let (vao, needs_bind) = self.vertex_array.set_element_buffer(name, self.fallback_vao);
        unsafe {
            gl::VertexArrayElementBuffer(vao, name);
            if needs_bind {
                gl::BindVertexArray(vao);
            }
        }
        self.index_type = index_type;
        self.index_size = buffer.desc.stride;
        Ok(())
    }

    fn draw(&mut self, count: u32, start: u32) -> Result<()> {
        unsafe { gl::DrawArrays(gl::TRIANGLES, start as GLint, count as GLsizei) };
        Ok(())
    }

    fn draw_indexed(&mut self, count: u32, start: u32) -> Result<()> {
        let offset = (start as usize * self.index_size as usize) as *const c_void;
        unsafe { gl::DrawElements(gl::TRIANGLES, count as GLsizei, self.index_type, offset) };
        Ok(())
    }

    fn submit(&mut self, view: u8, program: &ShaderProgram) -> Result<()> {
        Self::check_view(view)?;
        self.bind_program(program)
    }

    fn present(&mut self) -> Result<()> {
        self.context()?.present()
    }

    fn shutdown(&mut self) {
        if self.context.is_none() {
            return;
        }

        unsafe {
            gl::BindVertexArray(0);
            gl::DeleteVertexArrays(1, &self.fallback_vao);
        }
        self.fallback_vao = 0;
        self.vertex_array = VertexArrayState::default();

        // 释放呈现回调，连同表面与 GL 上下文
        self.context = None;
        info!("OpenGL context destroyed");
    }
}

impl Drop for OpenGlBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
