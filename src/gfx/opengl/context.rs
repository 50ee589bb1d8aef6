//! OpenGL 上下文
//!
//! 负责把窗口表面设为当前上下文、加载 GL 入口、检查 DSA 支持、
//! 查询设备属性，并在调试模式下安装 `glDebugMessageCallback`。

use std::ffi::{c_void, CStr};

use gl::types::*;
use tracing::{debug, error, info, trace, warn};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::{DeviceProperties, PresentFn};

/// OpenGL 窗口表面
///
/// 由平台层实现（glutin 表面 + 上下文），后端只通过这个接口访问窗口。
pub trait GlSurface {
    /// 将上下文设为当前线程的当前上下文
    fn make_current(&self) -> Result<()>;

    /// 查询 GL 函数地址
    fn get_proc_address(&self, symbol: &str) -> *const c_void;

    /// 交换前后缓冲
    fn swap_buffers(&self) -> Result<()>;

    /// 表面尺寸（像素）
    fn size(&self) -> (u32, u32);
}

/// 驱动产生的噪声消息（缓冲区用法提示等）
const IGNORED_MESSAGE_IDS: [GLuint; 4] = [131169, 131185, 131218, 131204];

/// 最低要求的 GL 版本（DSA）
const REQUIRED_VERSION: (u32, u32) = (4, 5);

/// OpenGL 上下文状态
pub struct GlContext {
    present: PresentFn,
    properties: DeviceProperties,
    size: (u32, u32),
    debug_output: bool,
}

impl GlContext {
    /// 在给定表面上创建上下文
    ///
    /// # 参数
    ///
    /// * `surface` - 平台层提供的表面，所有权转移给呈现回调
    /// * `debug` - 是否安装调试消息回调
    pub fn create(surface: Box<dyn GlSurface>, debug: bool) -> Result<Self> {
        surface.make_current()?;
        gl::load_with(|symbol| surface.get_proc_address(symbol));

        if !gl::CreateBuffers::is_loaded()
            || !gl::CreateVertexArrays::is_loaded()
            || !gl::NamedBufferStorage::is_loaded()
            || !gl::VertexArrayAttribFormat::is_loaded()
        {
            return Err(GraphicsError::Requirement("direct state access (GL 4.5)".to_string()).into());
        }

        let properties = unsafe { query_properties() };
        if (properties.version_major, properties.version_minor) < REQUIRED_VERSION {
            return Err(GraphicsError::Requirement(format!(
                "OpenGL {}.{} (found {}.{})",
                REQUIRED_VERSION.0, REQUIRED_VERSION.1, properties.version_major, properties.version_minor
            ))
            .into());
        }

        info!(
            vendor = %properties.vendor,
            renderer = %properties.renderer,
            version = %properties.version,
            glsl = %properties.shading_language_version,
            extensions = properties.extension_count,
            "OpenGL context created"
        );

        let debug_output = debug && unsafe { install_debug_callback() };

        let size = surface.size();
        unsafe {
            gl::Viewport(0, 0, size.0 as GLint, size.1 as GLint);
        }

        let present: PresentFn = Box::new(move || surface.swap_buffers());

        Ok(Self {
            present,
            properties,
            size,
            debug_output,
        })
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn debug_output(&self) -> bool {
        self.debug_output
    }

    /// 调用呈现回调
    pub fn present(&mut self) -> Result<()> {
        (self.present)()
    }
}

unsafe fn gl_string(name: GLenum) -> String {
    let ptr = gl::GetString(name);
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr as *const _).to_string_lossy().into_owned()
}

unsafe fn gl_integer(name: GLenum) -> GLint {
    let mut value: GLint = 0;
    gl::GetIntegerv(name, &mut value);
    value
}

unsafe fn query_properties() -> DeviceProperties {
    DeviceProperties {
        vendor: gl_string(gl::VENDOR),
        renderer: gl_string(gl::RENDERER),
        version: gl_string(gl::VERSION),
        shading_language_version: gl_string(gl::SHADING_LANGUAGE_VERSION),
        version_major: gl_integer(gl::MAJOR_VERSION).max(0) as u32,
        version_minor: gl_integer(gl::MINOR_VERSION).max(0) as u32,
        extension_count: gl_integer(gl::NUM_EXTENSIONS).max(0) as u32,
        ..DeviceProperties::default()
    }
}

/// 上下文带调试标志时安装回调，返回是否安装成功
unsafe fn install_debug_callback() -> bool {
    let flags = gl_integer(gl::CONTEXT_FLAGS);
    if flags & gl::CONTEXT_FLAG_DEBUG_BIT as GLint == 0 {
        warn!("Debug output requested but the context has no debug flag");
        return false;
    }

    gl::Enable(gl::DEBUG_OUTPUT);
    gl::Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
    gl::DebugMessageCallback(Some(debug_message_callback), std::ptr::null());
    gl::DebugMessageControl(
        gl::DONT_CARE,
        gl::DONT_CARE,
        gl::DONT_CARE,
        0,
        std::ptr::null(),
        gl::TRUE,
    );

    debug!("OpenGL debug output enabled");
    true
}

extern "system" fn debug_message_callback(
    source: GLenum,
    gltype: GLenum,
    id: GLuint,
    severity: GLenum,
    _length: GLsizei,
    message: *const GLchar,
    _user_param: *mut c_void,
) {
    if IGNORED_MESSAGE_IDS.contains(&id) || message.is_null() {
        return;
    }

    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    let source = source_name(source);
    let kind = type_name(gltype);

    match severity {
        gl::DEBUG_SEVERITY_HIGH => error!(target: "cg_render::gl", id, source, kind, "{}", message),
        gl::DEBUG_SEVERITY_MEDIUM => warn!(target: "cg_render::gl", id, source, kind, "{}", message),
        gl::DEBUG_SEVERITY_LOW => debug!(target: "cg_render::gl", id, source, kind, "{}", message),
        _ => trace!(target: "cg_render::gl", id, source, kind, "{}", message),
    }
}

fn source_name(source: GLenum) -> &'static str {
    match source {
        gl::DEBUG_SOURCE_API => "API",
        gl::DEBUG_SOURCE_WINDOW_SYSTEM => "Window System",
        gl::DEBUG_SOURCE_SHADER_COMPILER => "Shader Compiler",
        gl::DEBUG_SOURCE_THIRD_PARTY => "Third Party",
        gl::DEBUG_SOURCE_APPLICATION => "Application",
        _ => "Other",
    }
}

fn type_name(gltype: GLenum) -> &'static str {
    match gltype {
        gl::DEBUG_TYPE_ERROR => "Error",
        gl::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "Deprecated Behaviour",
        gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "Undefined Behaviour",
        gl::DEBUG_TYPE_PORTABILITY => "Portability",
        gl::DEBUG_TYPE_PERFORMANCE => "Performance",
        gl::DEBUG_TYPE_MARKER => "Marker",
        gl::DEBUG_TYPE_PUSH_GROUP => "Push Group",
        gl::DEBUG_TYPE_POP_GROUP => "Pop Group",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_names() {
        assert_eq!(source_name(gl::DEBUG_SOURCE_SHADER_COMPILER), "Shader Compiler");
        assert_eq!(type_name(gl::DEBUG_TYPE_PERFORMANCE), "Performance");
        assert_eq!(type_name(0), "Other");
    }

    #[test]
    fn test_ignored_ids() {
        assert!(IGNORED_MESSAGE_IDS.contains(&131185));
        assert!(!IGNORED_MESSAGE_IDS.contains(&1));
    }
}
