//! 错误处理模块
//!
//! 定义了渲染核心中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - **容量耗尽**：资源池或命令队列已满，可恢复的局部错误
//! - **无效输入**：空数据、零尺寸、无效句柄等，在修改任何状态之前被拒绝
//! - **后端失败**：原生资源创建失败，先清理中间对象再向上传播
//! - **执行期无效句柄**：由执行器跳过并报告，不会中断整个队列

use std::fmt;

use super::config::BackendKind;

/// 渲染核心统一的 Result 类型
pub type Result<T> = std::result::Result<T, CgRenderError>;

/// 渲染核心的错误类型
#[derive(Debug)]
pub enum CgRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 资源池 / 句柄错误
    Resource(ResourceError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 上下文创建失败
    ContextCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 着色器程序链接失败
    ProgramLink(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 驱动不满足最低要求
    Requirement(String),

    /// 原生句柄属于其他后端
    ForeignHandle(String),

    /// 渲染目标视图不存在
    InvalidView(u8),
}

/// 资源池与句柄相关的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// 池已满
    CapacityExhausted { pool: &'static str, capacity: usize },

    /// 输入数据无效
    InvalidInput(String),

    /// 句柄超出池的有效范围
    InvalidHandle {
        kind: &'static str,
        index: u32,
        live: usize,
    },

    /// 着色器阶段与命令不匹配
    StageMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 当前后端未实现
    UnsupportedBackend(BackendKind),
}

impl fmt::Display for CgRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CgRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            CgRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            CgRenderError::Resource(e) => write!(f, "Resource error: {}", e),
            CgRenderError::Io(e) => write!(f, "IO error: {}", e),
            CgRenderError::Log(msg) => write!(f, "Log error: {}", msg),
            CgRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            CgRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::ContextCreation(msg) => write!(f, "Context creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ProgramLink(msg) => write!(f, "Program linking failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::Requirement(msg) => write!(f, "Driver doesn't support {}", msg),
            GraphicsError::ForeignHandle(msg) => write!(f, "Foreign native handle: {}", msg),
            GraphicsError::InvalidView(view) => write!(f, "Render target view {} does not exist", view),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::CapacityExhausted { pool, capacity } => {
                write!(f, "{} pool is full (capacity {})", pool, capacity)
            }
            ResourceError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ResourceError::InvalidHandle { kind, index, live } => {
                write!(f, "{} handle {} is out of range ({} live)", kind, index, live)
            }
            ResourceError::StageMismatch { expected, found } => {
                write!(f, "Expected a {} shader, found a {} shader", expected, found)
            }
            ResourceError::UnsupportedBackend(kind) => {
                write!(f, "Backend {} is not implemented", kind.name())
            }
        }
    }
}

impl std::error::Error for CgRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CgRenderError::Io(e) => Some(e),
            CgRenderError::Config(e) => Some(e),
            CgRenderError::Graphics(e) => Some(e),
            CgRenderError::Resource(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for ResourceError {}

impl From<std::io::Error> for CgRenderError {
    fn from(err: std::io::Error) -> Self {
        CgRenderError::Io(err)
    }
}

impl From<ConfigError> for CgRenderError {
    fn from(err: ConfigError) -> Self {
        CgRenderError::Config(err)
    }
}

impl From<GraphicsError> for CgRenderError {
    fn from(err: GraphicsError) -> Self {
        CgRenderError::Graphics(err)
    }
}

impl From<ResourceError> for CgRenderError {
    fn from(err: ResourceError) -> Self {
        CgRenderError::Resource(err)
    }
}

impl CgRenderError {
    /// 是否为容量耗尽错误
    pub fn is_capacity_exhausted(&self) -> bool {
        matches!(
            self,
            CgRenderError::Resource(ResourceError::CapacityExhausted { .. })
        )
    }

    /// 是否为无效输入错误（包括无效句柄）
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CgRenderError::Resource(
                ResourceError::InvalidInput(_)
                    | ResourceError::InvalidHandle { .. }
                    | ResourceError::StageMismatch { .. }
            )
        )
    }

    /// 是否为后端失败
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, CgRenderError::Graphics(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err: CgRenderError = ResourceError::CapacityExhausted {
            pool: "vertex buffer",
            capacity: 4,
        }
        .into();
        assert!(err.is_capacity_exhausted());
        assert!(!err.is_invalid_input());

        let err: CgRenderError = ResourceError::InvalidHandle {
            kind: "vertex buffer",
            index: 7,
            live: 2,
        }
        .into();
        assert!(err.is_invalid_input());

        let err: CgRenderError = GraphicsError::ShaderCompilation("syntax".to_string()).into();
        assert!(err.is_backend_failure());
    }

    #[test]
    fn test_error_display() {
        let err: CgRenderError = ResourceError::CapacityExhausted {
            pool: "shader program",
            capacity: 64,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Resource error: shader program pool is full (capacity 64)"
        );

        let err: CgRenderError = ResourceError::UnsupportedBackend(BackendKind::Vulkan).into();
        assert_eq!(err.to_string(), "Resource error: Backend Vulkan is not implemented");
    }
}
