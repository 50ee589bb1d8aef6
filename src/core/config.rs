//! 配置管理模块
//!
//! 提供渲染核心配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "CGEngine"
//! resizable = true
//!
//! [graphics]
//! backend = "opengl"  # 或 "d3d11"、"headless"、"none"
//! debug = true
//! vsync = true
//! swapchain_buffers = 2
//!
//! [limits]
//! max_render_commands = 128
//! max_vertex_buffers = 512
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 渲染核心配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 资源池与命令队列容量
    #[serde(default)]
    pub limits: LimitsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择（进程内只选择一次）
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// 是否启用调试层 / 调试输出
    #[serde(default = "default_debug")]
    pub debug: bool,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 交换链缓冲数量
    #[serde(default = "default_swapchain_buffers")]
    pub swapchain_buffers: u32,
}

/// 图形后端类型
///
/// `Direct3D12` 和 `Vulkan` 只是预留的枚举值，尚未实现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// 不渲染
    #[serde(rename = "none")]
    None,
    /// Direct3D 11（立即上下文风格）
    #[serde(rename = "d3d11")]
    Direct3D11,
    /// Direct3D 12（未实现）
    #[serde(rename = "d3d12")]
    Direct3D12,
    /// OpenGL 4.6（DSA 风格）
    #[serde(rename = "opengl")]
    OpenGl,
    /// Vulkan（未实现）
    #[serde(rename = "vulkan")]
    Vulkan,
    /// 无窗口的记录后端，用于测试和 CI
    #[serde(rename = "headless")]
    Headless,
}

/// 资源池与命令队列的容量配置
///
/// 每个容量都是硬上限，创建操作超过上限会返回容量耗尽错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// 命令队列容量
    #[serde(default = "default_max_render_commands")]
    pub max_render_commands: usize,

    /// 顶点缓冲区池容量
    #[serde(default = "default_max_buffers")]
    pub max_vertex_buffers: usize,

    /// 索引缓冲区池容量
    #[serde(default = "default_max_buffers")]
    pub max_index_buffers: usize,

    /// 顶点布局池容量
    #[serde(default = "default_max_buffers")]
    pub max_vertex_layouts: usize,

    /// 顶点着色器池容量
    #[serde(default = "default_max_shaders")]
    pub max_vertex_shaders: usize,

    /// 片段着色器池容量
    #[serde(default = "default_max_shaders")]
    pub max_fragment_shaders: usize,

    /// 着色器程序池容量
    #[serde(default = "default_max_shader_programs")]
    pub max_shader_programs: usize,

    /// 视口池容量
    #[serde(default = "default_max_viewports")]
    pub max_viewports: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "CGEngine".to_string() }
fn default_resizable() -> bool { true }
fn default_backend() -> BackendKind { BackendKind::OpenGl }
fn default_debug() -> bool { cfg!(debug_assertions) }
fn default_vsync() -> bool { true }
fn default_swapchain_buffers() -> u32 { 2 }
fn default_max_render_commands() -> usize { 128 }
fn default_max_buffers() -> usize { 512 }
fn default_max_shaders() -> usize { 512 }
fn default_max_shader_programs() -> usize { 64 }
fn default_max_viewports() -> usize { 8 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "cg_render.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            debug: default_debug(),
            vsync: default_vsync(),
            swapchain_buffers: default_swapchain_buffers(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_render_commands: default_max_render_commands(),
            max_vertex_buffers: default_max_buffers(),
            max_index_buffers: default_max_buffers(),
            max_vertex_layouts: default_max_buffers(),
            max_vertex_shaders: default_max_shaders(),
            max_fragment_shaders: default_max_shaders(),
            max_shader_programs: default_max_shader_programs(),
            max_viewports: default_max_viewports(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use cg_render::core::Config;
    ///
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--d3d11` / `--opengl` / `--headless`: 选择图形后端
    /// - `--debug`: 启用调试输出
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        // 后端选择，后出现的覆盖先出现的
        for arg in &args {
            match arg.as_str() {
                "--d3d11" => self.graphics.backend = BackendKind::Direct3D11,
                "--opengl" => self.graphics.backend = BackendKind::OpenGl,
                "--headless" => self.graphics.backend = BackendKind::Headless,
                "--debug" => self.graphics.debug = true,
                _ => {}
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width) = args.get(idx + 1).and_then(|s| s.parse().ok()) {
                self.window.width = width;
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height) = args.get(idx + 1).and_then(|s| s.parse().ok()) {
                self.window.height = height;
            }
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window.width/height", "Window dimensions must be greater than 0"));
        }

        if !(1..=8).contains(&self.graphics.swapchain_buffers) {
            return Err(invalid("graphics.swapchain_buffers", "Swapchain buffer count must be in 1..=8"));
        }

        let limits = [
            ("limits.max_render_commands", self.limits.max_render_commands),
            ("limits.max_vertex_buffers", self.limits.max_vertex_buffers),
            ("limits.max_index_buffers", self.limits.max_index_buffers),
            ("limits.max_vertex_layouts", self.limits.max_vertex_layouts),
            ("limits.max_vertex_shaders", self.limits.max_vertex_shaders),
            ("limits.max_fragment_shaders", self.limits.max_fragment_shaders),
            ("limits.max_shader_programs", self.limits.max_shader_programs),
            ("limits.max_viewports", self.limits.max_viewports),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(invalid(field, "Capacity must be at least 1"));
            }
            if value > MAX_POOL_CAPACITY {
                return Err(invalid(field, "Capacity must not exceed 65535"));
            }
        }

        // 视口句柄是 u8
        if self.limits.max_viewports > u8::MAX as usize {
            return Err(invalid("limits.max_viewports", "Capacity must not exceed 255"));
        }

        Ok(())
    }
}

/// 任一资源池或命令池的容量上限
pub const MAX_POOL_CAPACITY: usize = u16::MAX as usize;

fn invalid(field: &str, reason: &str) -> super::error::CgRenderError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl BackendKind {
    /// 后端是否已实现（在当前平台上）
    pub fn is_implemented(&self) -> bool {
        match self {
            BackendKind::None | BackendKind::OpenGl | BackendKind::Headless => true,
            BackendKind::Direct3D11 => cfg!(target_os = "windows"),
            BackendKind::Direct3D12 | BackendKind::Vulkan => false,
        }
    }

    /// 后端是否需要一个平台窗口
    pub fn needs_window(&self) -> bool {
        matches!(self, BackendKind::Direct3D11 | BackendKind::OpenGl)
    }

    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::None => "None",
            BackendKind::Direct3D11 => "Direct3D 11",
            BackendKind::Direct3D12 => "Direct3D 12",
            BackendKind::OpenGl => "OpenGL",
            BackendKind::Vulkan => "Vulkan",
            BackendKind::Headless => "Headless",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.backend, BackendKind::OpenGl);
        assert_eq!(config.limits.max_render_commands, 128);
        assert_eq!(config.limits.max_shader_programs, 64);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.max_vertex_layouts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.max_viewports = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_limits_rejected() {
        // 过大的池容量在校验阶段被拒绝，而不是在分配时失败
        let config = Config::from_toml_str("[limits]\nmax_vertex_buffers = 1000000000000").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limits.max_vertex_buffers"));

        let mut config = Config::default();
        config.limits.max_shader_programs = MAX_POOL_CAPACITY;
        assert!(config.validate().is_ok());
        config.limits.max_shader_programs = MAX_POOL_CAPACITY + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [graphics]
            backend = "d3d11"

            [limits]
            max_render_commands = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.graphics.backend, BackendKind::Direct3D11);
        assert_eq!(config.limits.max_render_commands, 16);
        // 未给出的字段使用默认值
        assert_eq!(config.limits.max_vertex_buffers, 512);
        assert_eq!(config.window.title, "CGEngine");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("[graphics]\nbackend = \"metal\"").is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["cg_render", "--headless", "--width", "1024", "--height", "768", "--debug"]);

        assert_eq!(config.graphics.backend, BackendKind::Headless);
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
        assert!(config.graphics.debug);

        // 无法解析的数值被忽略
        config.apply_args(["--width", "wide"]);
        assert_eq!(config.window.width, 1024);
    }

    #[test]
    fn test_backend_kind() {
        assert!(!BackendKind::Vulkan.is_implemented());
        assert!(!BackendKind::Direct3D12.is_implemented());
        assert!(BackendKind::Headless.is_implemented());
        assert!(BackendKind::OpenGl.needs_window());
        assert!(!BackendKind::Headless.needs_window());
        assert_eq!(BackendKind::Direct3D11.name(), "Direct3D 11");
    }
}
