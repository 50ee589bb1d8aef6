//! 核心功能模块
//!
//! 本模块提供了渲染核心的基础功能，包括日志系统、配置管理、错误处理和文件读取。
//! 这些模块独立于具体的图形 API，可以在任何渲染后端中使用。
//!
//! # 模块组织
//!
//! - `log`：日志系统，提供显式传递的结构化日志对象
//! - `config`：配置管理，支持从配置文件加载窗口、后端和容量设置
//! - `error`：错误处理，定义统一的错误类型
//! - `fileio`：文件读取

pub mod config;
pub mod error;
pub mod fileio;
pub mod log;

// 重新导出常用类型，方便使用
pub use config::{BackendKind, Config, LimitsConfig};
pub use error::{CgRenderError, Result};
pub use log::Logger;
