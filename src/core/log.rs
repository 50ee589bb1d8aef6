//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//!
//! 与进程级的全局订阅者不同，这里的 [`Logger`] 是一个显式传递的协作对象：
//! 渲染器在构造时接收它，并在每个公开入口处通过 [`Logger::enter`]
//! 把它设为当前线程的默认订阅者。这样多个渲染器（例如测试中）可以
//! 拥有各自独立的日志输出。
//!
//! # 使用示例
//!
//! ```no_run
//! use cg_render::core::{config::LoggingConfig, log::Logger};
//!
//! let logger = Logger::from_config(&LoggingConfig::default());
//! let _guard = logger.enter();
//! tracing::info!(width = 800, height = 600, "Window created");
//! ```

use std::path::Path;

use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::config::{LogLevel, LoggingConfig};
use super::error::{CgRenderError, Result};

/// 显式传递的日志协作对象
///
/// 克隆开销很小（内部是引用计数的 `Dispatch`）。
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// 根据日志配置构建
    ///
    /// 控制台输出始终启用；`file_output` 为真时额外写入按天滚动的日志文件。
    pub fn from_config(config: &LoggingConfig) -> Self {
        let filter = env_filter(config.level);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(true);

        let dispatch = if config.file_output {
            let path = Path::new(&config.log_file);
            let directory = path.parent().unwrap_or(Path::new("."));
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("cg_render.log");

            let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, filename);

            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false) // 文件不需要 ANSI 颜色
                .with_writer(file_appender);

            Dispatch::new(
                tracing_subscriber::registry()
                    .with(filter)
                    .with(console_layer)
                    .with(file_layer),
            )
        } else {
            Dispatch::new(tracing_subscriber::registry().with(filter).with(console_layer))
        };

        Self { dispatch }
    }

    /// 仅控制台输出的日志对象
    pub fn console(level: LogLevel) -> Self {
        Self::from_config(&LoggingConfig {
            level,
            ..LoggingConfig::default()
        })
    }

    /// 不输出任何内容的日志对象（用于测试）
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// 将此日志对象设为当前线程的默认订阅者，守卫释放时恢复
    pub fn enter(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    /// 安装为进程级全局订阅者
    ///
    /// 只能成功调用一次，再次调用返回 [`CgRenderError::Log`]。
    pub fn install_global(&self) -> Result<()> {
        dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| CgRenderError::Log(e.to_string()))
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::console(LogLevel::Info)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

fn env_filter(level: LogLevel) -> EnvFilter {
    match level {
        LogLevel::Trace => EnvFilter::new("trace"),
        LogLevel::Debug => EnvFilter::new("debug"),
        LogLevel::Info => EnvFilter::new("info"),
        LogLevel::Warn => EnvFilter::new("warn"),
        LogLevel::Error => EnvFilter::new("error"),
    }
}

/// 引擎核心日志 - Info 级别
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "cg_render::engine", $($arg)*)
    };
}

/// 引擎核心日志 - Warn 级别
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "cg_render::engine", $($arg)*)
    };
}

/// 引擎核心日志 - Error 级别
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "cg_render::engine", $($arg)*)
    };
}

/// 日志级别转换
impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_scoped_logger() {
        let logger = Logger::console(LogLevel::Warn);
        {
            let _guard = logger.enter();
            // 当前线程的默认订阅者只接受 warn 及以上
            assert!(!tracing::enabled!(Level::INFO));
            assert!(tracing::enabled!(Level::WARN));
        }

        let disabled = Logger::disabled();
        let _guard = disabled.enter();
        assert!(!tracing::enabled!(Level::ERROR));
    }
}
