//! 文件读取
//!
//! 着色器源码等资源文件的读取入口。

use std::path::Path;

use tracing::debug;

use super::error::{CgRenderError, Result};

/// 读取整个文件的字节内容
///
/// 空文件视为错误，因为调用方（着色器、顶点数据）都需要非空输入。
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    if bytes.is_empty() {
        return Err(CgRenderError::Runtime(format!(
            "File {} is empty",
            path.display()
        )));
    }

    debug!(path = %path.display(), size = bytes.len(), "File loaded");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file() {
        let err = read_file("this/file/does/not/exist.glsl").unwrap_err();
        assert!(matches!(err, CgRenderError::Io(_)));
    }

    #[test]
    fn test_read_file() {
        let path = std::env::temp_dir().join("cg_render_fileio_test.txt");
        std::fs::write(&path, b"void main() {}").unwrap();
        assert_eq!(read_file(&path).unwrap(), b"void main() {}");

        std::fs::write(&path, b"").unwrap();
        assert!(read_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
