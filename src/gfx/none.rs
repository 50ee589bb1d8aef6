//! 空后端
//!
//! 选择 `BackendKind::None` 时使用。所有创建操作都失败，执行操作什么也不做。

use crate::core::config::BackendKind;
use crate::core::error::{ResourceError, Result};
use crate::renderer::command::{ClearFlags, Rgba};
use crate::renderer::layout::VertexLayout;
use crate::renderer::resource::{Buffer, BufferDesc, LayoutResource, Shader, ShaderDesc, ShaderProgram, Viewport};

use super::backend::{DeviceProperties, NativeHandle, RenderBackend};

#[derive(Debug, Default)]
pub struct NullBackend {
    properties: DeviceProperties,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn unsupported<T>() -> Result<T> {
        Err(ResourceError::UnsupportedBackend(BackendKind::None).into())
    }
}

impl RenderBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::None
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create_buffer(&mut self, _desc: &BufferDesc, _data: &[u8]) -> Result<NativeHandle> {
        Self::unsupported()
    }

    fn create_shader(&mut self, _desc: &ShaderDesc, _source: &[u8]) -> Result<NativeHandle> {
        Self::unsupported()
    }

    fn create_program(&mut self, _shaders: &[&Shader]) -> Result<NativeHandle> {
        Self::unsupported()
    }

    fn create_vertex_layout(
        &mut self,
        _layout: &VertexLayout,
        _vertex_buffer: &Buffer,
        _vertex_shader: Option<&Shader>,
    ) -> Result<NativeHandle> {
        Self::unsupported()
    }

    fn release(&mut self, _handle: NativeHandle) {}

    fn clear_view(&mut self, _view: u8, _flags: ClearFlags, _color: Rgba) -> Result<()> {
        Ok(())
    }

    fn set_viewport(&mut self, _viewport: &Viewport) -> Result<()> {
        Ok(())
    }

    fn bind_program(&mut self, _program: &ShaderProgram) -> Result<()> {
        Ok(())
    }

    fn bind_shader(&mut self, _shader: &Shader) -> Result<()> {
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Buffer, _layout: Option<&LayoutResource>) -> Result<()> {
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Buffer) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, _count: u32, _start: u32) -> Result<()> {
        Ok(())
    }

    fn draw_indexed(&mut self, _count: u32, _start: u32) -> Result<()> {
        Ok(())
    }

    fn submit(&mut self, _view: u8, _program: &ShaderProgram) -> Result<()> {
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_rejects_creation() {
        let mut backend = NullBackend::new();
        let err = backend.create_buffer(&BufferDesc::vertex(1, 4), &[0; 4]).unwrap_err();
        assert_eq!(err.to_string(), "Resource error: Backend None is not implemented");
        assert!(backend.clear_view(0, ClearFlags::COLOR, Rgba::default()).is_ok());
        assert!(backend.present().is_ok());
    }
}
