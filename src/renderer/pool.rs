//! 固定容量的资源池
//!
//! 每种资源一个只追加的数组，容量上限在构造时确定，存储按需增长。

use crate::core::config::LimitsConfig;
use crate::core::error::{ResourceError, Result};

use super::resource::{
    Buffer, IndexBufferHandle, LayoutResource, ProgramHandle, Shader, ShaderHandle, ShaderProgram,
    ShaderStage, VertexBufferHandle, VertexLayoutHandle, Viewport, ViewportHandle,
};

/// 只追加的固定容量数组
///
/// 下标即句柄。`push` 在已满时返回 `CapacityExhausted` 且不修改池。
#[derive(Debug)]
pub struct Pool<T> {
    label: &'static str,
    items: Vec<T>,
    capacity: usize,
}

impl<T> Pool<T> {
    pub fn with_capacity(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            items: Vec::new(),
            capacity,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// 检查是否还能再放入一项
    pub fn ensure_space(&self) -> Result<()> {
        if self.is_full() {
            return Err(ResourceError::CapacityExhausted {
                pool: self.label,
                capacity: self.capacity,
            }
            .into());
        }
        Ok(())
    }

    /// 追加一项并返回其下标
    pub fn push(&mut self, item: T) -> Result<u32> {
        self.ensure_space()?;
        let index = self.items.len() as u32;
        self.items.push(item);
        Ok(index)
    }

    /// 按下标取出，越界返回 `InvalidHandle`
    pub fn get(&self, index: u32) -> Result<&T> {
        let live = self.items.len();
        self.items.get(index as usize).ok_or_else(|| {
            ResourceError::InvalidHandle {
                kind: self.label,
                index,
                live,
            }
            .into()
        })
    }

    pub fn get_mut(&mut self, index: u32) -> Result<&mut T> {
        let live = self.items.len();
        let kind = self.label;
        self.items
            .get_mut(index as usize)
            .ok_or_else(|| ResourceError::InvalidHandle { kind, index, live }.into())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// 取出全部项并清空池（整池拆除）
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }
}

/// 按阶段分开的着色器池
#[derive(Debug)]
pub struct ShaderPool {
    pub vertex: Pool<Shader>,
    pub fragment: Pool<Shader>,
}

impl ShaderPool {
    pub fn stage(&self, stage: ShaderStage) -> &Pool<Shader> {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    pub fn stage_mut(&mut self, stage: ShaderStage) -> &mut Pool<Shader> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }

    pub fn get(&self, handle: ShaderHandle) -> Result<&Shader> {
        self.stage(handle.stage).get(handle.index)
    }

    /// 解析句柄并要求指定阶段
    pub fn get_stage(&self, handle: ShaderHandle, expected: ShaderStage) -> Result<&Shader> {
        if handle.stage != expected {
            return Err(ResourceError::StageMismatch {
                expected: expected.name(),
                found: handle.stage.name(),
            }
            .into());
        }
        self.get(handle)
    }

    pub fn len(&self) -> usize {
        self.vertex.len() + self.fragment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 渲染器拥有的全部资源池
#[derive(Debug)]
pub struct ResourcePools {
    pub vertex_buffers: Pool<Buffer>,
    pub index_buffers: Pool<Buffer>,
    pub vertex_layouts: Pool<LayoutResource>,
    pub shaders: ShaderPool,
    pub programs: Pool<ShaderProgram>,
    pub viewports: Pool<Viewport>,
}

impl ResourcePools {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            vertex_buffers: Pool::with_capacity("vertex buffer", limits.max_vertex_buffers),
            index_buffers: Pool::with_capacity("index buffer", limits.max_index_buffers),
            vertex_layouts: Pool::with_capacity("vertex layout", limits.max_vertex_layouts),
            shaders: ShaderPool {
                vertex: Pool::with_capacity("vertex shader", limits.max_vertex_shaders),
                fragment: Pool::with_capacity("fragment shader", limits.max_fragment_shaders),
            },
            programs: Pool::with_capacity("shader program", limits.max_shader_programs),
            viewports: Pool::with_capacity("viewport", limits.max_viewports),
        }
    }

    pub fn vertex_buffer(&self, handle: VertexBufferHandle) -> Result<&Buffer> {
        self.vertex_buffers.get(handle.index())
    }

    pub fn index_buffer(&self, handle: IndexBufferHandle) -> Result<&Buffer> {
        self.index_buffers.get(handle.index())
    }

    pub fn vertex_layout(&self, handle: VertexLayoutHandle) -> Result<&LayoutResource> {
        self.vertex_layouts.get(handle.index())
    }

    pub fn program(&self, handle: ProgramHandle) -> Result<&ShaderProgram> {
        self.programs.get(handle.index())
    }

    pub fn viewport(&self, handle: ViewportHandle) -> Result<&Viewport> {
        self.viewports.get(handle.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_push_and_get() {
        let mut pool: Pool<u32> = Pool::with_capacity("test", 3);
        assert_eq!(pool.push(10).unwrap(), 0);
        assert_eq!(pool.push(20).unwrap(), 1);
        assert_eq!(*pool.get(1).unwrap(), 20);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pool_capacity_exhausted() {
        let mut pool: Pool<u32> = Pool::with_capacity("test", 2);
        pool.push(1).unwrap();
        pool.push(2).unwrap();

        let err = pool.push(3).unwrap_err();
        assert!(err.is_capacity_exhausted());
        // 失败不改变池
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pool_large_capacity_is_lazy() {
        // 容量只是上限，构造时不分配
        let mut pool: Pool<u64> = Pool::with_capacity("test", usize::MAX);
        assert_eq!(pool.capacity(), usize::MAX);
        assert_eq!(pool.push(7).unwrap(), 0);
        assert_eq!(*pool.get(0).unwrap(), 7);
    }

    #[test]
    fn test_pool_out_of_range() {
        let mut pool: Pool<u32> = Pool::with_capacity("test", 4);
        pool.push(1).unwrap();
        let err = pool.get(1).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(pool.get_mut(7).is_err());
    }

    #[test]
    fn test_pool_drain() {
        let mut pool: Pool<u32> = Pool::with_capacity("test", 4);
        pool.push(1).unwrap();
        pool.push(2).unwrap();
        assert_eq!(pool.drain(), vec![1, 2]);
        assert!(pool.is_empty());
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_shader_stage_check() {
        let pools = ResourcePools::new(&LimitsConfig::default());
        let handle = ShaderHandle {
            stage: ShaderStage::Fragment,
            index: 0,
        };
        let err = pools.shaders.get_stage(handle, ShaderStage::Vertex).unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::CgRenderError::Resource(ResourceError::StageMismatch { .. })
        ));
    }
}
