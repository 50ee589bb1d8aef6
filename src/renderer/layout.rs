//! 顶点布局计算
//!
//! 根据有序的 `{属性, 格式}` 列表计算每个元素的字节偏移、大小以及顶点步长。
//!
//! # 计算规则
//!
//! - `size[i] = format[i].size()`
//! - `offset[0] = 0`，`offset[i] = offset[i-1] + size[i-1]`
//! - `stride = Σ size[i]`
//!
//! 元素之间没有填充，顺序即声明顺序。

use crate::core::error::{ResourceError, Result};

/// 单个顶点布局允许的最大元素数量
pub const MAX_VERTEX_ELEMENTS: usize = 16;

/// 顶点元素的数据格式
///
/// 每个分量固定为 4 字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    UInt,
    UInt2,
    UInt3,
    UInt4,
    Float,
    Float2,
    Float3,
    Float4,
}

impl VertexFormat {
    /// 分量数量（1-4）
    pub fn component_count(self) -> u32 {
        match self {
            VertexFormat::UInt | VertexFormat::Float => 1,
            VertexFormat::UInt2 | VertexFormat::Float2 => 2,
            VertexFormat::UInt3 | VertexFormat::Float3 => 3,
            VertexFormat::UInt4 | VertexFormat::Float4 => 4,
        }
    }

    /// 字节大小
    pub fn size(self) -> u32 {
        self.component_count() * 4
    }

    /// 是否为浮点格式
    pub fn is_float(self) -> bool {
        matches!(
            self,
            VertexFormat::Float | VertexFormat::Float2 | VertexFormat::Float3 | VertexFormat::Float4
        )
    }
}

/// 顶点属性语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    Tangent,
    Color,
    TexCoord0,
    TexCoord1,
}

impl VertexAttribute {
    /// HLSL 语义名
    pub fn semantic_name(self) -> &'static str {
        match self {
            VertexAttribute::Position => "POSITION",
            VertexAttribute::Normal => "NORMAL",
            VertexAttribute::Tangent => "TANGENT",
            VertexAttribute::Color => "COLOR",
            VertexAttribute::TexCoord0 | VertexAttribute::TexCoord1 => "TEXCOORD",
        }
    }

    /// HLSL 语义索引
    pub fn semantic_index(self) -> u32 {
        match self {
            VertexAttribute::TexCoord1 => 1,
            _ => 0,
        }
    }
}

/// 布局声明中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElementDesc {
    pub attribute: VertexAttribute,
    pub format: VertexFormat,
}

impl VertexElementDesc {
    pub const fn new(attribute: VertexAttribute, format: VertexFormat) -> Self {
        Self { attribute, format }
    }
}

/// 计算后的顶点元素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    pub attribute: VertexAttribute,
    pub format: VertexFormat,
    /// 相对顶点起始处的字节偏移
    pub offset: u32,
    /// 字节大小
    pub size: u32,
}

/// 顶点布局
///
/// 创建后不可变。元素在数组中的下标同时作为 OpenGL 的属性位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    elements: Vec<VertexElement>,
    stride: u32,
}

impl VertexLayout {
    /// 根据声明计算布局
    ///
    /// # 参数
    ///
    /// * `descs` - 有序的元素声明，数量必须在 `1..=MAX_VERTEX_ELEMENTS` 之间
    ///
    /// # 返回值
    ///
    /// 计算完成的布局；声明为空或超过上限时返回 `ResourceError::InvalidInput`
    pub fn compute(descs: &[VertexElementDesc]) -> Result<Self> {
        if descs.is_empty() {
            return Err(ResourceError::InvalidInput("vertex layout has no elements".to_string()).into());
        }

        if descs.len() > MAX_VERTEX_ELEMENTS {
            return Err(ResourceError::InvalidInput(format!(
                "vertex layout has {} elements (max {})",
                descs.len(),
                MAX_VERTEX_ELEMENTS
            ))
            .into());
        }

        let mut offset = 0u32;
        let elements = descs
            .iter()
            .map(|desc| {
                let size = desc.format.size();
                let element = VertexElement {
                    attribute: desc.attribute,
                    format: desc.format,
                    offset,
                    size,
                };
                offset += size;
                element
            })
            .collect();

        Ok(Self {
            elements,
            stride: offset,
        })
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// 顶点步长（字节）
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
