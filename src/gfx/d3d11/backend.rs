//! Direct3D 11 后端
//!
//! COM 对象保存在后端内部的对象表中，`NativeHandle::D3d11` 只携带槽位号。
//! Direct3D 11 没有程序对象，着色器程序记录为一对着色器槽位，
//! 绑定时分别设置到 VS / PS 阶段。

use std::ffi::{c_void, CString};

use tracing::{debug, info};
use windows::core::PCSTR;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::config::BackendKind;
use crate::core::error::{CgRenderError, GraphicsError, ResourceError, Result};
use crate::gfx::backend::{
    foreign_handle, vertex_stride, DeviceProperties, NativeHandle, ObjectKind, RenderBackend, SwapchainConfig,
};
use crate::renderer::command::{ClearFlags, Rgba};
use crate::renderer::layout::{VertexFormat, VertexLayout};
use crate::renderer::resource::{
    Buffer, BufferDesc, BufferKind, BufferUsage, LayoutResource, Shader, ShaderDesc, ShaderProgram, ShaderStage,
    Viewport,
};

use super::context::D3d11Context;

/// 对象表中的一项
enum D3dObject {
    Buffer(ID3D11Buffer),
    VertexShader {
        shader: ID3D11VertexShader,
        /// 创建输入布局时需要输入签名
        bytecode: Vec<u8>,
    },
    PixelShader(ID3D11PixelShader),
    Program {
        vertex: Option<u32>,
        pixel: Option<u32>,
    },
    InputLayout(ID3D11InputLayout),
}

/// Direct3D 11 后端
pub struct D3d11Backend {
    context: Option<D3d11Context>,
    properties: DeviceProperties,
    objects: Vec<Option<D3dObject>>,
    debug: bool,
}

impl D3d11Backend {
    /// 在窗口上创建设备、上下文与交换链
    pub fn new(hwnd: HWND, swapchain: SwapchainConfig, debug: bool) -> Result<Self> {
        let context = D3d11Context::create(hwnd, &swapchain, debug)?;
        let properties = context.properties().clone();

        info!(
            width = swapchain.width,
            height = swapchain.height,
            vsync = swapchain.vsync,
            "Direct3D 11 backend initialized"
        );

        Ok(Self {
            context: Some(context),
            properties,
            objects: Vec::new(),
            debug,
        })
    }

    fn context(&self) -> Result<&D3d11Context> {
        self.context
            .as_ref()
            .ok_or_else(|| CgRenderError::Runtime("Direct3D 11 device has been destroyed".to_string()))
    }

    fn insert(&mut self, kind: ObjectKind, object: D3dObject) -> NativeHandle {
        let slot = self.objects.len() as u32;
        self.objects.push(Some(object));
        NativeHandle::D3d11 { kind, slot }
    }

    /// 按句柄取出对象，同时检查对象类别
    fn object(&self, handle: &NativeHandle, expected: ObjectKind) -> Result<&D3dObject> {
        let slot = match *handle {
            NativeHandle::D3d11 { kind, slot } if kind == expected => slot,
            NativeHandle::D3d11 { kind, .. } => {
                return Err(GraphicsError::CommandExecution(format!(
                    "expected a {:?} object, got {:?}",
                    expected, kind
                ))
                .into())
            }
            ref other => return Err(foreign_handle("Direct3D 11", other)),
        };

        self.objects
            .get(slot as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| GraphicsError::CommandExecution(format!("{:?} slot {} was released", expected, slot)).into())
    }

    fn buffer(&self, handle: &NativeHandle) -> Result<&ID3D11Buffer> {
        match self.object(handle, ObjectKind::Buffer)? {
            D3dObject::Buffer(buffer) => Ok(buffer),
            _ => Err(GraphicsError::CommandExecution("slot does not hold a buffer".to_string()).into()),
        }
    }

    fn slot_object(&self, slot: u32) -> Option<&D3dObject> {
        self.objects.get(slot as usize).and_then(Option::as_ref)
    }

    fn render_target_view(&self, view: u8) -> Result<ID3D11RenderTargetView> {
        self.context()?
            .render_target_views
            .get(view as usize)
            .cloned()
            .ok_or_else(|| GraphicsError::InvalidView(view).into())
    }

    fn set_shader_slot(&self, slot: u32) -> Result<()> {
        let context = self.context()?;
        match self.slot_object(slot) {
            Some(D3dObject::VertexShader { shader, .. }) => unsafe { context.immediate.VSSetShader(shader, None) },
            Some(D3dObject::PixelShader(shader)) => unsafe { context.immediate.PSSetShader(shader, None) },
            _ => {
                return Err(GraphicsError::CommandExecution(format!("shader slot {} was released", slot)).into());
            }
        }
        Ok(())
    }
}

fn shader_kind(stage: ShaderStage) -> ObjectKind {
    match stage {
        ShaderStage::Vertex => ObjectKind::VertexShader,
        ShaderStage::Fragment => ObjectKind::FragmentShader,
    }
}

fn shader_target(stage: ShaderStage) -> PCSTR {
    match stage {
        ShaderStage::Vertex => windows::core::s!("vs_5_0"),
        ShaderStage::Fragment => windows::core::s!("ps_5_0"),
    }
}

fn bind_flags(kind: BufferKind) -> u32 {
    let flag = match kind {
        BufferKind::Vertex => D3D11_BIND_VERTEX_BUFFER,
        BufferKind::Index => D3D11_BIND_INDEX_BUFFER,
        BufferKind::Constant => D3D11_BIND_CONSTANT_BUFFER,
    };
    flag.0 as u32
}

fn element_format(format: VertexFormat) -> DXGI_FORMAT {
    match format {
        VertexFormat::UInt => DXGI_FORMAT_R32_UINT,
        VertexFormat::UInt2 => DXGI_FORMAT_R32G32_UINT,
        VertexFormat::UInt3 => DXGI_FORMAT_R32G32B32_UINT,
        VertexFormat::UInt4 => DXGI_FORMAT_R32G32B32A32_UINT,
        VertexFormat::Float => DXGI_FORMAT_R32_FLOAT,
        VertexFormat::Float2 => DXGI_FORMAT_R32G32_FLOAT,
        VertexFormat::Float3 => DXGI_FORMAT_R32G32B32_FLOAT,
        VertexFormat::Float4 => DXGI_FORMAT_R32G32B32A32_FLOAT,
    }
}

fn index_format(stride: u32) -> Result<DXGI_FORMAT> {
    match stride {
        2 => Ok(DXGI_FORMAT_R16_UINT),
        4 => Ok(DXGI_FORMAT_R32_UINT),
        other => Err(ResourceError::InvalidInput(format!("index stride must be 2 or 4, got {}", other)).into()),
    }
}

/// 把 blob 内容拷贝为字节数组
unsafe fn blob_bytes(blob: &ID3DBlob) -> Vec<u8> {
    std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()).to_vec()
}

impl RenderBackend for D3d11Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct3D11
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create_buffer(&mut self, desc: &BufferDesc, data: &[u8]) -> Result<NativeHandle> {
        let device = self.context()?.device.clone();

        if desc.kind == BufferKind::Constant && data.len() % 16 != 0 {
            return Err(ResourceError::InvalidInput(format!(
                "constant buffer size must be a multiple of 16, got {}",
                data.len()
            ))
            .into());
        }

        let (usage, cpu_access) = match desc.usage {
            BufferUsage::Static => (D3D11_USAGE_IMMUTABLE, 0),
            BufferUsage::Dynamic => (D3D11_USAGE_DYNAMIC, D3D11_CPU_ACCESS_WRITE.0 as u32),
        };

        let buffer_desc = D3D11_BUFFER_DESC {
            ByteWidth: data.len() as u32,
            Usage: usage,
            BindFlags: bind_flags(desc.kind),
            CPUAccessFlags: cpu_access,
            MiscFlags: 0,
            StructureByteStride: 0,
        };
        let initial_data = D3D11_SUBRESOURCE_DATA {
            pSysMem: data.as_ptr() as *const c_void,
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        };

        let mut buffer: Option<ID3D11Buffer> = None;
        unsafe { device.CreateBuffer(&buffer_desc, Some(&initial_data), Some(&mut buffer)) }
            .map_err(|e| GraphicsError::ResourceCreation(format!("CreateBuffer failed: {}", e)))?;
        let buffer =
            buffer.ok_or_else(|| GraphicsError::ResourceCreation("CreateBuffer returned null".to_string()))?;

        Ok(self.insert(ObjectKind::Buffer, D3dObject::Buffer(buffer)))
    }

    fn create_shader(&mut self, desc: &ShaderDesc, source: &[u8]) -> Result<NativeHandle> {
        let device = self.context()?.device.clone();

        let entry_point = CString::new(desc.entry_point.as_str()).map_err(|_| {
            ResourceError::InvalidInput(format!("entry point {} contains a NUL byte", desc.entry_point))
        })?;

        let flags = if self.debug {
            D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION | D3DCOMPILE_ENABLE_STRICTNESS
        } else {
            D3DCOMPILE_ENABLE_STRICTNESS
        };

        let mut blob: Option<ID3DBlob> = None;
        let mut error_blob: Option<ID3DBlob> = None;
        let compiled = unsafe {
            D3DCompile(
                source.as_ptr() as *const c_void,
                source.len(),
                None,
                None,
                None,
                PCSTR(entry_point.as_ptr() as *const u8),
                shader_target(desc.stage),
                flags,
                0,
                &mut blob,
                Some(&mut error_blob),
            )
        };

        if let Err(e) = compiled {
            let message = match &error_blob {
                Some(errors) => String::from_utf8_lossy(unsafe { &blob_bytes(errors) }).into_owned(),
                None => e.to_string(),
            };
            return Err(GraphicsError::ShaderCompilation(format!(
                "{} shader {}: {}",
                desc.stage.name(),
                desc.source_name,
                message
            ))
            .into());
        }

        let blob = blob.ok_or_else(|| GraphicsError::ShaderCompilation("D3DCompile returned no bytecode".to_string()))?;
        let bytecode = unsafe { blob_bytes(&blob) };

        let object = match desc.stage {
            ShaderStage::Vertex => {
                let mut shader: Option<ID3D11VertexShader> = None;
                unsafe { device.CreateVertexShader(&bytecode, None::<&ID3D11ClassLinkage>, Some(&mut shader)) }
                    .map_err(|e| GraphicsError::ShaderCompilation(format!("CreateVertexShader failed: {}", e)))?;
                let shader = shader
                    .ok_or_else(|| GraphicsError::ShaderCompilation("CreateVertexShader returned null".to_string()))?;
                D3dObject::VertexShader { shader, bytecode }
            }
            ShaderStage::Fragment => {
                let mut shader: Option<ID3D11PixelShader> = None;
                unsafe { device.CreatePixelShader(&bytecode, None::<&ID3D11ClassLinkage>, Some(&mut shader)) }
                    .map_err(|e| GraphicsError::ShaderCompilation(format!("CreatePixelShader failed: {}", e)))?;
                let shader = shader
                    .ok_or_else(|| GraphicsError::ShaderCompilation("CreatePixelShader returned null".to_string()))?;
                D3dObject::PixelShader(shader)
            }
        };

        debug!(source = %desc.source_name, entry = %desc.entry_point, "HLSL shader compiled");
        Ok(self.insert(shader_kind(desc.stage), object))
    }

    fn create_program(&mut self, shaders: &[&Shader]) -> Result<NativeHandle> {
        self.context()?;

        let mut vertex = None;
        let mut pixel = None;
        for shader in shaders {
            let kind = shader_kind(shader.desc.stage);
            self.object(&shader.native, kind)?;
            let NativeHandle::D3d11 { slot, .. } = shader.native else {
                return Err(foreign_handle("Direct3D 11", &shader.native));
            };
            match shader.desc.stage {
                ShaderStage::Vertex => vertex = Some(slot),
                ShaderStage::Fragment => pixel = Some(slot),
            }
        }

        if vertex.is_none() && pixel.is_none() {
            return Err(GraphicsError::ProgramLink("program has no shaders".to_string()).into());
        }

        Ok(self.insert(ObjectKind::Program, D3dObject::Program { vertex, pixel }))
    }

    fn create_vertex_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_buffer: &Buffer,
        vertex_shader: Option<&Shader>,
    ) -> Result<NativeHandle> {
        let device = self.context()?.device.clone();
        self.buffer(&vertex_buffer.native)?;

        let shader = vertex_shader
            .ok_or_else(|| GraphicsError::Requirement("a vertex shader input signature for D3D11 layouts".to_string()))?;
        let D3dObject::VertexShader { bytecode, .. } = self.object(&shader.native, ObjectKind::VertexShader)? else {
            return Err(GraphicsError::CommandExecution("slot does not hold a vertex shader".to_string()).into());
        };

        let semantic_names = layout
            .elements()
            .iter()
            .map(|e| CString::new(e.attribute.semantic_name()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ResourceError::InvalidInput(e.to_string()))?;

        let input_elements: Vec<D3D11_INPUT_ELEMENT_DESC> = layout
            .elements()
            .iter()
            .zip(&semantic_names)
            .map(|(element, name)| D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(name.as_ptr() as *const u8),
                SemanticIndex: element.attribute.semantic_index(),
                Format: element_format(element.format),
                InputSlot: 0,
                AlignedByteOffset: element.offset,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            })
            .collect();

        let mut input_layout: Option<ID3D11InputLayout> = None;
        unsafe { device.CreateInputLayout(&input_elements, bytecode, Some(&mut input_layout)) }
            .map_err(|e| GraphicsError::ResourceCreation(format!("CreateInputLayout failed: {}", e)))?;
        let input_layout = input_layout
            .ok_or_else(|| GraphicsError::ResourceCreation("CreateInputLayout returned null".to_string()))?;

        Ok(self.insert(ObjectKind::VertexLayout, D3dObject::InputLayout(input_layout)))
    }

    fn release(&mut self, handle: NativeHandle) {
        let NativeHandle::D3d11 { slot, .. } = handle else {
            return;
        };
        // 丢弃 COM 引用即释放
        if let Some(entry) = self.objects.get_mut(slot as usize) {
            entry.take();
        }
    }

    fn clear_view(&mut self, view: u8, flags: ClearFlags, color: Rgba) -> Result<()> {
        let target = self.render_target_view(view)?;
        let context = self.context()?;

        unsafe {
            context
                .immediate
                .OMSetRenderTargets(Some(&[Some(target.clone())]), None::<&ID3D11DepthStencilView>);
            if flags.contains(ClearFlags::COLOR) {
                context.immediate.ClearRenderTargetView(&target, &color.to_array());
            }
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        let context = self.context()?;
        let native = D3D11_VIEWPORT {
            TopLeftX: viewport.x,
            TopLeftY: viewport.y,
            Width: viewport.width,
            Height: viewport.height,
            MinDepth: viewport.min_depth,
            MaxDepth: viewport.max_depth,
        };
        unsafe { context.immediate.RSSetViewports(Some(&[native])) };
        Ok(())
    }

    fn bind_program(&mut self, program: &ShaderProgram) -> Result<()> {
        let D3dObject::Program { vertex, pixel } = *self.object(&program.native, ObjectKind::Program)? else {
            return Err(GraphicsError::CommandExecution("slot does not hold a program".to_string()).into());
        };

        if let Some(slot) = vertex {
            self.set_shader_slot(slot)?;
        }
        if let Some(slot) = pixel {
            self.set_shader_slot(slot)?;
        }
        Ok(())
    }

    fn bind_shader(&mut self, shader: &Shader) -> Result<()> {
        self.object(&shader.native, shader_kind(shader.desc.stage))?;
        let NativeHandle::D3d11 { slot, .. } = shader.native else {
            return Err(foreign_handle("Direct3D 11", &shader.native));
        };
        self.set_shader_slot(slot)
    }

    fn bind_vertex_buffer(&mut self, buffer: &Buffer, layout: Option<&LayoutResource>) -> Result<()> {
        let native = self.buffer(&buffer.native)?.clone();
        let input_layout = match layout {
            Some(layout) => match self.object(&layout.native, ObjectKind::VertexLayout)? {
                D3dObject::InputLayout(input_layout) => Some(input_layout.clone()),
                _ => None,
            },
            None => None,
        };

        let stride = vertex_stride(buffer, layout);
        let offset = 0u32;
        let buffers = [Some(native)];
        let context = self.context()?;

        unsafe {
            if let Some(input_layout) = &input_layout {
                context.immediate.IASetInputLayout(input_layout);
            }
            context
                .immediate
                .IASetVertexBuffers(0, 1, Some(buffers.as_ptr()), Some(&stride), Some(&offset));
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        let format = index_format(buffer.desc.stride)?;
        let native = self.buffer(&buffer.native)?;
        let context = self.context()?;
        unsafe { context.immediate.IASetIndexBuffer(native, format, 0) };
        Ok(())
    }

    fn draw(&mut self, count: u32, start: u32) -> Result<()> {
        let context = self.context()?;
        unsafe { context.immediate.Draw(count, start) };
        Ok(())
    }

    fn draw_indexed(&mut self, count: u32, start: u32) -> Result<()> {
        let context = self.context()?;
        unsafe { context.immediate.DrawIndexed(count, start, 0) };
        Ok(())
    }

    fn submit(&mut self, view: u8, program: &ShaderProgram) -> Result<()> {
        self.render_target_view(view)?;
        self.bind_program(program)
    }

    fn present(&mut self) -> Result<()> {
        self.context
            .as_mut()
            .ok_or_else(|| CgRenderError::Runtime("Direct3D 11 device has been destroyed".to_string()))?
            .present()
    }

    fn shutdown(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        let live = self.objects.iter().filter(|o| o.is_some()).count();
        if live > 0 {
            debug!(live, "Releasing remaining Direct3D 11 objects");
        }
        self.objects.clear();
        context.destroy();
    }
}

impl Drop for D3d11Backend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
