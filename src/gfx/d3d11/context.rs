//! Direct3D 11 设备与上下文
//!
//! # 初始化流程
//!
//! 1. `D3D11CreateDeviceAndSwapChain` 创建设备、立即上下文和交换链
//! 2. 从交换链取回后台缓冲区并创建渲染目标视图
//! 3. 查询适配器信息（显存、供应商）
//! 4. 调试模式下取得 `ID3D11InfoQueue`，每帧呈现后转储调试消息
//!
//! 销毁顺序与创建相反：视图、交换链、上下文，最后是设备。

use tracing::{debug, error, info, trace, warn};
use windows::core::Interface;
use windows::Win32::Foundation::{HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::{DeviceProperties, PresentFn, SwapchainConfig};

/// Direct3D 11 上下文
pub struct D3d11Context {
    pub device: ID3D11Device,
    pub immediate: ID3D11DeviceContext,
    swapchain: IDXGISwapChain,
    /// 渲染目标视图，下标即视图编号
    pub render_target_views: Vec<ID3D11RenderTargetView>,
    info_queue: Option<ID3D11InfoQueue>,
    properties: DeviceProperties,
    present: PresentFn,
    debug: bool,
}

impl D3d11Context {
    /// 创建设备、上下文和交换链，并绑定到窗口
    ///
    /// # 参数
    ///
    /// * `hwnd` - 原生窗口句柄
    /// * `config` - 交换链配置
    /// * `debug` - 是否启用调试层
    pub fn create(hwnd: HWND, config: &SwapchainConfig, debug: bool) -> Result<Self> {
        let flags = if debug {
            D3D11_CREATE_DEVICE_DEBUG
        } else {
            D3D11_CREATE_DEVICE_FLAG(0)
        };

        let swapchain_desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: config.width,
                Height: config.height,
                RefreshRate: DXGI_RATIONAL {
                    Numerator: 0,
                    Denominator: 1,
                },
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            // FLIP 模型至少需要两个缓冲
            BufferCount: config.buffer_count.max(2),
            OutputWindow: hwnd,
            Windowed: config.windowed.into(),
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            Flags: 0,
        };

        let mut swapchain: Option<IDXGISwapChain> = None;
        let mut device: Option<ID3D11Device> = None;
        let mut immediate: Option<ID3D11DeviceContext> = None;
        let mut feature_level = D3D_FEATURE_LEVEL::default();

        unsafe {
            D3D11CreateDeviceAndSwapChain(
                None::<&IDXGIAdapter>,
                D3D_DRIVER_TYPE_HARDWARE,
                HMODULE::default(),
                flags,
                None,
                D3D11_SDK_VERSION,
                Some(&swapchain_desc),
                Some(&mut swapchain),
                Some(&mut device),
                Some(&mut feature_level),
                Some(&mut immediate),
            )
        }
        .map_err(|e| GraphicsError::DeviceCreation(format!("D3D11CreateDeviceAndSwapChain failed: {}", e)))?;

        let (Some(device), Some(immediate), Some(swapchain)) = (device, immediate, swapchain) else {
            return Err(GraphicsError::DeviceCreation("D3D11 returned a null device".to_string()).into());
        };

        let render_target_view = unsafe { create_back_buffer_view(&device, &swapchain)? };
        unsafe {
            immediate.OMSetRenderTargets(Some(&[Some(render_target_view.clone())]), None::<&ID3D11DepthStencilView>);
            immediate.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        }

        let properties = query_properties(&device, feature_level);
        info!(
            adapter = %properties.renderer,
            vendor = %properties.vendor,
            feature_level = %properties.version,
            video_memory_mb = properties.dedicated_video_memory / (1024 * 1024),
            system_memory_mb = properties.dedicated_system_memory / (1024 * 1024),
            "Direct3D 11 device created"
        );

        let info_queue = if debug {
            match device.cast::<ID3D11InfoQueue>() {
                Ok(queue) => {
                    debug!("D3D11 info queue attached");
                    Some(queue)
                }
                Err(e) => {
                    warn!(error = %e, "D3D11 debug layer unavailable");
                    None
                }
            }
        } else {
            None
        };

        let sync_interval = if config.vsync { 1 } else { 0 };
        let present_chain = swapchain.clone();
        let present: PresentFn = Box::new(move || {
            unsafe { present_chain.Present(sync_interval, DXGI_PRESENT(0)) }
                .ok()
                .map_err(|e| GraphicsError::SwapchainError(format!("Present failed: {}", e)).into())
        });

        Ok(Self {
            device,
            immediate,
            swapchain,
            render_target_views: vec![render_target_view],
            info_queue,
            properties,
            present,
            debug,
        })
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// 呈现并转储调试消息
    pub fn present(&mut self) -> Result<()> {
        let result = (self.present)();
        self.drain_messages();
        result
    }

    /// 把 InfoQueue 中累积的消息写入日志
    pub fn drain_messages(&self) {
        let Some(queue) = &self.info_queue else {
            return;
        };

        unsafe {
            let count = queue.GetNumStoredMessages();
            for index in 0..count {
                let mut length = 0usize;
                if queue.GetMessage(index, None, &mut length).is_err() || length == 0 {
                    continue;
                }

                // D3D11_MESSAGE 后面紧跟描述字符串
                let mut storage = vec![0u64; length.div_ceil(8)];
                let message = storage.as_mut_ptr() as *mut D3D11_MESSAGE;
                if queue.GetMessage(index, Some(message), &mut length).is_err() {
                    continue;
                }

                let message = &*message;
                let text = if message.pDescription.is_null() {
                    String::new()
                } else {
                    let bytes = std::slice::from_raw_parts(
                        message.pDescription,
                        message.DescriptionByteLength.saturating_sub(1),
                    );
                    String::from_utf8_lossy(bytes).into_owned()
                };

                match message.Severity {
                    D3D11_MESSAGE_SEVERITY_CORRUPTION | D3D11_MESSAGE_SEVERITY_ERROR => {
                        error!(target: "cg_render::d3d11", id = message.ID.0, "{}", text)
                    }
                    D3D11_MESSAGE_SEVERITY_WARNING => warn!(target: "cg_render::d3d11", id = message.ID.0, "{}", text),
                    D3D11_MESSAGE_SEVERITY_INFO => debug!(target: "cg_render::d3d11", id = message.ID.0, "{}", text),
                    _ => trace!(target: "cg_render::d3d11", id = message.ID.0, "{}", text),
                }
            }
            queue.ClearStoredMessages();
        }
    }

    /// 释放上下文，然后释放设备
    pub fn destroy(self) {
        unsafe {
            self.immediate.ClearState();
            self.immediate.Flush();
        }
        self.drain_messages();

        let Self {
            device,
            immediate,
            swapchain,
            render_target_views,
            info_queue,
            present,
            debug,
            ..
        } = self;

        drop(render_target_views);
        drop(present);
        drop(swapchain);
        drop(immediate);
        drop(info_queue);

        if debug {
            if let Ok(debug_device) = device.cast::<ID3D11Debug>() {
                unsafe {
                    let _ = debug_device.ReportLiveDeviceObjects(D3D11_RLDO_DETAIL);
                }
            }
        }
        drop(device);
        info!("Direct3D 11 device destroyed");
    }
}

unsafe fn create_back_buffer_view(device: &ID3D11Device, swapchain: &IDXGISwapChain) -> Result<ID3D11RenderTargetView> {
    let back_buffer: ID3D11Texture2D = swapchain
        .GetBuffer(0)
        .map_err(|e| GraphicsError::SwapchainError(format!("GetBuffer failed: {}", e)))?;

    let mut view: Option<ID3D11RenderTargetView> = None;
    device
        .CreateRenderTargetView(&back_buffer, None, Some(&mut view))
        .map_err(|e| GraphicsError::SwapchainError(format!("CreateRenderTargetView failed: {}", e)))?;

    view.ok_or_else(|| GraphicsError::SwapchainError("null render target view".to_string()).into())
}

fn query_properties(device: &ID3D11Device, feature_level: D3D_FEATURE_LEVEL) -> DeviceProperties {
    let version_major = ((feature_level.0 >> 12) & 0xF) as u32;
    let version_minor = ((feature_level.0 >> 8) & 0xF) as u32;

    let mut properties = DeviceProperties {
        version: format!("Direct3D {}.{}", version_major, version_minor),
        shading_language_version: "HLSL 5.0".to_string(),
        version_major,
        version_minor,
        ..DeviceProperties::default()
    };

    let adapter_desc = device
        .cast::<IDXGIDevice>()
        .and_then(|dxgi| unsafe { dxgi.GetAdapter() })
        .and_then(|adapter| unsafe { adapter.GetDesc() });

    match adapter_desc {
        Ok(desc) => {
            let len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
            properties.renderer = String::from_utf16_lossy(&desc.Description[..len]);
            properties.vendor = vendor_name(desc.VendorId).to_string();
            properties.dedicated_video_memory = desc.DedicatedVideoMemory as u64;
            properties.dedicated_system_memory = desc.DedicatedSystemMemory as u64;
        }
        Err(e) => warn!(error = %e, "Failed to query DXGI adapter"),
    }

    properties
}

fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x10DE => "NVIDIA",
        0x1002 | 0x1022 => "AMD",
        0x8086 => "Intel",
        0x1414 => "Microsoft",
        _ => "Unknown",
    }
}
