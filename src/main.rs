//! cg_render 演示程序
//!
//! 创建引擎，上传一个四边形（4 个顶点、6 个 16 位索引），
//! 录制一组渲染命令，然后进入主循环。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 命令行覆盖后端
//! cargo run -- --d3d11
//! cargo run -- --headless --debug
//! ```

use anyhow::Context;
use tracing::{info, warn};

use cg_render::core::config::{BackendKind, Config};
use cg_render::core::fileio::read_file;
use cg_render::core::Logger;
use cg_render::engine::Engine;
use cg_render::renderer::command::{self, color, ClearFlags, RenderCommand};
use cg_render::renderer::layout::{VertexAttribute, VertexElementDesc, VertexFormat};
use cg_render::renderer::resource::{BufferDesc, ShaderDesc};
use cg_render::renderer::Renderer;

const VERTICES: [f32; 12] = [
    0.5, 0.5, 0.0, //
    0.5, -0.5, 0.0, //
    -0.5, -0.5, 0.0, //
    -0.5, 0.5, 0.0,
];

const INDICES: [u16; 6] = [0, 1, 3, 1, 2, 3];

/// 着色器源文件与入口
struct ShaderSources {
    vertex_path: &'static str,
    vertex_entry: &'static str,
    fragment_path: &'static str,
    fragment_entry: &'static str,
}

fn shader_sources(kind: BackendKind) -> ShaderSources {
    match kind {
        BackendKind::Direct3D11 => ShaderSources {
            vertex_path: "assets/shaders/triangle.hlsl",
            vertex_entry: "VSMain",
            fragment_path: "assets/shaders/triangle.hlsl",
            fragment_entry: "PSMain",
        },
        _ => ShaderSources {
            vertex_path: "assets/shaders/triangle.vert.glsl",
            vertex_entry: "main",
            fragment_path: "assets/shaders/triangle.frag.glsl",
            fragment_entry: "main",
        },
    }
}

/// 创建四边形所需的资源，返回要录制的命令
fn build_quad(renderer: &mut Renderer, config: &Config) -> anyhow::Result<Vec<RenderCommand>> {
    let sources = shader_sources(renderer.backend_kind());

    let vertex_source = read_file(sources.vertex_path).context("loading vertex shader")?;
    let fragment_source = read_file(sources.fragment_path).context("loading fragment shader")?;

    let vs = renderer.create_shader(
        &ShaderDesc::vertex(sources.vertex_entry, sources.vertex_path),
        &vertex_source,
    )?;
    let fs = renderer.create_shader(
        &ShaderDesc::fragment(sources.fragment_entry, sources.fragment_path),
        &fragment_source,
    )?;
    let program = renderer.create_shader_program(&[vs, fs])?;

    let vb = renderer.create_vertex_buffer(
        &BufferDesc::vertex(4, 3 * std::mem::size_of::<f32>() as u32),
        bytemuck::cast_slice(&VERTICES),
    )?;
    let ib = renderer.create_index_buffer(
        &BufferDesc::index(INDICES.len() as u32, std::mem::size_of::<u16>() as u32),
        bytemuck::cast_slice(&INDICES),
    )?;
    renderer.create_vertex_layout(
        &[VertexElementDesc::new(VertexAttribute::Position, VertexFormat::Float3)],
        vb,
        Some(vs),
    )?;

    let viewport = renderer.create_viewport(0.0, 0.0, config.window.width as f32, config.window.height as f32)?;

    Ok(vec![
        command::set_view_clear(0, ClearFlags::COLOR, color::BLUE),
        command::set_viewport(viewport),
        command::set_pipeline_state(program),
        command::set_vertex_buffer(vb),
        command::set_index_buffer(ib),
        command::draw_indexed(INDICES.len() as u32, 0),
        command::submit(0, program),
    ])
}

fn main() -> anyhow::Result<()> {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args().skip(1));
    config.validate().context("invalid configuration")?;

    // 2. 初始化日志系统
    let logger = Logger::from_config(&config.logging);
    logger.install_global()?;
    info!(version = env!("CARGO_PKG_VERSION"), backend = config.graphics.backend.name(), "cg_render starting...");

    // 3. 创建引擎：窗口提示 → 窗口 → 设备/上下文 → 渲染器
    let mut engine = Engine::with_logger(&config, logger).context("failed to initialize engine")?;

    // 4. 上传资源并录制命令
    let commands = match build_quad(engine.renderer_mut(), &config) {
        Ok(commands) => commands,
        Err(e) => {
            // 空后端无法创建资源，只保留清屏
            warn!(error = %e, "Quad resources unavailable, recording clear only");
            vec![command::set_view_clear(0, ClearFlags::COLOR, color::BLUE)]
        }
    };
    engine.renderer_mut().add_commands(&commands)?;

    // 5. 主循环
    engine.run(|_| Ok(()))?;

    info!("cg_render exited");
    Ok(())
}
