/// Build script for cg_render
///
/// # Shader Strategy:
/// - OpenGL: GLSL sources are read at runtime and compiled by the driver
/// - D3D11: HLSL sources are read at runtime and compiled via D3DCompile
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=assets/shaders/triangle.vert.glsl");
    println!("cargo:rerun-if-changed=assets/shaders/triangle.frag.glsl");
    println!("cargo:rerun-if-changed=assets/shaders/triangle.hlsl");
}
