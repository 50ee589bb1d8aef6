//! Direct3D 11 后端（仅 Windows）

mod backend;
mod context;

pub use backend::D3d11Backend;
pub use context::D3d11Context;
