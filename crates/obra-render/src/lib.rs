//! Obra Dinn style post-process: frustum corners, fixed-size intermediate
//! buffers, dither → threshold → composite, and the pass lifecycle that
//! drives them on a CPU reference backend or on wgpu.

pub mod backend;
pub mod camera;
pub mod cpu;
pub mod error;
pub mod frustum;
pub mod gpu;
pub mod obra_dinn;
pub mod params;
pub mod pass;
pub mod pool;
pub mod renderer;
pub mod shader;
pub mod target;

pub use backend::RenderBackend;
pub use camera::{Camera, Projection};
pub use cpu::{
    CommandRecord, CpuBackend, CpuProgram, CpuTexture, Fragment, HOST_TARGET_LABEL, Passthrough,
    PixelShader, TextureSampler,
};
pub use error::{PassError, ProgramError};
pub use frustum::{CORNER_PARAMETER_NAMES, FrustumCorners};
pub use gpu::{
    CornerUniform, GpuContext, GpuContextError, GpuTexture, WgpuBackend, WgslProgram,
    init_headless_blocking,
};
pub use obra_dinn::{
    MISSING_PROGRAMS_DIAGNOSTIC, ObraDinnFeature, ObraDinnPass, PROFILING_LABEL, PassSettings,
};
pub use params::ShaderParameters;
pub use pass::{FrameContext, InjectionPoint, ParseInjectionPointError, RenderPass};
pub use pool::TemporaryPool;
pub use renderer::{FrameReport, Renderer, RendererFeature};
pub use shader::{COPY_PROGRAM, ProgramSource, PROGRAM_PRELUDE};
pub use target::{BufferDesc, FilterMode, LARGE_BUFFER, MAIN_BUFFER, PixelFormat};

#[cfg(test)]
mod pipeline_tests;
