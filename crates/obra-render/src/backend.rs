//! The narrow slice of a rendering backend the pass depends on.

use crate::error::PassError;
use crate::params::ShaderParameters;
use crate::target::BufferDesc;

/// Graphics-resource operations a host provides to post-process passes.
///
/// Commands are ordered: a blit observes every blit issued before it, so a
/// stage may read what the previous stage wrote without extra fencing.
pub trait RenderBackend {
    /// Handle to a texture: either a temporary or a host-owned target.
    type Texture;
    /// Opaque full-screen filter program.
    type Program;

    /// Take a buffer matching `desc` from the temporary pool.
    fn allocate_temporary(&mut self, desc: &BufferDesc) -> Result<Self::Texture, PassError>;

    /// Hand a temporary back to the pool. The handle must not be used again.
    fn release_temporary(&mut self, texture: Self::Texture);

    /// Sample-filter `source` into the whole of `destination`.
    ///
    /// With no program the source is copied (resampled to the destination
    /// size through the source's filter mode).
    fn blit(
        &mut self,
        source: &Self::Texture,
        destination: &Self::Texture,
        program: Option<&Self::Program>,
        params: &ShaderParameters,
    ) -> Result<(), PassError>;

    /// Open a named profiling scope around subsequent commands.
    fn begin_profiling_scope(&mut self, label: &str);

    /// Close the innermost profiling scope.
    fn end_profiling_scope(&mut self);
}
