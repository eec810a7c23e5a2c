//! The dither → threshold post-process pass and the feature that schedules it.
//!
//! Per camera per frame the pass:
//! 1. allocates a 1640×940 and an 820×470 intermediate buffer,
//! 2. binds the camera's world-space frustum corner directions as
//!    `_BL`, `_TL`, `_TR`, `_BR` on the dither program,
//! 3. filters camera target → large (dither) and large → main (threshold)
//!    inside one profiling scope,
//! 4. copies main back over the camera target,
//! 5. releases both buffers.

use crate::backend::RenderBackend;
use crate::error::PassError;
use crate::frustum::FrustumCorners;
use crate::params::ShaderParameters;
use crate::pass::{FrameContext, InjectionPoint, RenderPass};
use crate::renderer::RendererFeature;
use crate::target::{LARGE_BUFFER, MAIN_BUFFER};

/// Label of the profiling scope wrapping the two filter stages.
pub const PROFILING_LABEL: &str = "obra-dinn";

/// Diagnostic recorded when a required program is absent.
pub const MISSING_PROGRAMS_DIAGNOSTIC: &str = "Missing dither materials";

/// User-facing settings of the feature.
#[derive(Clone, Debug)]
pub struct PassSettings<P> {
    /// Program for the first stage. Required.
    pub dither: Option<P>,
    /// Program for the second stage. Required.
    pub threshold: Option<P>,
    pub injection_point: InjectionPoint,
}

impl<P> Default for PassSettings<P> {
    fn default() -> Self {
        Self {
            dither: None,
            threshold: None,
            injection_point: InjectionPoint::default(),
        }
    }
}

struct FrameBuffers<T> {
    large: T,
    main: T,
}

/// The two-stage dither/threshold pass.
pub struct ObraDinnPass<B: RenderBackend> {
    dither: B::Program,
    threshold: B::Program,
    injection_point: InjectionPoint,
    dither_params: ShaderParameters,
    threshold_params: ShaderParameters,
    buffers: Option<FrameBuffers<B::Texture>>,
}

impl<B: RenderBackend> ObraDinnPass<B> {
    pub fn new(dither: B::Program, threshold: B::Program, injection_point: InjectionPoint) -> Self {
        Self {
            dither,
            threshold,
            injection_point,
            dither_params: ShaderParameters::new(),
            threshold_params: ShaderParameters::new(),
            buffers: None,
        }
    }

    /// Parameters last bound to the dither program.
    pub fn dither_parameters(&self) -> &ShaderParameters {
        &self.dither_params
    }

    /// Whether intermediate buffers are currently held (between setup and cleanup).
    pub fn holds_buffers(&self) -> bool {
        self.buffers.is_some()
    }
}

impl<B: RenderBackend> RenderPass<B> for ObraDinnPass<B> {
    fn label(&self) -> &str {
        PROFILING_LABEL
    }

    fn injection_point(&self) -> InjectionPoint {
        self.injection_point
    }

    fn on_camera_setup(
        &mut self,
        backend: &mut B,
        ctx: &FrameContext<'_>,
    ) -> Result<(), PassError> {
        if self.buffers.is_some() {
            return Err(PassError::OrderingViolation(
                "setup called again before cleanup".to_string(),
            ));
        }

        let large = backend.allocate_temporary(&LARGE_BUFFER)?;
        let main = match backend.allocate_temporary(&MAIN_BUFFER) {
            Ok(main) => main,
            Err(err) => {
                backend.release_temporary(large);
                return Err(err);
            }
        };
        log::trace!("Frame {}: intermediate buffers ready", ctx.frame_index);
        self.buffers = Some(FrameBuffers { large, main });
        Ok(())
    }

    fn execute(
        &mut self,
        backend: &mut B,
        ctx: &FrameContext<'_>,
        output: &B::Texture,
    ) -> Result<(), PassError> {
        let buffers = self.buffers.as_ref().ok_or_else(|| {
            PassError::OrderingViolation("execute called without setup".to_string())
        })?;

        FrustumCorners::compute(ctx.camera).write_to(&mut self.dither_params);

        backend.begin_profiling_scope(PROFILING_LABEL);
        let filtered = backend
            .blit(
                output,
                &buffers.large,
                Some(&self.dither),
                &self.dither_params,
            )
            .and_then(|()| {
                backend.blit(
                    &buffers.large,
                    &buffers.main,
                    Some(&self.threshold),
                    &self.threshold_params,
                )
            });
        backend.end_profiling_scope();
        filtered?;

        backend.blit(&buffers.main, output, None, &ShaderParameters::new())
    }

    fn on_camera_cleanup(&mut self, backend: &mut B, ctx: &FrameContext<'_>) {
        if let Some(FrameBuffers { large, main }) = self.buffers.take() {
            backend.release_temporary(large);
            backend.release_temporary(main);
            log::trace!("Frame {}: intermediate buffers released", ctx.frame_index);
        }
    }
}

/// Owns the pass and gates its scheduling on both programs being present.
pub struct ObraDinnFeature<B: RenderBackend> {
    pass: Option<ObraDinnPass<B>>,
    missing: &'static str,
    diagnostics: Vec<String>,
}

impl<B: RenderBackend> ObraDinnFeature<B> {
    /// Build the pass from settings. Missing programs leave the feature
    /// inert; it reports once, the first time a camera asks for passes.
    pub fn new(settings: PassSettings<B::Program>) -> Self {
        let PassSettings {
            dither,
            threshold,
            injection_point,
        } = settings;
        let (pass, missing) = match (dither, threshold) {
            (Some(dither), Some(threshold)) => (
                Some(ObraDinnPass::new(dither, threshold, injection_point)),
                "",
            ),
            (None, Some(_)) => (None, "dither"),
            (Some(_), None) => (None, "threshold"),
            (None, None) => (None, "dither, threshold"),
        };
        Self {
            pass,
            missing,
            diagnostics: Vec::new(),
        }
    }

    /// Whether the pass will be scheduled.
    pub fn is_valid(&self) -> bool {
        self.pass.is_some()
    }

    /// Validate settings without scheduling anything.
    pub fn validate(&self) -> Result<(), PassError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PassError::MissingConfiguration {
                missing: self.missing,
            })
        }
    }

    /// Diagnostics recorded this session.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn pass(&self) -> Option<&ObraDinnPass<B>> {
        self.pass.as_ref()
    }
}

impl<B: RenderBackend> RendererFeature<B> for ObraDinnFeature<B> {
    fn name(&self) -> &str {
        "ObraDinnFeature"
    }

    fn add_render_passes(&mut self, _ctx: &FrameContext<'_>) -> Option<&mut dyn RenderPass<B>> {
        if let Err(err) = self.validate() {
            if self.diagnostics.is_empty() {
                log::error!("{MISSING_PROGRAMS_DIAGNOSTIC}: {err}");
                self.diagnostics
                    .push(format!("{MISSING_PROGRAMS_DIAGNOSTIC} ({})", self.missing));
            }
            return None;
        }
        self.pass
            .as_mut()
            .map(|pass| pass as &mut dyn RenderPass<B>)
    }
}
