//! Host-side scheduler that runs feature passes for each camera.

use crate::backend::RenderBackend;
use crate::camera::Camera;
use crate::pass::{FrameContext, RenderPass};

/// A pluggable feature contributing passes to every camera it accepts.
pub trait RendererFeature<B: RenderBackend> {
    fn name(&self) -> &str;

    /// Called once per camera per frame. Returning `None` skips the feature
    /// entirely for this camera: no setup, execute or cleanup.
    fn add_render_passes(&mut self, ctx: &FrameContext<'_>) -> Option<&mut dyn RenderPass<B>>;
}

/// What happened while rendering one camera.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Labels of passes that completed, in execution order.
    pub executed: Vec<String>,
    /// `(label, error)` for passes whose effect was skipped this frame.
    pub failed: Vec<(String, String)>,
}

/// Drives pass lifecycles in injection order.
pub struct Renderer<B: RenderBackend> {
    features: Vec<Box<dyn RendererFeature<B>>>,
    frame_index: u64,
}

impl<B: RenderBackend> Renderer<B> {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            frame_index: 0,
        }
    }

    pub fn add_feature(&mut self, feature: impl RendererFeature<B> + 'static) {
        log::debug!("Registered renderer feature {}", feature.name());
        self.features.push(Box::new(feature));
    }

    /// Index of the frame currently being rendered.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Advance to the next frame. Every camera rendered until the next call
    /// shares the new index.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame_index += 1;
        self.frame_index
    }

    /// Run every enqueued pass for `camera` against `output`.
    ///
    /// Each pass is set up, executed and cleaned up in turn; cleanup runs even
    /// when setup or execute failed. Failures are logged and reported, never
    /// propagated: the frame still presents without that effect.
    pub fn render_camera(
        &mut self,
        backend: &mut B,
        camera: &Camera,
        output: &B::Texture,
    ) -> FrameReport {
        let ctx = FrameContext::new(camera, self.frame_index);

        let mut passes: Vec<&mut dyn RenderPass<B>> = self
            .features
            .iter_mut()
            .filter_map(|feature| feature.add_render_passes(&ctx))
            .collect();
        passes.sort_by_key(|pass| pass.injection_point());

        let mut report = FrameReport::default();
        for pass in passes {
            let label = pass.label().to_string();
            let result = pass
                .on_camera_setup(backend, &ctx)
                .and_then(|()| pass.execute(backend, &ctx, output));
            pass.on_camera_cleanup(backend, &ctx);

            match result {
                Ok(()) => report.executed.push(label),
                Err(err) => {
                    log::warn!(
                        "Frame {}: pass '{label}' skipped: {err}",
                        ctx.frame_index
                    );
                    report.failed.push((label, err.to_string()));
                }
            }
        }
        report
    }
}

impl<B: RenderBackend> Default for Renderer<B> {
    fn default() -> Self {
        Self::new()
    }
}
