//! Render pass lifecycle contract and per-frame context.
//!
//! A host drives every scheduled [`RenderPass`] through
//! `on_camera_setup` → `execute` → `on_camera_cleanup` once per camera per
//! frame, ordered by [`InjectionPoint`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::RenderBackend;
use crate::camera::Camera;
use crate::error::PassError;

/// Everything a pass may read about the frame being rendered.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    /// The camera being rendered.
    pub camera: &'a Camera,
    /// Frame counter from [`Renderer::begin_frame`](crate::Renderer::begin_frame),
    /// shared by every camera rendered in that frame.
    pub frame_index: u64,
}

impl<'a> FrameContext<'a> {
    pub fn new(camera: &'a Camera, frame_index: u64) -> Self {
        Self {
            camera,
            frame_index,
        }
    }
}

/// Position in the host's per-frame sequence where a pass runs.
///
/// Serialized by its kebab-case name, the same spelling the CLI accepts.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub enum InjectionPoint {
    BeforeRendering,
    BeforeRenderingOpaques,
    #[default]
    AfterRenderingOpaques,
    BeforeRenderingTransparents,
    AfterRenderingTransparents,
    BeforePostProcessing,
    AfterPostProcessing,
    AfterRendering,
}

impl InjectionPoint {
    /// Every injection point in execution order.
    pub const ALL: [InjectionPoint; 8] = [
        InjectionPoint::BeforeRendering,
        InjectionPoint::BeforeRenderingOpaques,
        InjectionPoint::AfterRenderingOpaques,
        InjectionPoint::BeforeRenderingTransparents,
        InjectionPoint::AfterRenderingTransparents,
        InjectionPoint::BeforePostProcessing,
        InjectionPoint::AfterPostProcessing,
        InjectionPoint::AfterRendering,
    ];

    /// Short kebab-case name used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            InjectionPoint::BeforeRendering => "before-rendering",
            InjectionPoint::BeforeRenderingOpaques => "before-opaque",
            InjectionPoint::AfterRenderingOpaques => "after-opaque",
            InjectionPoint::BeforeRenderingTransparents => "before-transparent",
            InjectionPoint::AfterRenderingTransparents => "after-transparent",
            InjectionPoint::BeforePostProcessing => "before-post-processing",
            InjectionPoint::AfterPostProcessing => "after-post-processing",
            InjectionPoint::AfterRendering => "after-rendering",
        }
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no [`InjectionPoint`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown injection point '{0}'")]
pub struct ParseInjectionPointError(pub String);

impl FromStr for InjectionPoint {
    type Err = ParseInjectionPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InjectionPoint::ALL
            .into_iter()
            .find(|point| point.as_str() == s)
            .ok_or_else(|| ParseInjectionPointError(s.to_string()))
    }
}

impl From<InjectionPoint> for String {
    fn from(point: InjectionPoint) -> Self {
        point.as_str().to_string()
    }
}

impl TryFrom<String> for InjectionPoint {
    type Error = ParseInjectionPointError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A pass the host schedules per camera.
pub trait RenderPass<B: RenderBackend> {
    /// Debug label.
    fn label(&self) -> &str;

    /// Where in the frame this pass runs.
    fn injection_point(&self) -> InjectionPoint;

    /// Acquire per-frame resources. On error the pass holds nothing.
    fn on_camera_setup(&mut self, backend: &mut B, ctx: &FrameContext<'_>)
    -> Result<(), PassError>;

    /// Issue the pass's commands against `output`.
    fn execute(
        &mut self,
        backend: &mut B,
        ctx: &FrameContext<'_>,
        output: &B::Texture,
    ) -> Result<(), PassError>;

    /// Release per-frame resources. Safe to call when setup failed.
    fn on_camera_cleanup(&mut self, backend: &mut B, ctx: &FrameContext<'_>);
}
