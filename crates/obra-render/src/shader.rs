//! WGSL filter program sources.
//!
//! A program is a fragment shader body with an `fs_main` entry point. It is
//! compiled together with [`PROGRAM_PRELUDE`], which provides the
//! full-screen vertex stage, the blit source bindings and the frustum corner
//! uniform.

use std::path::Path;

use log::debug;

use crate::error::ProgramError;

/// Shared declarations prepended to every program.
///
/// Bindings:
/// * group 0, binding 0: `corners` (`_BL`, `_TL`, `_TR`, `_BR` as `bl`..`br`)
/// * group 1, binding 0/1: `source_tex` / `source_sampler`
pub const PROGRAM_PRELUDE: &str = r#"
struct FrustumCorners {
    bl: vec4<f32>,
    tl: vec4<f32>,
    tr: vec4<f32>,
    br: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0) var<uniform> corners: FrustumCorners;
@group(1) @binding(0) var source_tex: texture_2d<f32>;
@group(1) @binding(1) var source_sampler: sampler;

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

// World-space view direction through `uv` (origin top-left).
fn view_direction(uv: vec2<f32>) -> vec3<f32> {
    let top = mix(corners.tl.xyz, corners.tr.xyz, uv.x);
    let bottom = mix(corners.bl.xyz, corners.br.xyz, uv.x);
    return normalize(mix(top, bottom, uv.y));
}
"#;

/// Body of the built-in copy program used for the composite.
pub const COPY_PROGRAM: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(source_tex, source_sampler, in.uv);
}
"#;

/// Fragment entry point every program must define.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Vertex entry point provided by the prelude.
pub const VERTEX_ENTRY: &str = "vs_fullscreen";

/// A named program body, validated but not yet compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    name: String,
    body: String,
}

impl ProgramSource {
    /// Wrap a program body. It must define `fn fs_main`.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, ProgramError> {
        let name = name.into();
        let body = body.into();
        if !body.contains(&format!("fn {FRAGMENT_ENTRY}")) {
            return Err(ProgramError::MissingEntryPoint { name });
        }
        Ok(Self { name, body })
    }

    /// Load a program body from a `.wgsl` file; the name is the file stem.
    pub fn from_file(path: &Path) -> Result<Self, ProgramError> {
        if !path.exists() {
            return Err(ProgramError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Loading program '{}' from {:?}", name, path);
        let body = std::fs::read_to_string(path)?;
        Self::new(name, body)
    }

    /// The built-in copy program.
    pub fn copy() -> Self {
        Self {
            name: "copy".to_string(),
            body: COPY_PROGRAM.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full WGSL module: prelude followed by the body.
    pub fn compose(&self) -> String {
        format!("{PROGRAM_PRELUDE}\n{}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_point_is_rejected() {
        let err = ProgramSource::new("broken", "fn main() {}").unwrap_err();
        assert!(matches!(err, ProgramError::MissingEntryPoint { name } if name == "broken"));
    }

    #[test]
    fn test_composed_source_contains_prelude_and_body() {
        let source = ProgramSource::copy().compose();
        assert!(source.contains("fn vs_fullscreen"));
        assert!(source.contains("var<uniform> corners"));
        assert!(source.contains("fn fs_main"));
        assert!(source.find("vs_fullscreen") < source.find("fs_main"));
    }

    #[test]
    fn test_from_file_uses_file_stem_as_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threshold.wgsl");
        std::fs::write(&path, COPY_PROGRAM).unwrap();

        let source = ProgramSource::from_file(&path).unwrap();
        assert_eq!(source.name(), "threshold");
    }

    #[test]
    fn test_from_missing_file() {
        let err = ProgramSource::from_file(Path::new("/nonexistent/dither.wgsl")).unwrap_err();
        assert!(matches!(err, ProgramError::FileNotFound { .. }));
    }
}
