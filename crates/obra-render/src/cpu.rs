//! Deterministic CPU reference backend.
//!
//! Textures are 8-bit RGBA images and programs are Rust pixel shaders run
//! once per destination texel. Every command is recorded so hosts and tests
//! can inspect exactly what a pass issued and in which order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec4};
use image::{Rgba, RgbaImage};

use crate::backend::RenderBackend;
use crate::error::PassError;
use crate::params::ShaderParameters;
use crate::pool::TemporaryPool;
use crate::target::{BufferDesc, FilterMode, PixelFormat};

/// Label used for host-owned targets created through [`CpuBackend::create_target`].
pub const HOST_TARGET_LABEL: &str = "camera-color";

/// A per-texel program evaluated by [`CpuBackend::blit`].
pub trait PixelShader: Send + Sync {
    /// Name used in command records and logs.
    fn name(&self) -> &str;

    /// Compute the color of one destination texel.
    fn shade(&self, fragment: &Fragment<'_>, params: &ShaderParameters) -> Vec4;
}

/// Shared handle to a [`PixelShader`]; the CPU backend's program type.
#[derive(Clone)]
pub struct CpuProgram(Arc<dyn PixelShader>);

impl CpuProgram {
    pub fn new(shader: impl PixelShader + 'static) -> Self {
        Self(Arc::new(shader))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl fmt::Debug for CpuProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CpuProgram").field(&self.name()).finish()
    }
}

/// Copies its input unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl PixelShader for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn shade(&self, fragment: &Fragment<'_>, _params: &ShaderParameters) -> Vec4 {
        fragment.sample(fragment.uv)
    }
}

/// Samples an image with clamp-to-edge addressing.
#[derive(Clone, Copy)]
pub struct TextureSampler<'a> {
    image: &'a RgbaImage,
    filter: FilterMode,
}

impl<'a> TextureSampler<'a> {
    pub fn new(image: &'a RgbaImage, filter: FilterMode) -> Self {
        Self { image, filter }
    }

    /// Sample at normalized coordinates (origin top-left). Channels in 0..=1.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return Vec4::ZERO;
        }
        let pos = uv * Vec2::new(w as f32, h as f32);
        match self.filter {
            FilterMode::Point => self.texel(pos.x.floor() as i64, pos.y.floor() as i64),
            FilterMode::Bilinear => {
                let p = pos - Vec2::splat(0.5);
                let base = p.floor();
                let t = p - base;
                let (x0, y0) = (base.x as i64, base.y as i64);

                let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), t.x);
                let bottom = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), t.x);
                top.lerp(bottom, t.y)
            }
        }
    }

    fn texel(&self, x: i64, y: i64) -> Vec4 {
        let (w, h) = self.image.dimensions();
        let x = x.clamp(0, i64::from(w) - 1) as u32;
        let y = y.clamp(0, i64::from(h) - 1) as u32;
        let [r, g, b, a] = self.image.get_pixel(x, y).0;
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }
}

/// Inputs for shading one destination texel.
pub struct Fragment<'a> {
    /// Texel center in normalized destination coordinates.
    pub uv: Vec2,
    source: TextureSampler<'a>,
}

impl Fragment<'_> {
    /// Sample the blit source.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        self.source.sample(uv)
    }
}

/// Handle to a texture owned by a [`CpuBackend`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CpuTexture {
    id: u64,
    desc: BufferDesc,
}

impl CpuTexture {
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }
}

/// One command issued against the backend, in submission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandRecord {
    Allocate(&'static str),
    Release(&'static str),
    BeginScope(String),
    EndScope,
    Blit {
        source: &'static str,
        destination: &'static str,
        program: Option<String>,
    },
}

struct Slot {
    desc: BufferDesc,
    image: RgbaImage,
    written: bool,
    temporary: bool,
}

/// CPU implementation of [`RenderBackend`].
pub struct CpuBackend {
    slots: HashMap<u64, Slot>,
    pool: TemporaryPool<RgbaImage>,
    next_id: u64,
    scopes: Vec<String>,
    commands: Vec<CommandRecord>,
}

impl CpuBackend {
    /// Backend with an unbounded temporary pool.
    pub fn new() -> Self {
        Self::with_pool(TemporaryPool::new())
    }

    /// Backend whose temporary pool refuses to grow past `bytes`.
    pub fn with_budget(bytes: u64) -> Self {
        Self::with_pool(TemporaryPool::with_budget(bytes))
    }

    fn with_pool(pool: TemporaryPool<RgbaImage>) -> Self {
        Self {
            slots: HashMap::new(),
            pool,
            next_id: 0,
            scopes: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Register a host-owned target, e.g. a camera's color buffer.
    pub fn create_target(&mut self, image: RgbaImage, filter: FilterMode) -> CpuTexture {
        let desc = BufferDesc {
            label: HOST_TARGET_LABEL,
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgba8Unorm,
            filter,
        };
        self.insert(desc, image, true, false)
    }

    /// Current contents of a live texture.
    pub fn image(&self, texture: &CpuTexture) -> Option<&RgbaImage> {
        self.slots.get(&texture.id).map(|slot| &slot.image)
    }

    /// Replace the contents of a host-owned target, e.g. with a new frame.
    ///
    /// Returns `false` for temporaries, released textures and size mismatches.
    pub fn write_target(&mut self, texture: &CpuTexture, image: RgbaImage) -> bool {
        match self.slots.get_mut(&texture.id) {
            Some(slot) if !slot.temporary && slot.image.dimensions() == image.dimensions() => {
                slot.image = image;
                slot.written = true;
                true
            }
            _ => false,
        }
    }

    /// Remove a host-owned target and return its contents.
    pub fn take_target(&mut self, texture: CpuTexture) -> Option<RgbaImage> {
        match self.slots.remove(&texture.id) {
            Some(slot) if !slot.temporary => Some(slot.image),
            Some(slot) => {
                log::warn!("take_target called on temporary {}", slot.desc.label);
                self.slots.insert(texture.id, slot);
                None
            }
            None => None,
        }
    }

    /// Commands issued so far.
    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Temporaries currently handed out.
    pub fn outstanding_temporaries(&self) -> usize {
        self.pool.outstanding()
    }

    pub fn pool(&self) -> &TemporaryPool<RgbaImage> {
        &self.pool
    }

    /// Depth of currently open profiling scopes.
    pub fn open_scopes(&self) -> usize {
        self.scopes.len()
    }

    fn insert(
        &mut self,
        desc: BufferDesc,
        image: RgbaImage,
        written: bool,
        temporary: bool,
    ) -> CpuTexture {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(
            id,
            Slot {
                desc,
                image,
                written,
                temporary,
            },
        );
        CpuTexture { id, desc }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for CpuBackend {
    type Texture = CpuTexture;
    type Program = CpuProgram;

    fn allocate_temporary(&mut self, desc: &BufferDesc) -> Result<CpuTexture, PassError> {
        let image = self
            .pool
            .acquire(desc, || Ok(RgbaImage::new(desc.width, desc.height)))?;
        self.commands.push(CommandRecord::Allocate(desc.label));
        Ok(self.insert(*desc, image, false, true))
    }

    fn release_temporary(&mut self, texture: CpuTexture) {
        match self.slots.remove(&texture.id) {
            Some(slot) if slot.temporary => {
                self.commands.push(CommandRecord::Release(slot.desc.label));
                self.pool.release(&slot.desc, slot.image);
            }
            Some(slot) => {
                log::warn!("Ignoring release of host-owned {}", slot.desc.label);
                self.slots.insert(texture.id, slot);
            }
            None => log::warn!("Release of unknown texture {}", texture.desc.label),
        }
    }

    fn blit(
        &mut self,
        source: &CpuTexture,
        destination: &CpuTexture,
        program: Option<&CpuProgram>,
        params: &ShaderParameters,
    ) -> Result<(), PassError> {
        if source.id == destination.id {
            return Err(PassError::OrderingViolation(format!(
                "{} is both source and destination",
                source.desc.label
            )));
        }
        let mut target = self.slots.remove(&destination.id).ok_or_else(|| {
            PassError::OrderingViolation(format!(
                "{} written after release",
                destination.desc.label
            ))
        })?;

        let Some(input) = self.slots.get(&source.id).filter(|slot| slot.written) else {
            let reason = if self.slots.contains_key(&source.id) {
                "read before any stage wrote it"
            } else {
                "read after release"
            };
            self.slots.insert(destination.id, target);
            return Err(PassError::OrderingViolation(format!(
                "{} {reason}",
                source.desc.label
            )));
        };

        let sampler = TextureSampler::new(&input.image, input.desc.filter);
        let (w, h) = target.image.dimensions();
        let size = Vec2::new(w as f32, h as f32);

        for (x, y, pixel) in target.image.enumerate_pixels_mut() {
            let fragment = Fragment {
                uv: (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) / size,
                source: sampler,
            };
            let color = match program {
                Some(program) => program.0.shade(&fragment, params),
                None => fragment.sample(fragment.uv),
            };
            *pixel = to_rgba8(color);
        }
        target.written = true;

        log::trace!(
            "Blit {} -> {} ({})",
            source.desc.label,
            destination.desc.label,
            program.map_or("copy", CpuProgram::name)
        );
        self.commands.push(CommandRecord::Blit {
            source: source.desc.label,
            destination: destination.desc.label,
            program: program.map(|p| p.name().to_string()),
        });
        self.slots.insert(destination.id, target);
        Ok(())
    }

    fn begin_profiling_scope(&mut self, label: &str) {
        self.scopes.push(label.to_string());
        self.commands
            .push(CommandRecord::BeginScope(label.to_string()));
    }

    fn end_profiling_scope(&mut self) {
        if self.scopes.pop().is_none() {
            log::warn!("end_profiling_scope without a matching begin");
            return;
        }
        self.commands.push(CommandRecord::EndScope);
    }
}

fn to_rgba8(color: Vec4) -> Rgba<u8> {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}
