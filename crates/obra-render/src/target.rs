//! Intermediate buffer descriptors and the two fixed buffers of the chain.

/// Texel format of an intermediate buffer. Color only, no depth channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel RGBA, linear.
    Rgba8Unorm,
}

impl PixelFormat {
    /// Bytes per texel.
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            PixelFormat::Rgba8Unorm => 4,
        }
    }

    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// How a buffer is filtered when a later stage samples from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Point,
    /// Linear interpolation of the four nearest texels.
    #[default]
    Bilinear,
}

impl FilterMode {
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Point => wgpu::FilterMode::Nearest,
            FilterMode::Bilinear => wgpu::FilterMode::Linear,
        }
    }
}

/// Size, format and sampling mode of an offscreen buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
}

impl BufferDesc {
    /// Total texel storage in bytes.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * self.format.bytes_per_pixel()
    }
}

/// Dither stage output.
pub const LARGE_BUFFER: BufferDesc = BufferDesc {
    label: "obra-large",
    width: 1640,
    height: 940,
    format: PixelFormat::Rgba8Unorm,
    filter: FilterMode::Bilinear,
};

/// Threshold stage output, composited back onto the camera target.
pub const MAIN_BUFFER: BufferDesc = BufferDesc {
    label: "obra-main",
    width: 820,
    height: 470,
    format: PixelFormat::Rgba8Unorm,
    filter: FilterMode::Bilinear,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_buffer_dimensions() {
        assert_eq!((LARGE_BUFFER.width, LARGE_BUFFER.height), (1640, 940));
        assert_eq!((MAIN_BUFFER.width, MAIN_BUFFER.height), (820, 470));
    }

    #[test]
    fn test_main_buffer_is_half_of_large() {
        assert_eq!(LARGE_BUFFER.width / 2, MAIN_BUFFER.width);
        assert_eq!(LARGE_BUFFER.height / 2, MAIN_BUFFER.height);
    }

    #[test]
    fn test_both_buffers_are_bilinear_rgba8() {
        for desc in [LARGE_BUFFER, MAIN_BUFFER] {
            assert_eq!(desc.filter, FilterMode::Bilinear);
            assert_eq!(desc.format, PixelFormat::Rgba8Unorm);
        }
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(MAIN_BUFFER.byte_size(), 820 * 470 * 4);
    }
}
