//! Raw RGBA video frames.

use bytes::Bytes;

/// Bytes per RGBA pixel.
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// A decoded RGBA frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Packed RGBA pixel data, row-major, no padding.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,
}

impl Frame {
    /// Create a frame from raw data.
    pub fn new(data: Bytes, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// A frame filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let data: Vec<u8> = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self::new(Bytes::from(data), width, height)
    }

    /// An opaque black frame.
    pub fn black(width: u32, height: u32) -> Self {
        Self::solid(width, height, [0, 0, 0, 255])
    }

    /// Expected buffer size for given dimensions.
    pub fn rgba_buffer_size(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * RGBA_BYTES_PER_PIXEL
    }

    /// Validate that the frame data matches its dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgba_buffer_size(self.width, self.height)
    }

    /// Dimensions as a tuple.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
