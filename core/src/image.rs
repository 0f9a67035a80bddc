use std::ops::Deref;

use divrem::DivCeil;

use crate::error::PipelineError;
use crate::merkle::MerkleTree;

/// Recommended default chunk size to use in the ImageMerkleTree.
pub const IMAGE_CHUNK_SIZE: u32 = 8;

/// Bytes per pixel in the interleaved RGBA8 layout.
pub const BYTES_PER_PIXEL: usize = 4;

/// An owned RGBA8 pixel buffer, row-major with the origin at the top left.
///
/// The buffer length is checked against the dimensions at construction, so a
/// value of this type is always internally consistent. Buffers are never
/// mutated after construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 bytes, checking that the length matches the dimensions.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Result<Self, PipelineError> {
        let expected = u64::from(width) * u64::from(height) * BYTES_PER_PIXEL as u64;
        if data.len() as u64 != expected {
            return Err(PipelineError::MalformedInput(format!(
                "buffer of {} bytes does not hold a {}x{} RGBA image ({} bytes)",
                data.len(),
                width,
                height,
                expected,
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Construct from parts already known to be consistent.
    pub(crate) fn from_parts(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len() as u64,
            u64::from(width) * u64::from(height) * BYTES_PER_PIXEL as u64
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The RGBA channels of the pixel at (x, y). Callers must stay in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        debug_assert!(x < self.width && y < self.height);
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }
}

/// ImageMerkleTree is a merklization of an image, constructed with the leaf
/// elements being NxN square chunks in row-major chunk order.
///
/// Chunks on the right and bottom boundaries will be incomplete if the width
/// or height cannot be divided by N; they hold only the pixels present.
pub struct ImageMerkleTree<const N: u32>(MerkleTree<Vec<u8>>);

impl<const N: u32> ImageMerkleTree<N> {
    pub fn new(image: &PixelBuffer) -> Self {
        let (width, height) = image.dimensions();
        let chunks_wide = DivCeil::div_ceil(width, N) as usize;
        let chunks_high = DivCeil::div_ceil(height, N) as usize;

        let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(chunks_wide * chunks_high);
        for chunk_y in (0..height).step_by(N as usize) {
            for chunk_x in (0..width).step_by(N as usize) {
                let x_end = (chunk_x + N).min(width);
                let y_end = (chunk_y + N).min(height);
                let mut chunk = Vec::with_capacity(
                    (x_end - chunk_x) as usize * (y_end - chunk_y) as usize * BYTES_PER_PIXEL,
                );
                for y in chunk_y..y_end {
                    for x in chunk_x..x_end {
                        chunk.extend_from_slice(&image.pixel(x, y));
                    }
                }
                chunks.push(chunk);
            }
        }

        // The underlying tree needs at least two leaves. Pad small images with
        // empty sentinel chunks so roots stay well-defined and deterministic.
        while chunks.len() < 2 {
            chunks.push(Vec::new());
        }

        Self(MerkleTree::new(&chunks))
    }
}

impl<const N: u32> Deref for ImageMerkleTree<N> {
    type Target = MerkleTree<Vec<u8>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
