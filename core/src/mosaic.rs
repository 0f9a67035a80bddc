use crate::image::{PixelBuffer, BYTES_PER_PIXEL};

/// Apply the block-averaging mosaic transform and halve the resolution.
///
/// The image is partitioned into blocks of side `max(granularity, 1)`. Every
/// pixel of a block is replaced by the arithmetic mean of the block's pixels,
/// computed per channel (alpha included) over the pixels actually present, so
/// partial blocks at the right and bottom borders average only what is there.
/// The averaged image is then downsampled to `floor(width / 2)` by
/// `floor(height / 2)` by taking every second pixel, regardless of
/// granularity.
///
/// The transform is pure: identical inputs produce byte-identical outputs,
/// which the proof engine relies on. A zero-area input yields a zero-area
/// mosaic.
pub fn mosaic(image: &PixelBuffer, granularity: u32) -> PixelBuffer {
    let (width, height) = image.dimensions();
    let block = granularity.max(1);

    // First pass: flatten each block to its mean color at full resolution.
    let mut averaged = vec![0u8; image.as_bytes().len()];
    for block_y in (0..height).step_by(block as usize) {
        for block_x in (0..width).step_by(block as usize) {
            let x_end = (block_x.saturating_add(block)).min(width);
            let y_end = (block_y.saturating_add(block)).min(height);

            let mut sums = [0u64; BYTES_PER_PIXEL];
            for y in block_y..y_end {
                for x in block_x..x_end {
                    let pixel = image.pixel(x, y);
                    for (sum, channel) in sums.iter_mut().zip(pixel) {
                        *sum += u64::from(channel);
                    }
                }
            }

            let count = u64::from(x_end - block_x) * u64::from(y_end - block_y);
            let mut mean = [0u8; BYTES_PER_PIXEL];
            for (channel, sum) in mean.iter_mut().zip(sums) {
                // Round half up; the sum of u8 samples cannot overflow u64.
                *channel = ((sum + count / 2) / count) as u8;
            }

            for y in block_y..y_end {
                for x in block_x..x_end {
                    let offset = pixel_offset(x, y, width);
                    averaged[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&mean);
                }
            }
        }
    }

    // Second pass: halve the resolution by nearest neighbor.
    let out_width = width / 2;
    let out_height = height / 2;
    let mut out =
        Vec::with_capacity(out_width as usize * out_height as usize * BYTES_PER_PIXEL);
    for y in 0..out_height {
        for x in 0..out_width {
            let offset = pixel_offset(2 * x, 2 * y, width);
            out.extend_from_slice(&averaged[offset..offset + BYTES_PER_PIXEL]);
        }
    }

    PixelBuffer::from_parts(out, out_width, out_height)
}

fn pixel_offset(x: u32, y: u32, width: u32) -> usize {
    (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL
}
