use std::io::{self, Write};

use crate::framebuffer::Raster;

pub const GRID_COLOR: [u8; 4] = [0x40, 0x40, 0x40, 0xFF];
const BACKGROUND: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];

/// Upscales a raster into an RGBA frame, one `scale`x`scale` block per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub scale: u32,
    /// Draws a 1px line on the top and left edge of every cell. Needs a
    /// scale of at least 3 to leave room for the cell color.
    pub grid: bool,
}

impl Canvas {
    pub fn new(scale: u32, grid: bool) -> Self {
        Canvas {
            scale: scale.max(1),
            grid,
        }
    }

    /// Shrinks the scale until the frame fits in `max_dim` on both axes.
    pub fn fit(self, raster: &Raster, max_dim: u32) -> Self {
        let fb = &raster.framebuffer;
        let longest = u32::try_from(fb.width().max(fb.height()))
            .unwrap_or(u32::MAX)
            .max(1);
        let limit = (max_dim / longest).max(1);
        Canvas {
            scale: self.scale.min(limit),
            grid: self.grid,
        }
    }

    /// Frame size in pixels, or `None` if it does not fit in `u32`.
    pub fn size(&self, raster: &Raster) -> Option<(u32, u32)> {
        let fb = &raster.framebuffer;
        let width = u32::try_from(fb.width()).ok()?.checked_mul(self.scale)?;
        let height = u32::try_from(fb.height()).ok()?.checked_mul(self.scale)?;
        Some((width, height))
    }

    /// Fills `frame`, an RGBA buffer of `size()` pixels. Draws nothing when
    /// the frame size overflows.
    pub fn draw(&self, raster: &Raster, frame: &mut [u8]) {
        let fb = &raster.framebuffer;
        let Some((width, _)) = self.size(raster) else {
            return;
        };
        let width = width as usize;
        let scale = self.scale as usize;
        let grid = self.grid && scale >= 3;

        for (i, pixel) in frame.chunks_exact_mut(4).enumerate() {
            let x = i % width;
            let y = i / width;

            let rgba = if grid && (x % scale == 0 || y % scale == 0) {
                GRID_COLOR
            } else {
                match fb.cell(y / scale, x / scale) {
                    Some((r, g, b)) => [r, g, b, 0xFF],
                    None => BACKGROUND,
                }
            };

            pixel.copy_from_slice(&rgba);
        }
    }
}

/// Writes the raster unscaled as a binary PPM (P6) image.
pub fn write_ppm<W: Write>(raster: &Raster, mut out: W) -> io::Result<()> {
    let fb = &raster.framebuffer;
    write!(out, "P6\n{} {}\n255\n", fb.width(), fb.height())?;
    out.write_all(fb.as_bytes())?;
    out.flush()
}
