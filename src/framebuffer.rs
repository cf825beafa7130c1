use log::debug;

use crate::error::RasterError;
use crate::event::PixelEvent;

pub const DEFAULT_PAD: usize = 3;
pub const DEFAULT_MAX_CELLS: usize = 1 << 26;

/// Inclusive bounds of all valid event coordinates, plus a margin of `pad`
/// cells on every side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pad: usize,
}

impl Viewport {
    pub fn around(x: u32, y: u32, pad: usize) -> Self {
        Viewport {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pad,
        }
    }

    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> usize {
        ((self.max_x - self.min_x) as usize)
            .saturating_add(1)
            .saturating_add(self.pad.saturating_mul(2))
    }

    pub fn height(&self) -> usize {
        ((self.max_y - self.min_y) as usize)
            .saturating_add(1)
            .saturating_add(self.pad.saturating_mul(2))
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Maps a log coordinate to its `(row, col)` in the raster.
    pub fn to_cell(&self, x: u32, y: u32) -> Option<(usize, usize)> {
        if !self.contains(x, y) {
            return None;
        }
        let row = (y - self.min_y) as usize + self.pad;
        let col = (x - self.min_x) as usize + self.pad;
        Some((row, col))
    }

    /// Maps a raster `(row, col)` back to log `(x, y)`. Padding cells map to
    /// coordinates outside the bounds, possibly negative.
    pub fn to_logical(&self, row: usize, col: usize) -> (i64, i64) {
        let x = col as i64 - self.pad as i64 + self.min_x as i64;
        let y = row as i64 - self.pad as i64 + self.min_y as i64;
        (x, y)
    }

    /// Display extent as `[left, right, bottom, top]` with y growing down.
    pub fn extent(&self) -> [i64; 4] {
        let pad = self.pad as i64;
        [
            self.min_x as i64 - pad,
            self.max_x as i64 + pad + 1,
            self.max_y as i64 + pad + 1,
            self.min_y as i64 - pad,
        ]
    }
}

/// Row-major RGB raster, black until written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Framebuffer {
    fn new(width: usize, height: usize) -> Self {
        Framebuffer {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    fn set_cell(&mut self, row: usize, col: usize, rgb: (u8, u8, u8)) {
        let base = (row * self.width + col) * 3;
        if col < self.width && base + 2 < self.data.len() {
            self.data[base] = rgb.0;
            self.data[base + 1] = rgb.1;
            self.data[base + 2] = rgb.2;
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<(u8, u8, u8)> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let base = (row * self.width + col) * 3;
        Some((self.data[base], self.data[base + 1], self.data[base + 2]))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.width * 3)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub framebuffer: Framebuffer,
    pub viewport: Viewport,
}

impl Raster {
    /// Allocates a black raster covering `viewport`.
    pub fn blank(viewport: Viewport, max_cells: usize) -> Result<Self, RasterError> {
        let width = viewport.width();
        let height = viewport.height();

        // Three bytes per cell must also fit in memory indexing.
        match width.checked_mul(height) {
            Some(cells) if cells <= max_cells && cells.checked_mul(3).is_some() => {}
            _ => {
                return Err(RasterError::TooLarge {
                    width,
                    height,
                    limit: max_cells,
                });
            }
        }

        debug!(
            "Allocating {}x{} raster for x {}..={}, y {}..={}",
            width, height, viewport.min_x, viewport.max_x, viewport.min_y, viewport.max_y
        );

        Ok(Raster {
            framebuffer: Framebuffer::new(width, height),
            viewport,
        })
    }

    /// Writes the event's color over whatever the cell held. Returns false
    /// for events that are invalid or outside the viewport.
    pub fn plot(&mut self, event: &PixelEvent) -> bool {
        if !event.valid {
            return false;
        }
        match self.viewport.to_cell(event.x, event.y) {
            Some((row, col)) => {
                self.framebuffer.set_cell(row, col, event.rgb());
                true
            }
            None => false,
        }
    }
}

pub struct FramebufferBuilder {
    pad: usize,
    max_cells: usize,
    viewport: Option<Viewport>,
    events: Vec<PixelEvent>,
}

impl FramebufferBuilder {
    pub fn new(pad: usize) -> Self {
        FramebufferBuilder {
            pad,
            max_cells: DEFAULT_MAX_CELLS,
            viewport: None,
            events: Vec::new(),
        }
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn push(&mut self, event: PixelEvent) {
        if !event.valid {
            return;
        }
        match self.viewport.as_mut() {
            Some(viewport) => viewport.include(event.x, event.y),
            None => self.viewport = Some(Viewport::around(event.x, event.y, self.pad)),
        }
        self.events.push(event);
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn finish(self) -> Result<Raster, RasterError> {
        let viewport = self.viewport.ok_or(RasterError::Empty)?;
        let mut raster = Raster::blank(viewport, self.max_cells)?;
        for event in &self.events {
            raster.plot(event);
        }
        Ok(raster)
    }
}

impl Default for FramebufferBuilder {
    fn default() -> Self {
        FramebufferBuilder::new(DEFAULT_PAD)
    }
}

impl Extend<PixelEvent> for FramebufferBuilder {
    fn extend<T: IntoIterator<Item = PixelEvent>>(&mut self, iter: T) {
        for event in iter {
            self.push(event);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BLACK: (u8, u8, u8) = (0, 0, 0);

    fn px(x: u32, y: u32, color: u32) -> PixelEvent {
        PixelEvent::new(x, y, true, color)
    }

    fn build(events: &[PixelEvent], pad: usize) -> Result<Raster, RasterError> {
        let mut builder = FramebufferBuilder::new(pad);
        builder.extend(events.iter().copied());
        builder.finish()
    }

    #[test]
    fn test_three_pixel_raster() {
        let events = [px(0, 0, 0xFF0000), px(1, 0, 0x00FF00), px(0, 1, 0x0000FF)];
        let raster = build(&events, 1).unwrap();
        let fb = &raster.framebuffer;

        assert_eq!((fb.height(), fb.width()), (4, 4));
        assert_eq!(fb.cell(1, 1), Some((0xFF, 0, 0)));
        assert_eq!(fb.cell(1, 2), Some((0, 0xFF, 0)));
        assert_eq!(fb.cell(2, 1), Some((0, 0, 0xFF)));

        for row in 0..4 {
            for col in 0..4 {
                if [(1, 1), (1, 2), (2, 1)].contains(&(row, col)) {
                    continue;
                }
                assert_eq!(fb.cell(row, col), Some(BLACK), "cell ({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_default_pad_dimensions() {
        let raster = build(&[px(10, 20, 0xFFFFFF), px(14, 21, 0xFFFFFF)], DEFAULT_PAD).unwrap();
        assert_eq!(raster.framebuffer.width(), 5 + 6);
        assert_eq!(raster.framebuffer.height(), 2 + 6);
        assert_eq!(raster.framebuffer.cell(3, 3), Some((0xFF, 0xFF, 0xFF)));
        assert_eq!(raster.framebuffer.cell(4, 7), Some((0xFF, 0xFF, 0xFF)));
        assert_eq!(raster.framebuffer.cell(8, 0), None);
    }

    #[test]
    fn test_last_write_wins() {
        let raster = build(&[px(5, 5, 0x112233), px(5, 5, 0x445566)], 0).unwrap();
        assert_eq!(raster.framebuffer.cell(0, 0), Some((0x44, 0x55, 0x66)));

        let raster = build(&[px(5, 5, 0x445566), px(5, 5, 0x112233)], 0).unwrap();
        assert_eq!(raster.framebuffer.cell(0, 0), Some((0x11, 0x22, 0x33)));
    }

    #[test]
    fn test_viewport_order_independent() {
        let events = vec![px(7, 3, 1), px(2, 9, 2), px(4, 4, 3), px(11, 0, 4)];
        let expected = Viewport {
            min_x: 2,
            min_y: 0,
            max_x: 11,
            max_y: 9,
            pad: 3,
        };

        let mut reversed = events.clone();
        reversed.reverse();
        let mut rotated = events.clone();
        rotated.rotate_left(2);

        for order in [&events, &reversed, &rotated] {
            let mut builder = FramebufferBuilder::new(3);
            builder.extend(order.iter().copied());
            assert_eq!(builder.viewport(), Some(expected));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(build(&[], 3), Err(RasterError::Empty)));

        let mut builder = FramebufferBuilder::default();
        builder.push(PixelEvent::new(1, 1, false, 0xFFFFFF));
        assert!(builder.is_empty());
        assert!(builder.finish().unwrap_err().is_empty());
    }

    #[test]
    fn test_too_large() {
        let mut builder = FramebufferBuilder::new(0).with_max_cells(100);
        builder.push(px(0, 0, 1));
        builder.push(px(10, 10, 1));
        match builder.finish() {
            Err(RasterError::TooLarge { width, height, limit }) => {
                assert_eq!((width, height, limit), (11, 11, 100));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_huge_limit_does_not_overflow() {
        let viewport = Viewport::around(0, 0, usize::MAX / 4);
        match Raster::blank(viewport, usize::MAX) {
            Err(RasterError::TooLarge { limit, .. }) => assert_eq!(limit, usize::MAX),
            other => panic!("unexpected result {:?}", other),
        }

        let mut builder = FramebufferBuilder::new(0).with_max_cells(usize::MAX);
        builder.push(px(0, 0, 1));
        builder.push(px(u32::MAX, u32::MAX, 1));
        assert!(matches!(builder.finish(), Err(RasterError::TooLarge { .. })));
    }

    #[test]
    fn test_rebuild_is_identical() {
        let events = [px(3, 8, 0xABCDEF), px(9, 1, 0x010203), px(3, 8, 0x0F0F0F)];
        assert_eq!(build(&events, 2).unwrap(), build(&events, 2).unwrap());
    }

    #[test]
    fn test_coordinate_mapping_inverts() {
        let viewport = Viewport {
            min_x: 100,
            min_y: 40,
            max_x: 120,
            max_y: 44,
            pad: 3,
        };
        let (row, col) = viewport.to_cell(105, 42).unwrap();
        assert_eq!((row, col), (5, 8));
        assert_eq!(viewport.to_logical(row, col), (105, 42));
        assert_eq!(viewport.to_logical(0, 0), (97, 37));
        assert_eq!(viewport.to_cell(99, 42), None);
        assert_eq!(viewport.extent(), [97, 124, 48, 37]);
    }

    #[test]
    fn test_plot_rejects_outside_events() {
        let mut raster = Raster::blank(Viewport::around(2, 2, 1), DEFAULT_MAX_CELLS).unwrap();
        assert!(!raster.plot(&px(3, 2, 0xFFFFFF)));
        assert!(!raster.plot(&PixelEvent::new(2, 2, false, 0xFFFFFF)));
        assert!(raster.plot(&px(2, 2, 0xFFFFFF)));
        assert_eq!(raster.framebuffer.rows().count(), 3);
    }
}
