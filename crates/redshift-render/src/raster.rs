//! CPU-side RGBA8 image used for every layer of the frame.

/// Straight (non-premultiplied) RGBA8 color.
pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];
pub const OPAQUE_BLACK: Rgba = [0, 0, 0, 255];

/// Raster and image shape errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RasterError {
    /// Two rasters that must match in size do not.
    #[error("raster size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// A pixel buffer does not hold `width * height * 4` bytes.
    #[error("pixel buffer holds {len} bytes, expected {expected}")]
    BadLength { len: usize, expected: usize },
}

/// An RGBA8 image, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Transparent black image. Zero dimensions are bumped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, TRANSPARENT)
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let mut data = Vec::with_capacity(byte_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RasterError> {
        let expected = byte_len(width, height);
        if data.len() != expected || width == 0 || height == 0 {
            return Err(RasterError::BadLength {
                len: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
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

    pub fn same_size(&self, other: &Raster) -> bool {
        self.dimensions() == other.dimensions()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Fill with `color` in place. Never reallocates.
    pub fn clear(&mut self, color: Rgba) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    /// Reallocate to a new size, cleared to transparent.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = self.offset(x, y);
        Some([
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ])
    }

    /// Overwrite one pixel. Out-of-bounds writes are dropped.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let o = self.offset(x, y);
        self.data[o..o + 4].copy_from_slice(&color);
    }

    /// Source-over blend of one pixel, signed coordinates, clipped.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let o = self.offset(x as u32, y as u32);
        blend_over(&mut self.data[o..o + 4], &color);
    }

    /// Add light to one pixel, saturating. Alpha becomes opaque.
    pub fn add_pixel(&mut self, x: i32, y: i32, rgb: [f32; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let o = self.offset(x as u32, y as u32);
        for (c, add) in self.data[o..o + 3].iter_mut().zip(rgb) {
            *c = (*c as f32 + add.max(0.0)).clamp(0.0, 255.0).round() as u8;
        }
        self.data[o + 3] = 255;
    }

    /// Copy every pixel of `src`. Both rasters must have the same size.
    pub fn copy_from(&mut self, src: &Raster) -> Result<(), RasterError> {
        if !self.same_size(src) {
            return Err(RasterError::SizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: src.width,
                height: src.height,
            });
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Copy the overlapping top-left region of `src`. Returns the copied size.
    pub fn blit_clipped(&mut self, src: &Raster) -> (u32, u32) {
        let w = self.width.min(src.width);
        let h = self.height.min(src.height);
        let row_len = w as usize * 4;
        for y in 0..h {
            let s = src.offset(0, y);
            let d = self.offset(0, y);
            self.data[d..d + row_len].copy_from_slice(&src.data[s..s + row_len]);
        }
        (w, h)
    }

    /// Alpha-composite `src` on top of `self` with its top-left corner at `(dx, dy)`.
    pub fn composite_over_at(&mut self, src: &Raster, dx: i32, dy: i32) {
        self.for_overlap(src, dx, dy, |d, s| blend_over(d, s));
    }

    pub fn composite_over(&mut self, src: &Raster) {
        self.composite_over_at(src, 0, 0);
    }

    /// Alpha-composite `src` *behind* `self`: `src` only shows where `self` is
    /// not fully opaque.
    pub fn composite_under(&mut self, src: &Raster) {
        self.for_overlap(src, 0, 0, |d, s| {
            if d[3] == 255 || s[3] == 0 {
                return;
            }
            let mut below = [s[0], s[1], s[2], s[3]];
            blend_over(&mut below, d);
            d.copy_from_slice(&below);
        });
    }

    fn for_overlap(&mut self, src: &Raster, dx: i32, dy: i32, mut op: impl FnMut(&mut [u8], &[u8])) {
        let start_x = (-dx).max(0);
        let start_y = (-dy).max(0);
        let end_x = (src.width as i32).min(self.width as i32 - dx);
        let end_y = (src.height as i32).min(self.height as i32 - dy);
        if start_x >= end_x || start_y >= end_y {
            return;
        }
        let len = (end_x - start_x) as usize * 4;
        for sy in start_y..end_y {
            let s = src.offset(start_x as u32, sy as u32);
            let d = self.offset((dx + start_x) as u32, (dy + sy) as u32);
            let src_row = &src.data[s..s + len];
            let dst_row = &mut self.data[d..d + len];
            for (dp, sp) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                op(dp, sp);
            }
        }
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Integer source-over for straight alpha.
fn blend_over(d: &mut [u8], s: &[u8]) {
    let sa = s[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        d.copy_from_slice(&s[..4]);
        return;
    }
    let da = d[3] as u32;
    let inv_sa = 255 - sa;
    let out_a = sa + (da * inv_sa) / 255;
    if out_a == 0 {
        return;
    }
    for i in 0..3 {
        let c = (s[i] as u32 * sa * 255 + d[i] as u32 * da * inv_sa) / (out_a * 255);
        d[i] = c.min(255) as u8;
    }
    d[3] = out_a.min(255) as u8;
}
