use crate::error::{WraplabError, WraplabResult};

pub use kurbo::{Affine, Point, Vec2};

/// Smallest uniform scale a layer placement may carry.
pub const MIN_LAYER_SCALE: f64 = 0.05;

/// Straight (non-premultiplied) RGBA8 raster, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> WraplabResult<Self> {
        if width == 0 || height == 0 {
            return Err(WraplabError::validation("raster width/height must be > 0"));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| WraplabError::validation("raster dimensions overflow"))?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> WraplabResult<Self> {
        if width == 0 || height == 0 {
            return Err(WraplabError::validation("raster width/height must be > 0"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| WraplabError::validation("raster dimensions overflow"))?;
        if data.len() != expected {
            return Err(WraplabError::validation(format!(
                "raster buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
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

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    /// Pixel at (x, y); caller guarantees bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.data[self.offset(x, y) + 3]
    }

    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4], opacity: f32) {
        let out = over(self.pixel(x, y), src, opacity);
        self.put_pixel(x, y, out);
    }
}

/// One opacity byte per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl AlphaMask {
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>) -> WraplabResult<Self> {
        let expected = (width as usize) * (height as usize);
        if width == 0 || height == 0 || data.len() != expected {
            return Err(WraplabError::validation(format!(
                "alpha mask buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
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

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.width as usize) + (x as usize)]
    }
}

/// Fill color, serialized as `#rrggbb`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb` (leading `#` optional).
    pub fn parse_hex(s: &str) -> WraplabResult<Self> {
        let h = s.trim().trim_start_matches('#');
        let expanded;
        let h = if h.len() == 3 {
            let mut buf = String::with_capacity(6);
            for c in h.chars() {
                buf.push(c);
                buf.push(c);
            }
            expanded = buf;
            expanded.as_str()
        } else {
            h
        };
        if h.len() != 6 || !h.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WraplabError::validation(format!(
                "invalid color '{s}', expected #rrggbb"
            )));
        }
        let byte = |i: usize| u8::from_str_radix(&h[i..i + 2], 16).unwrap_or(0);
        Ok(Self::new(byte(0), byte(2), byte(4)))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        Rgb::parse_hex(&s).map_err(|e| e.to_string())
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> String {
        c.to_hex()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation_deg: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation_deg: 0.0,
        }
    }
}

impl Placement {
    pub fn centered(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale.max(MIN_LAYER_SCALE);
    }

    /// Local (source-centered) coordinates to template space. Canonical
    /// order: T(center) * R(rotation) * S(scale); rotation is degrees,
    /// clockwise-positive in the y-down raster frame.
    pub fn to_affine(self) -> Affine {
        Affine::translate(Vec2::new(self.x, self.y))
            * Affine::rotate(self.rotation_deg.to_radians())
            * Affine::scale(self.scale.max(MIN_LAYER_SCALE))
    }

    pub fn validate(&self) -> WraplabResult<()> {
        if !(self.x.is_finite() && self.y.is_finite() && self.scale.is_finite()) {
            return Err(WraplabError::validation("placement must be finite"));
        }
        if self.scale < MIN_LAYER_SCALE {
            return Err(WraplabError::validation(format!(
                "placement scale must be >= {MIN_LAYER_SCALE}"
            )));
        }
        Ok(())
    }
}

/// Uniform fit of a content rectangle into a viewport, centered, letterboxed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitTransform {
    pub fn fit(content_w: u32, content_h: u32, viewport_w: u32, viewport_h: u32) -> Self {
        let scale = f64::min(
            f64::from(viewport_w) / f64::from(content_w),
            f64::from(viewport_h) / f64::from(content_h),
        );
        let draw_w = f64::from(content_w) * scale;
        let draw_h = f64::from(content_h) * scale;
        Self {
            scale,
            offset_x: (f64::from(viewport_w) - draw_w) / 2.0,
            offset_y: (f64::from(viewport_h) - draw_h) / 2.0,
        }
    }

    pub fn to_content(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.offset_x) / self.scale,
            (y - self.offset_y) / self.scale,
        )
    }

    pub fn to_display(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.offset_x + x * self.scale,
            self.offset_y + y * self.scale,
        )
    }
}

/// Source-over for straight-alpha RGBA8, `src` attenuated by `opacity`.
///
/// With weights `ws = sa*op` and `wd = da*(1-sa*op)` the result is
/// `outA = ws + wd`, `outC = (sc*ws + dc*wd) / outA`.
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let ws = u32::from(mul_div255(u16::from(src[3]), op));
    if ws == 0 {
        return dst;
    }
    let wd = u32::from(mul_div255(u16::from(dst[3]), (255 - ws) as u16));

    let out_a = ws + wd;
    if out_a == 0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let num = u32::from(src[i]) * ws + u32::from(dst[i]) * wd;
        out[i] = ((num + out_a / 2) / out_a) as u8;
    }
    out[3] = out_a as u8;
    out
}

#[inline]
pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
