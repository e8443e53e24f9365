use std::path::Path;

use crate::core::{AlphaMask, Raster};
use crate::error::{WraplabError, WraplabResult};

/// Readiness/access state of an asset's pixel data. `Restricted` knows the
/// dimensions but cannot read pixels; consumers needing exact pixels must
/// degrade instead of failing the interaction.
#[derive(Clone, Debug)]
pub enum Pixels {
    Ready(Raster),
    Restricted { width: u32, height: u32 },
}

impl Pixels {
    pub fn width(&self) -> u32 {
        match self {
            Pixels::Ready(r) => r.width(),
            Pixels::Restricted { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Pixels::Ready(r) => r.height(),
            Pixels::Restricted { height, .. } => *height,
        }
    }

    pub fn raster(&self) -> Option<&Raster> {
        match self {
            Pixels::Ready(r) => Some(r),
            Pixels::Restricted { .. } => None,
        }
    }
}

/// The base vehicle raster. Its native pixel dimensions define the
/// compositing coordinate space for all layers.
#[derive(Clone, Debug)]
pub struct Template {
    pixels: Pixels,
}

impl Template {
    pub fn from_raster(raster: Raster) -> Self {
        Self {
            pixels: Pixels::Ready(raster),
        }
    }

    pub fn restricted(width: u32, height: u32) -> WraplabResult<Self> {
        if width == 0 || height == 0 {
            return Err(WraplabError::validation(
                "template width/height must be > 0",
            ));
        }
        Ok(Self {
            pixels: Pixels::Restricted { width, height },
        })
    }

    pub fn load(path: &Path) -> WraplabResult<Self> {
        let img = image::open(path)
            .map_err(|e| {
                WraplabError::validation(format!(
                    "failed to decode template '{}': {e}",
                    path.display()
                ))
            })?
            .to_rgba8();
        let (w, h) = (img.width(), img.height());
        Ok(Self::from_raster(Raster::from_rgba8(w, h, img.into_raw())?))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    pub fn raster(&self) -> Option<&Raster> {
        self.pixels.raster()
    }

    /// Per-pixel opacity raster, always exactly the template's dimensions.
    /// Fails when pixel access is restricted.
    pub fn alpha_mask(&self) -> WraplabResult<AlphaMask> {
        let raster = self.raster().ok_or_else(|| {
            WraplabError::pixel_access("template pixel data is not readable")
        })?;
        let data = raster
            .data()
            .chunks_exact(4)
            .map(|px| px[3])
            .collect::<Vec<u8>>();
        AlphaMask::from_bytes(raster.width(), raster.height(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_alpha(w: u32, h: u32) -> Raster {
        let mut r = Raster::new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                let a = if (x + y) % 2 == 0 { 255 } else { 0 };
                r.put_pixel(x, y, [10, 20, 30, a]);
            }
        }
        r
    }

    #[test]
    fn alpha_mask_matches_template_dimensions() {
        let t = Template::from_raster(checker_alpha(5, 3));
        let m = t.alpha_mask().unwrap();
        assert_eq!((m.width(), m.height()), (5, 3));
        assert_eq!(m.alpha(0, 0), 255);
        assert_eq!(m.alpha(1, 0), 0);
    }

    #[test]
    fn restricted_template_reports_pixel_access_error() {
        let t = Template::restricted(8, 8).unwrap();
        assert_eq!((t.width(), t.height()), (8, 8));
        match t.alpha_mask() {
            Err(WraplabError::PixelAccess(_)) => {}
            other => panic!("expected pixel access error, got {other:?}"),
        }
    }
}
