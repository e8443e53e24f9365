use crate::core::FitTransform;
use crate::layer::{LayerSource, LayerStack};
use crate::template::Pixels;

/// Alpha above which a sampled pixel counts as a hit (noise floor).
const HIT_ALPHA_THRESHOLD: u8 = 10;

/// Map a display-space pointer position to the topmost visible layer whose
/// pixel there is non-transparent. Each layer is tested by inverting its
/// placement (inverse rotate, inverse scale, bbox reject) and sampling one
/// pixel; layers whose pixels cannot be read are accepted on bounding-box
/// containment alone rather than failing the interaction.
pub fn hit_test(
    stack: &LayerStack,
    view: &FitTransform,
    display_x: f64,
    display_y: f64,
) -> Option<usize> {
    let (tx, ty) = view.to_content(display_x, display_y);

    for (i, layer) in stack.layers().iter().enumerate().rev() {
        if !layer.visible {
            continue;
        }
        let (sw, sh) = layer.source_size();
        if sw == 0 || sh == 0 {
            continue;
        }
        let scale = layer.placement.scale;
        let scaled_w = f64::from(sw) * scale;
        let scaled_h = f64::from(sh) * scale;

        // local coords relative to the layer center, unrotated
        let dx = tx - layer.placement.x;
        let dy = ty - layer.placement.y;
        let ang = -layer.placement.rotation_deg.to_radians();
        let rx = dx * ang.cos() - dy * ang.sin();
        let ry = dx * ang.sin() + dy * ang.cos();

        if rx < -scaled_w / 2.0
            || rx > scaled_w / 2.0
            || ry < -scaled_h / 2.0
            || ry > scaled_h / 2.0
        {
            continue;
        }

        let Some(raster) = layer.hit_raster() else {
            // pixel access unavailable: bounding box is the best we can do
            if matches!(
                &layer.source,
                LayerSource::Image {
                    pixels: Pixels::Restricted { .. }
                }
            ) {
                return Some(i);
            }
            continue;
        };

        let u = (rx + scaled_w / 2.0) / scaled_w;
        let v = (ry + scaled_h / 2.0) / scaled_h;
        let sx = ((u * f64::from(sw)) as u32).min(sw - 1);
        let sy = ((v * f64::from(sh)) as u32).min(sh - 1);
        if raster.alpha(sx, sy) > HIT_ALPHA_THRESHOLD {
            return Some(i);
        }
    }
    None
}
