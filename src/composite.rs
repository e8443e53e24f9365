use kurbo::{Affine, Point, Vec2};

use crate::core::{mul_div255, AlphaMask, FitTransform, Raster};
use crate::error::{WraplabError, WraplabResult};
use crate::layer::{Layer, LayerStack};
use crate::template::Template;

/// How the template's alpha is applied to the accumulated layer surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskPolarity {
    /// Keep only pixels where the template is opaque (destination-in).
    RetainUnderTemplate,
    /// Drop pixels where the template is opaque (destination-out), for
    /// templates authored with an inverted alpha.
    RemoveUnderTemplate,
}

/// Guess the template's mask polarity by sampling a 5x5 neighborhood around
/// its geometric center: a near-transparent center (average alpha <= 10) is
/// taken to mean the alpha is inverted. A heuristic about authoring intent;
/// preview-only, and callers may override the result. Export never uses it.
pub fn detect_mask_polarity(mask: &AlphaMask) -> MaskPolarity {
    let mid_x = mask.width() / 2;
    let mid_y = mask.height() / 2;
    let mut sum = 0u32;
    let mut count = 0u32;
    for dy in -2i64..=2 {
        for dx in -2i64..=2 {
            let x = (i64::from(mid_x) + dx).clamp(0, i64::from(mask.width()) - 1) as u32;
            let y = (i64::from(mid_y) + dy).clamp(0, i64::from(mask.height()) - 1) as u32;
            sum += u32::from(mask.alpha(x, y));
            count += 1;
        }
    }
    let avg = f64::from(sum) / f64::from(count.max(1));
    if avg <= 10.0 {
        MaskPolarity::RemoveUnderTemplate
    } else {
        MaskPolarity::RetainUnderTemplate
    }
}

/// Attenuate the surface's alpha by the template mask in place. RGB stays
/// untouched (straight-alpha rasters).
pub fn apply_template_mask(
    surface: &mut Raster,
    mask: &AlphaMask,
    polarity: MaskPolarity,
) -> WraplabResult<()> {
    if surface.width() != mask.width() || surface.height() != mask.height() {
        return Err(WraplabError::compositing(format!(
            "mask is {}x{} but surface is {}x{}",
            mask.width(),
            mask.height(),
            surface.width(),
            surface.height()
        )));
    }
    let mask_data = mask.data();
    for (px, &m) in surface.data_mut().chunks_exact_mut(4).zip(mask_data) {
        let factor = match polarity {
            MaskPolarity::RetainUnderTemplate => m,
            MaskPolarity::RemoveUnderTemplate => 255 - m,
        };
        px[3] = mul_div255(u16::from(px[3]), u16::from(factor));
    }
    Ok(())
}

/// Compose every visible layer, bottom to top, onto a transparent surface
/// at template-native resolution. Layers whose pixels are not readable are
/// skipped (not-ready assets make drawing a no-op). Mutates nothing.
pub fn composite_layers(template: &Template, stack: &LayerStack) -> WraplabResult<Raster> {
    let mut surface = Raster::new(template.width(), template.height())?;
    for layer in stack.layers() {
        draw_layer(&mut surface, layer);
    }
    Ok(surface)
}

/// Draw one layer: translate to its center, rotate (degrees, clockwise
/// positive), then draw the preferred raster uniformly scaled and centered,
/// at the layer's opacity. Destination pixels inside the transformed bounds
/// are inverse-mapped and nearest-sampled so output is deterministic.
fn draw_layer(surface: &mut Raster, layer: &Layer) {
    if !layer.visible {
        return;
    }
    let Some(src) = layer.draw_raster() else {
        return;
    };
    let sw = f64::from(src.width());
    let sh = f64::from(src.height());

    // source pixel coords -> template space
    let affine = layer.placement.to_affine() * Affine::translate(Vec2::new(-sw / 2.0, -sh / 2.0));
    let inv = affine.inverse();

    // destination bounding box of the transformed source rect
    let corners = [
        affine * Point::new(0.0, 0.0),
        affine * Point::new(sw, 0.0),
        affine * Point::new(0.0, sh),
        affine * Point::new(sw, sh),
    ];
    let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().min(f64::from(surface.width()))).max(0.0) as u32;
    let y1 = (max_y.ceil().min(f64::from(surface.height()))).max(0.0) as u32;

    let opacity = layer.opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    for y in y0..y1 {
        for x in x0..x1 {
            let local = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if local.x < 0.0 || local.y < 0.0 || local.x >= sw || local.y >= sh {
                continue;
            }
            let sx = local.x as u32;
            let sy = local.y as u32;
            let px = src.pixel(sx, sy);
            if px[3] == 0 {
                continue;
            }
            surface.blend_pixel(x, y, px, opacity);
        }
    }
}

/// Source-over `src` into `dst` through a fit transform (nearest sampling).
/// Pixels outside the fitted content rectangle are left untouched, so any
/// uncovered border stays transparent.
fn draw_fitted(dst: &mut Raster, src: &Raster, fit: &FitTransform) {
    let sw = f64::from(src.width());
    let sh = f64::from(src.height());
    for y in 0..dst.height() {
        for x in 0..dst.width() {
            let (cx, cy) = fit.to_content(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if cx < 0.0 || cy < 0.0 || cx >= sw || cy >= sh {
                continue;
            }
            let px = src.pixel(cx as u32, cy as u32);
            if px[3] == 0 {
                continue;
            }
            dst.blend_pixel(x, y, px, 1.0);
        }
    }
}

/// Render the live preview into a viewport: template underdraw, layers
/// composited and masked by the detected polarity, the whole thing
/// fit-scaled and letterboxed.
///
/// Degrades when template pixels are restricted: layers still composite and
/// fit, but there is no underdraw and no masking (nothing can be sampled).
pub fn render_preview(
    template: &Template,
    stack: &LayerStack,
    viewport_w: u32,
    viewport_h: u32,
) -> WraplabResult<Raster> {
    let mut out = Raster::new(viewport_w, viewport_h)?;
    let fit = FitTransform::fit(template.width(), template.height(), viewport_w, viewport_h);

    if let Some(raster) = template.raster() {
        draw_fitted(&mut out, raster, &fit);
    }

    if !stack.is_empty() {
        let mut comp = composite_layers(template, stack)?;
        if let Ok(mask) = template.alpha_mask() {
            let polarity = detect_mask_polarity(&mask);
            apply_template_mask(&mut comp, &mask, polarity)?;
        }
        draw_fitted(&mut out, &comp, &fit);
    }

    Ok(out)
}

/// Render the export raster: composite, mask by template alpha (always
/// retain-under-template, no heuristic), fit into a target x target square
/// with transparent letterbox margins.
#[tracing::instrument(skip(template, stack), fields(target))]
pub fn render_export(
    template: &Template,
    stack: &LayerStack,
    target: u32,
) -> WraplabResult<Raster> {
    if target == 0 {
        return Err(WraplabError::validation("export size must be > 0"));
    }
    let mask = template.alpha_mask().map_err(|_| {
        WraplabError::pixel_access(
            "export requires readable template pixels for masking",
        )
    })?;

    let mut comp = composite_layers(template, stack)?;
    apply_template_mask(&mut comp, &mask, MaskPolarity::RetainUnderTemplate)?;

    let mut out = Raster::new(target, target)?;
    let fit = FitTransform::fit(template.width(), template.height(), target, target);
    draw_fitted(&mut out, &comp, &fit);
    Ok(out)
}
