use crate::core::{AlphaMask, Placement, Raster, Rgb};
use crate::error::{WraplabError, WraplabResult};
use crate::segment::Region;
use crate::template::{Pixels, Template};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct LayerId(pub u32);

/// Recolorable fills keep their opacity mask forever and re-render a cached
/// raster from it whenever the color changes; the mask is never touched.
#[derive(Clone, Debug)]
pub enum LayerSource {
    Image {
        pixels: Pixels,
    },
    RecolorableFill {
        mask: Raster,
        rendered: Raster,
        color: Rgb,
    },
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub source: LayerSource,
    pub placement: Placement,
    pub opacity: f32,
    pub visible: bool,
}

impl Layer {
    pub fn source_size(&self) -> (u32, u32) {
        match &self.source {
            LayerSource::Image { pixels } => (pixels.width(), pixels.height()),
            LayerSource::RecolorableFill { mask, .. } => (mask.width(), mask.height()),
        }
    }

    /// Rendered cache when one exists, otherwise the raw source; `None`
    /// when pixels are not ready.
    pub fn draw_raster(&self) -> Option<&Raster> {
        match &self.source {
            LayerSource::Image { pixels } => pixels.raster(),
            LayerSource::RecolorableFill { rendered, .. } => Some(rendered),
        }
    }

    /// Raster the hit tester samples, mask preferred over source. `None`
    /// means the caller falls back to bounding-box containment.
    pub fn hit_raster(&self) -> Option<&Raster> {
        match &self.source {
            LayerSource::RecolorableFill { mask, .. } => Some(mask),
            LayerSource::Image { pixels } => pixels.raster(),
        }
    }

    pub fn is_recolorable(&self) -> bool {
        matches!(self.source, LayerSource::RecolorableFill { .. })
    }

    pub fn color(&self) -> Option<Rgb> {
        match &self.source {
            LayerSource::RecolorableFill { color, .. } => Some(*color),
            LayerSource::Image { .. } => None,
        }
    }

    /// Re-render a recolorable fill from its retained mask. The new raster
    /// is built completely before it replaces the cache, so a failure never
    /// leaves a half-updated layer.
    pub fn recolor(&mut self, new_color: Rgb) -> WraplabResult<()> {
        let LayerSource::RecolorableFill {
            mask,
            rendered,
            color,
        } = &mut self.source
        else {
            return Err(WraplabError::validation("layer is not recolorable"));
        };
        let fresh = render_fill(mask, new_color)?;
        *rendered = fresh;
        *color = new_color;
        Ok(())
    }
}

pub fn render_fill(mask: &Raster, color: Rgb) -> WraplabResult<Raster> {
    let mut out = Raster::new(mask.width(), mask.height())?;
    let src = mask.data();
    let dst = out.data_mut();
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3];
        if a == 0 {
            continue;
        }
        d[0] = color.r;
        d[1] = color.g;
        d[2] = color.b;
        d[3] = a;
    }
    Ok(out)
}

/// Ordered layer sequence (index 0 is bottom) plus the at-most-one
/// selection. Owns every layer.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
    selected: Option<usize>,
    next_id: u32,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|i| self.layers.get(i))
    }

    pub fn selected_layer_mut(&mut self) -> Option<&mut Layer> {
        self.selected.and_then(|i| self.layers.get_mut(i))
    }

    pub fn select(&mut self, index: usize) -> WraplabResult<()> {
        if index >= self.layers.len() {
            return Err(WraplabError::validation(format!(
                "layer index {index} out of range ({} layers)",
                self.layers.len()
            )));
        }
        self.selected = Some(index);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn reset(&mut self) {
        self.layers.clear();
        self.selected = None;
    }

    fn bump_id(&mut self) -> LayerId {
        self.next_id += 1;
        LayerId(self.next_id)
    }

    fn push(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        let idx = self.layers.len() - 1;
        self.selected = Some(idx);
        idx
    }

    /// Add an image layer centered on the template.
    pub fn add_image(&mut self, pixels: Pixels, template: &Template) -> usize {
        let id = self.bump_id();
        let layer = Layer {
            id,
            name: format!("Layer {}", id.0),
            source: LayerSource::Image { pixels },
            placement: Placement::centered(
                f64::from(template.width()) / 2.0,
                f64::from(template.height()) / 2.0,
            ),
            opacity: 1.0,
            visible: true,
        };
        self.push(layer)
    }

    pub fn add_template_fill(&mut self, mask: &AlphaMask, color: Rgb) -> WraplabResult<usize> {
        let mut mask_raster = Raster::new(mask.width(), mask.height())?;
        let dst = mask_raster.data_mut();
        for (i, &a) in mask.data().iter().enumerate() {
            dst[i * 4 + 3] = a;
        }
        let rendered = render_fill(&mask_raster, color)?;
        let id = self.bump_id();
        let layer = Layer {
            id,
            name: format!("Fill {}", id.0),
            source: LayerSource::RecolorableFill {
                mask: mask_raster,
                rendered,
                color,
            },
            placement: Placement::centered(
                f64::from(mask.width()) / 2.0,
                f64::from(mask.height()) / 2.0,
            ),
            opacity: 1.0,
            visible: true,
        };
        Ok(self.push(layer))
    }

    /// One recolorable layer per region, each centered on its bounding box.
    pub fn add_regions(&mut self, regions: Vec<Region>, color: Rgb) -> WraplabResult<usize> {
        if regions.is_empty() {
            return Err(WraplabError::segmentation("no regions to materialize"));
        }
        let mut last = 0;
        for region in regions {
            let rendered = render_fill(&region.raster, color)?;
            let (cx, cy) = region.bounds.center();
            let id = self.bump_id();
            let layer = Layer {
                id,
                name: format!("Region {}", id.0),
                source: LayerSource::RecolorableFill {
                    mask: region.raster,
                    rendered,
                    color,
                },
                placement: Placement::centered(cx, cy),
                opacity: 1.0,
                visible: true,
            };
            last = self.push(layer);
        }
        Ok(last)
    }

    /// Remove the selected layer; the selection clamps to the new range.
    pub fn remove_selected(&mut self) {
        let Some(i) = self.selected else { return };
        self.layers.remove(i);
        self.selected = if self.layers.is_empty() {
            None
        } else {
            Some(i.min(self.layers.len() - 1))
        };
    }

    pub fn bring_selected_front(&mut self) {
        let Some(i) = self.selected else { return };
        let layer = self.layers.remove(i);
        self.layers.push(layer);
        self.selected = Some(self.layers.len() - 1);
    }

    /// Swap with the layer below, keeping the selection on the moved layer.
    pub fn move_down(&mut self, index: usize) {
        if index == 0 || index >= self.layers.len() {
            return;
        }
        self.layers.swap(index, index - 1);
        if self.selected == Some(index) {
            self.selected = Some(index - 1);
        }
    }

    pub fn move_up(&mut self, index: usize) {
        if index + 1 >= self.layers.len() {
            return;
        }
        self.layers.swap(index, index + 1);
        if self.selected == Some(index) {
            self.selected = Some(index + 1);
        }
    }

    pub fn toggle_visible(&mut self, index: usize) {
        if let Some(layer) = self.layers.get_mut(index) {
            layer.visible = !layer.visible;
        }
    }

    pub fn rename_selected(&mut self, name: impl Into<String>) {
        if let Some(layer) = self.selected_layer_mut() {
            layer.name = name.into();
        }
    }

    pub fn fit_selected_to_template(&mut self, template: &Template) {
        let (tw, th) = (f64::from(template.width()), f64::from(template.height()));
        let Some(layer) = self.selected_layer_mut() else {
            return;
        };
        let (sw, sh) = layer.source_size();
        if sw == 0 || sh == 0 {
            return;
        }
        layer
            .placement
            .set_scale(f64::min(tw / f64::from(sw), th / f64::from(sh)));
        layer.placement.x = tw / 2.0;
        layer.placement.y = th / 2.0;
    }

    pub fn recolor_selected(&mut self, color: Rgb) -> WraplabResult<()> {
        let layer = self
            .selected_layer_mut()
            .ok_or_else(|| WraplabError::validation("no layer selected"))?;
        layer.recolor(color)
    }
}
