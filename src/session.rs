use std::path::Path;

use crate::composite::{render_export, render_preview};
use crate::core::{FitTransform, Raster, Rgb, MIN_LAYER_SCALE};
use crate::error::{WraplabError, WraplabResult};
use crate::export::{encode_png, export_with_fallback, suggested_name, ExportSink, SaveOutcome};
use crate::hittest::hit_test;
use crate::layer::LayerStack;
use crate::segment::{segment_regions, DEFAULT_THRESHOLD};
use crate::template::{Pixels, Template};

/// Interactive editor state: the loaded template, the layer stack, and the
/// current segmentation and fill controls.
#[derive(Debug)]
pub struct EditorSession {
    template: Option<Template>,
    model_key: Option<String>,
    stack: LayerStack,
    threshold: u8,
    fill_color: Rgb,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            template: None,
            model_key: None,
            stack: LayerStack::new(),
            threshold: DEFAULT_THRESHOLD,
            fill_color: Rgb::new(255, 59, 48),
        }
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut LayerStack {
        &mut self.stack
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn fill_color(&self) -> Rgb {
        self.fill_color
    }

    pub fn set_fill_color(&mut self, color: Rgb) {
        self.fill_color = color;
    }

    /// Switching models discards the wrap built for the previous body shape;
    /// layer placements only make sense against the template they were
    /// authored on.
    pub fn load_model(&mut self, key: &str, path: &Path) -> WraplabResult<()> {
        let template = Template::load(path)?;
        tracing::info!(
            model = key,
            width = template.width(),
            height = template.height(),
            "model loaded"
        );
        self.template = Some(template);
        self.model_key = Some(key.to_owned());
        self.stack.reset();
        Ok(())
    }

    pub fn set_template(&mut self, key: &str, template: Template) {
        self.template = Some(template);
        self.model_key = Some(key.to_owned());
        self.stack.reset();
    }

    /// Parse a threshold from user text; bad input keeps the previous value.
    pub fn set_threshold(&mut self, input: &str) -> WraplabResult<()> {
        let value: u8 = input.trim().parse().map_err(|_| {
            WraplabError::validation(format!(
                "threshold must be an integer in 0..=255, got '{input}'"
            ))
        })?;
        self.threshold = value;
        Ok(())
    }

    fn require_template(&self) -> WraplabResult<&Template> {
        self.template
            .as_ref()
            .ok_or_else(|| WraplabError::validation("no template loaded"))
    }

    pub fn add_image(&mut self, pixels: Pixels) -> WraplabResult<usize> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| WraplabError::validation("no template loaded"))?;
        Ok(self.stack.add_image(pixels, template))
    }

    pub fn add_fill(&mut self) -> WraplabResult<usize> {
        let mask = self.require_template()?.alpha_mask()?;
        self.stack.add_template_fill(&mask, self.fill_color)
    }

    pub fn add_fill_regions(&mut self) -> WraplabResult<usize> {
        let mask = self.require_template()?.alpha_mask()?;
        let regions = segment_regions(&mask, self.threshold, self.fill_color)?;
        self.stack.add_regions(regions, self.fill_color)
    }

    pub fn view_transform(&self, viewport_w: u32, viewport_h: u32) -> Option<FitTransform> {
        let t = self.template.as_ref()?;
        Some(FitTransform::fit(
            t.width(),
            t.height(),
            viewport_w,
            viewport_h,
        ))
    }

    /// Render the masked preview. `None` before any template is loaded.
    pub fn preview(&self, viewport_w: u32, viewport_h: u32) -> WraplabResult<Option<Raster>> {
        let Some(template) = self.template.as_ref() else {
            return Ok(None);
        };
        render_preview(template, &self.stack, viewport_w, viewport_h).map(Some)
    }

    pub fn export_raster(&self, size: u32) -> WraplabResult<Raster> {
        let template = self.require_template()?;
        render_export(template, &self.stack, size)
    }

    pub fn export_to(
        &self,
        sinks: &mut [Box<dyn ExportSink>],
        size: u32,
    ) -> WraplabResult<SaveOutcome> {
        let raster = self.export_raster(size)?;
        let bytes = encode_png(&raster)?;
        let name = suggested_name(self.model_key.as_deref(), size);
        export_with_fallback(sinks, &name, &bytes)
    }

    /// Select the layer under the pointer; clear the selection on a miss.
    pub fn pointer_select(&mut self, view: &FitTransform, x: f64, y: f64) -> Option<usize> {
        match hit_test(&self.stack, view, x, y) {
            Some(i) => {
                // select() cannot fail on an index hit_test just produced
                let _ = self.stack.select(i);
                Some(i)
            }
            None => {
                self.stack.deselect();
                None
            }
        }
    }

    /// Move the selected layer by a display-space delta, clamped to the template.
    pub fn drag_selected(&mut self, view: &FitTransform, dx: f64, dy: f64) {
        let Some(t) = self.template.as_ref() else { return };
        let (tw, th) = (f64::from(t.width()), f64::from(t.height()));
        let Some(layer) = self.stack.selected_layer_mut() else {
            return;
        };
        layer.placement.x = (layer.placement.x + dx / view.scale).clamp(0.0, tw);
        layer.placement.y = (layer.placement.y + dy / view.scale).clamp(0.0, th);
    }

    pub fn scale_selected(&mut self, factor: f64) {
        let Some(layer) = self.stack.selected_layer_mut() else {
            return;
        };
        let next = (layer.placement.scale * factor).max(MIN_LAYER_SCALE);
        layer.placement.set_scale(next);
    }

    pub fn rename_selected(&mut self, name: &str) {
        self.stack.rename_selected(name);
    }

    pub fn rotate_selected(&mut self, delta_deg: f64) {
        if let Some(layer) = self.stack.selected_layer_mut() {
            layer.placement.rotation_deg += delta_deg;
        }
    }

    pub fn fit_selected_to_template(&mut self) -> WraplabResult<()> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| WraplabError::validation("no template loaded"))?;
        self.stack.fit_selected_to_template(template);
        Ok(())
    }

    pub fn recolor_selected(&mut self, color: Rgb) -> WraplabResult<()> {
        self.fill_color = color;
        self.stack.recolor_selected(color)
    }
}
