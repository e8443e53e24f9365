use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::core::{Placement, Raster, Rgb};
use crate::error::{WraplabError, WraplabResult};
use crate::layer::LayerStack;
use crate::segment::{segment_regions, DEFAULT_THRESHOLD};
use crate::template::{Pixels, Template};

/// A wrap project document: the template plus layer specs, bottom to top.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Project {
    /// Template image path, relative to the project file.
    pub template: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Image {
        source: PathBuf,
        /// Omitted: fit to the template and center, like a fresh upload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placement: Option<Placement>,
        #[serde(default = "default_opacity")]
        opacity: f32,
        #[serde(default = "default_visible")]
        visible: bool,
    },
    Fill { color: Rgb },
    /// Segment the template alpha and add one recolorable fill per region.
    FillRegions {
        color: Rgb,
        #[serde(default = "default_threshold")]
        threshold: u8,
    },
}

fn default_opacity() -> f32 {
    1.0
}

fn default_visible() -> bool {
    true
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

impl Project {
    pub fn load(path: &Path) -> WraplabResult<Self> {
        let f = File::open(path)
            .with_context(|| format!("open project '{}'", path.display()))?;
        let project: Project = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse project JSON '{}'", path.display()))?;
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> WraplabResult<()> {
        if self.template.as_os_str().is_empty() {
            return Err(WraplabError::validation("project template path is empty"));
        }
        for (i, spec) in self.layers.iter().enumerate() {
            match spec {
                LayerSpec::Image {
                    source,
                    placement,
                    opacity,
                    ..
                } => {
                    if source.as_os_str().is_empty() {
                        return Err(WraplabError::validation(format!(
                            "layer {i}: image source path is empty"
                        )));
                    }
                    if !(0.0..=1.0).contains(opacity) {
                        return Err(WraplabError::validation(format!(
                            "layer {i}: opacity {opacity} outside [0, 1]"
                        )));
                    }
                    if let Some(p) = placement {
                        p.validate().map_err(|e| {
                            WraplabError::validation(format!("layer {i}: {e}"))
                        })?;
                    }
                }
                LayerSpec::Fill { .. } => {}
                LayerSpec::FillRegions { .. } => {}
            }
        }
        Ok(())
    }

    /// Load the template and materialize every layer spec into a stack;
    /// paths resolve relative to `root`.
    pub fn materialize(&self, root: &Path) -> WraplabResult<(Template, LayerStack)> {
        self.validate()?;
        let template = Template::load(&root.join(&self.template))?;
        let mut stack = LayerStack::new();

        for spec in &self.layers {
            match spec {
                LayerSpec::Image {
                    source,
                    placement,
                    opacity,
                    visible,
                } => {
                    let raster = load_image_raster(&root.join(source))?;
                    stack.add_image(Pixels::Ready(raster), &template);
                    if placement.is_none() {
                        stack.fit_selected_to_template(&template);
                    }
                    if let Some(layer) = stack.selected_layer_mut() {
                        if let Some(p) = placement {
                            layer.placement = *p;
                            layer.placement.set_scale(p.scale);
                        }
                        layer.opacity = *opacity;
                        layer.visible = *visible;
                    }
                }
                LayerSpec::Fill { color } => {
                    let mask = template.alpha_mask()?;
                    stack.add_template_fill(&mask, *color)?;
                }
                LayerSpec::FillRegions { color, threshold } => {
                    let mask = template.alpha_mask()?;
                    let regions = segment_regions(&mask, *threshold, *color)?;
                    stack.add_regions(regions, *color)?;
                }
            }
        }
        stack.deselect();
        Ok((template, stack))
    }
}

fn load_image_raster(path: &Path) -> WraplabResult<Raster> {
    let img = image::open(path)
        .map_err(|e| {
            WraplabError::validation(format!(
                "failed to decode layer image '{}': {e}",
                path.display()
            ))
        })?
        .to_rgba8();
    let (w, h) = (img.width(), img.height());
    Raster::from_rgba8(w, h, img.into_raw())
}
