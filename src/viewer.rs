//! Viewer state
//!
//! The data side of the interactive viewer: which GXL files exist, which
//! microscopy image belongs to each, what is selected, and the style
//! settings the drawer consumes. A GUI binds one way onto this state;
//! everything here is equally drivable from tests or the CLI. A selected
//! graph without a matching image is an outcome, not a crash.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::common::file_stem;
use crate::draw::GraphDrawer;
use crate::gxl::ParsedGxlGraph;
use crate::style::StyleConfig;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// One GXL file and, when found, the image sharing its stem.
#[derive(Clone, Debug)]
pub struct ViewerEntry {
    pub name: String,
    pub gxl_path: PathBuf,
    pub image_path: Option<PathBuf>,
}

/// What a render request produced.
pub enum RenderOutcome {
    Image(RgbaImage),
    /// No matching image and drawing on a blank canvas is disabled.
    /// Save stays unavailable until either changes.
    MissingImage(String),
}

pub struct ViewerState {
    gxl_dir: PathBuf,
    img_dir: Option<PathBuf>,
    entries: Vec<ViewerEntry>,
    filter: String,
    selected: Option<String>,
    style_override: Option<StyleConfig>,
    color_by_feature: Option<String>,
    draw_on_blank: bool,
    transparency: u8,
    scaling: f64,
}

impl ViewerState {
    pub fn new(gxl_dir: &Path) -> Result<Self> {
        let mut state = Self {
            gxl_dir: gxl_dir.to_path_buf(),
            img_dir: None,
            entries: Vec::new(),
            filter: String::new(),
            selected: None,
            style_override: None,
            color_by_feature: None,
            draw_on_blank: false,
            transparency: 125,
            scaling: 1.0,
        };
        state.rescan()?;
        Ok(state)
    }

    /// Re-list the GXL directory and re-pair images by file stem.
    pub fn rescan(&mut self) -> Result<()> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.gxl_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("gxl") {
                let name = file_stem(&path);
                let image_path = self.find_image(&name);
                entries.push(ViewerEntry {
                    name,
                    gxl_path: path,
                    image_path,
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Found {} graph file(s) in {}", entries.len(), self.gxl_dir.display());
        self.entries = entries;
        if let Some(selected) = &self.selected {
            if !self.entries.iter().any(|e| &e.name == selected) {
                self.selected = None;
            }
        }
        Ok(())
    }

    fn find_image(&self, stem: &str) -> Option<PathBuf> {
        let dir = self.img_dir.as_ref()?;
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", stem, ext)))
            .find(|p| p.is_file())
    }

    pub fn set_image_dir(&mut self, dir: &Path) -> Result<()> {
        self.img_dir = Some(dir.to_path_buf());
        self.rescan()
    }

    pub fn set_filter(&mut self, pattern: &str) {
        self.filter = pattern.to_string();
    }

    /// Entries whose name contains the current filter pattern.
    pub fn visible_entries(&self) -> Vec<&ViewerEntry> {
        self.entries
            .iter()
            .filter(|e| e.name.contains(&self.filter))
            .collect()
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        if self.entries.iter().any(|e| e.name == name) {
            self.selected = Some(name.to_string());
            Ok(())
        } else {
            Err(anyhow!("no graph named {:?}", name))
        }
    }

    pub fn selected_entry(&self) -> Option<&ViewerEntry> {
        let selected = self.selected.as_ref()?;
        self.entries.iter().find(|e| &e.name == selected)
    }

    pub fn set_color_by_feature(&mut self, feature: Option<&str>) {
        self.color_by_feature = feature.map(|f| f.to_string());
    }

    pub fn set_draw_on_blank(&mut self, enabled: bool) {
        self.draw_on_blank = enabled;
    }

    pub fn set_transparency(&mut self, transparency: u8) {
        self.transparency = transparency;
    }

    pub fn set_scaling(&mut self, scaling: f64) {
        self.scaling = scaling;
    }

    /// Style settings for hand editing; created on first use.
    pub fn style_mut(&mut self) -> &mut StyleConfig {
        self.style_override.get_or_insert_with(StyleConfig::default)
    }

    /// Parse the selection and gather everything the drawer needs.
    fn prepare(&self) -> Result<Prepared> {
        let entry = self
            .selected_entry()
            .ok_or_else(|| anyhow!("no graph selected"))?;

        let graph = ParsedGxlGraph::from_file(&entry.gxl_path, self.color_by_feature.as_deref())?;

        let base = match (&entry.image_path, self.draw_on_blank) {
            (Some(path), _) => Some(image::open(path)?),
            (None, true) => None,
            (None, false) => {
                return Ok(Prepared::MissingImage(format!(
                    "No image found for {}",
                    entry.name
                )))
            }
        };

        let style = match (&self.style_override, &self.color_by_feature) {
            (Some(style), _) => style.clone(),
            (None, Some(_)) => StyleConfig::from_feature_values(&graph.color_by_values),
            (None, None) => StyleConfig::default(),
        };

        Ok(Prepared::Ready { graph, base, style })
    }

    /// Render the selected graph.
    pub fn render(&self) -> Result<RenderOutcome> {
        match self.prepare()? {
            Prepared::Ready { graph, base, style } => {
                let drawer =
                    GraphDrawer::new(&graph, base, &style, self.scaling, self.transparency);
                Ok(RenderOutcome::Image(drawer.image()?))
            }
            Prepared::MissingImage(message) => Ok(RenderOutcome::MissingImage(message)),
        }
    }

    /// Render the selected graph and write `<id>-vis.png` into `output_dir`.
    /// Unavailable while the selection has no image source.
    pub fn save_selected(&self, output_dir: &Path) -> Result<PathBuf> {
        match self.prepare()? {
            Prepared::Ready { graph, base, style } => {
                let drawer =
                    GraphDrawer::new(&graph, base, &style, self.scaling, self.transparency);
                Ok(drawer.save(output_dir)?)
            }
            Prepared::MissingImage(message) => Err(anyhow!(message)),
        }
    }
}

enum Prepared {
    Ready {
        graph: ParsedGxlGraph,
        base: Option<image::DynamicImage>,
        style: StyleConfig,
    },
    MissingImage(String),
}
