//! Graph overlay rasterization
//!
//! Draws a parsed graph onto a base microscopy image (or a blank canvas)
//! and writes the result as `<id>-vis.png`. Edges are drawn first so nodes
//! sit above the edge lines.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::DrawError;
use crate::gxl::ParsedGxlGraph;
use crate::style::{FillMode, NodeStyle, StyleConfig};

/// Side length of the synthesized canvas when no base image is given.
const BLANK_CANVAS_SIZE: u32 = 1024;

pub struct GraphDrawer<'a> {
    graph: &'a ParsedGxlGraph,
    base: RgbaImage,
    config: &'a StyleConfig,
    scaling: f64,
}

impl<'a> GraphDrawer<'a> {
    /// Prepare a drawer over `base`, or over a blank white canvas when no
    /// image is supplied. The base gains an alpha channel set uniformly to
    /// `transparency`; without a base there is nothing to blend against, so
    /// the canvas is forced fully opaque.
    pub fn new(
        graph: &'a ParsedGxlGraph,
        base: Option<DynamicImage>,
        config: &'a StyleConfig,
        scaling: f64,
        transparency: u8,
    ) -> Self {
        let base = match base {
            Some(img) => {
                let mut rgba = img.to_rgba8();
                for pixel in rgba.pixels_mut() {
                    pixel.0[3] = transparency;
                }
                rgba
            }
            None => RgbaImage::from_pixel(
                BLANK_CANVAS_SIZE,
                BLANK_CANVAS_SIZE,
                Rgba([255, 255, 255, 255]),
            ),
        };
        Self {
            graph,
            base,
            config,
            scaling,
        }
    }

    /// Node coordinates scaled and truncated to pixel positions.
    pub fn scaled_points(&self) -> Vec<(i32, i32)> {
        self.graph
            .node_positions
            .iter()
            .map(|&(x, y)| ((x * self.scaling) as i32, (y * self.scaling) as i32))
            .collect()
    }

    /// Rasterize the overlay and return the image.
    pub fn image(&self) -> Result<RgbaImage, DrawError> {
        let mut img = self.base.clone();
        let points = self.scaled_points();

        let edge_style = self.config.edge_style();
        let edge_color = Rgba(edge_style.color.channels());
        for &(source, target) in &self.graph.edges {
            draw_thick_line(
                &mut img,
                points[source],
                points[target],
                edge_style.thickness,
                edge_color,
            );
        }

        if self.graph.color_by_feature.is_some() {
            for (value, &point) in self.graph.color_by_values.iter().zip(points.iter()) {
                let key = value.to_string();
                let style = self.resolve_style(&key)?;
                self.draw_node(&mut img, point, style);
            }
        } else {
            let style = *self.resolve_style(self.config.selected_node_type())?;
            for &point in &points {
                self.draw_node(&mut img, point, &style);
            }
        }

        Ok(img)
    }

    /// Render and write `<id>-vis.png` into `output_dir`, returning the
    /// path written.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf, DrawError> {
        let output_file = output_dir.join(format!("{}-vis.png", self.graph.file_id));
        let img = self.image()?;
        img.save(&output_file)?;
        info!("Visualization saved to {}", output_file.display());
        Ok(output_file)
    }

    fn resolve_style(&self, key: &str) -> Result<&NodeStyle, DrawError> {
        self.config
            .node_style(key)
            .ok_or_else(|| DrawError::UnknownStyleKey(key.to_string()))
    }

    fn draw_node(&self, img: &mut RgbaImage, center: (i32, i32), style: &NodeStyle) {
        let color = Rgba(style.color.channels());
        match self.config.fill_mode() {
            FillMode::Filled => draw_filled_circle_mut(img, center, style.radius, color),
            FillMode::Outline => draw_hollow_circle_mut(img, center, style.radius, color),
        }
    }
}

/// Line segment with width. imageproc lines are a single pixel wide, so a
/// thicker stroke is stamped as filled circles along the segment.
fn draw_thick_line(
    img: &mut RgbaImage,
    from: (i32, i32),
    to: (i32, i32),
    thickness: u32,
    color: Rgba<u8>,
) {
    if thickness <= 1 {
        draw_line_segment_mut(
            img,
            (from.0 as f32, from.1 as f32),
            (to.0 as f32, to.1 as f32),
            color,
        );
        return;
    }

    let radius = (thickness / 2) as i32;
    let dx = (to.0 - from.0) as f64;
    let dy = (to.1 - from.1) as f64;
    let length = (dx * dx + dy * dy).sqrt();
    let steps = length.ceil() as i32;
    for step in 0..=steps {
        let t = if steps == 0 {
            0.0
        } else {
            step as f64 / steps as f64
        };
        let x = from.0 + (dx * t).round() as i32;
        let y = from.1 + (dy * t).round() as i32;
        draw_filled_circle_mut(img, (x, y), radius, color);
    }
}
