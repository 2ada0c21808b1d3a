//! Style configuration for the graph drawer
//!
//! An explicit configuration object stands in for the original tool's live
//! color-picker state: the drawer consumes a read-only reference on every
//! redraw, and all mutation goes through setters. The whole structure
//! serializes, so a YAML file can carry a reusable style.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::gxl::FeatureValue;

/// An RGBA color, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn channels(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Whether node circles are filled or drawn as outlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FillMode {
    #[default]
    Filled,
    Outline,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub color: Rgba,
    pub radius: i32,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            color: Rgba::new(224, 130, 47, 255),
            radius: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub color: Rgba,
    pub thickness: u32,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            color: Rgba::new(30, 110, 30, 255),
            thickness: 10,
        }
    }
}

/// Node and edge styling consumed by the drawer.
///
/// Node styles are keyed by node type, or by feature value when the drawer
/// runs in color-by-feature mode. Insertion order is preserved so control
/// surfaces can list the buckets the way they were configured.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StyleConfig {
    node_styles: IndexMap<String, NodeStyle>,
    fill_mode: FillMode,
    edge_style: EdgeStyle,
    selected_node_type: String,
}

pub const DEFAULT_NODE_TYPE: &str = "default";

impl Default for StyleConfig {
    fn default() -> Self {
        let mut node_styles = IndexMap::new();
        node_styles.insert(DEFAULT_NODE_TYPE.to_string(), NodeStyle::default());
        Self {
            node_styles,
            fill_mode: FillMode::Filled,
            edge_style: EdgeStyle::default(),
            selected_node_type: DEFAULT_NODE_TYPE.to_string(),
        }
    }
}

impl StyleConfig {
    /// Style config with one auto-colored bucket per distinct feature value,
    /// assigned over the sorted values from a spectral color ramp.
    pub fn from_feature_values(values: &[FeatureValue]) -> Self {
        let buckets = distinct_sorted_keys(values);
        let mut node_styles = IndexMap::new();
        let count = buckets.len();
        for (i, key) in buckets.into_iter().enumerate() {
            let color = spectral_color(i, count);
            node_styles.insert(key, NodeStyle { color, radius: 20 });
        }
        let selected = node_styles
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| DEFAULT_NODE_TYPE.to_string());
        Self {
            node_styles,
            fill_mode: FillMode::Filled,
            edge_style: EdgeStyle::default(),
            selected_node_type: selected,
        }
    }

    pub fn node_style(&self, key: &str) -> Option<&NodeStyle> {
        self.node_styles.get(key)
    }

    pub fn node_type_keys(&self) -> impl Iterator<Item = &str> {
        self.node_styles.keys().map(|k| k.as_str())
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    pub fn edge_style(&self) -> EdgeStyle {
        self.edge_style
    }

    pub fn selected_node_type(&self) -> &str {
        &self.selected_node_type
    }

    pub fn set_node_color(&mut self, key: &str, color: Rgba) {
        self.node_styles.entry(key.to_string()).or_default().color = color;
    }

    pub fn set_node_radius(&mut self, key: &str, radius: i32) {
        self.node_styles.entry(key.to_string()).or_default().radius = radius;
    }

    pub fn set_fill_mode(&mut self, fill_mode: FillMode) {
        self.fill_mode = fill_mode;
    }

    pub fn set_edge_color(&mut self, color: Rgba) {
        self.edge_style.color = color;
    }

    pub fn set_edge_thickness(&mut self, thickness: u32) {
        self.edge_style.thickness = thickness;
    }

    /// Select the node type used for every node outside color-by-feature
    /// mode. The key must already have a style bucket.
    pub fn select_node_type(&mut self, key: &str) -> bool {
        if self.node_styles.contains_key(key) {
            self.selected_node_type = key.to_string();
            true
        } else {
            false
        }
    }
}

/// Distinct feature values as style keys, sorted numerically where the
/// values are numeric and lexically otherwise.
fn distinct_sorted_keys(values: &[FeatureValue]) -> Vec<String> {
    let mut keys: Vec<(Option<f64>, String)> = values
        .iter()
        .map(|v| (v.as_f64(), v.to_string()))
        .collect();
    keys.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.1.cmp(&b.1),
    });
    keys.dedup_by(|a, b| a.1 == b.1);
    keys.into_iter().map(|(_, k)| k).collect()
}

// Anchor colors of the spectral ramp, low to high.
const SPECTRAL: [(u8, u8, u8); 11] = [
    (158, 1, 66),
    (213, 62, 79),
    (244, 109, 67),
    (253, 174, 97),
    (254, 224, 139),
    (255, 255, 191),
    (230, 245, 152),
    (171, 221, 164),
    (102, 194, 165),
    (50, 136, 189),
    (94, 79, 162),
];

/// Color for bucket `index` out of `count`, linearly interpolated between
/// the ramp anchors.
fn spectral_color(index: usize, count: usize) -> Rgba {
    let t = if count <= 1 {
        0.0
    } else {
        index as f64 / (count - 1) as f64
    };
    let scaled = t * (SPECTRAL.len() - 1) as f64;
    let low = scaled.floor() as usize;
    let high = scaled.ceil() as usize;
    let frac = scaled - low as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    let (r1, g1, b1) = SPECTRAL[low];
    let (r2, g2, b2) = SPECTRAL[high];
    Rgba::new(lerp(r1, r2), lerp(g1, g2), lerp(b1, b2), 255)
}
