//! GXL graph parsing
//!
//! A GXL document encodes a single labeled graph: a `<graph>` root carrying
//! `id`, `edgeids` and `edgemode` attributes, `<node>` and `<edge>` children,
//! and per-element `<attr name="..">` wrappers around `<string>`, `<float>`
//! or `<int>` typed leaves. Parsing is a one-shot operation; the resulting
//! [`ParsedGxlGraph`] is immutable.

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

use crate::common::file_stem;
use crate::error::GxlError;

/// A decoded feature value, typed by the tag it carried in the document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl FeatureValue {
    /// Numeric view of the value; string features have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Str(_) => None,
            FeatureValue::Int(i) => Some(*i as f64),
            FeatureValue::Float(f) => Some(*f),
        }
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Str(s) => write!(f, "{}", s),
            FeatureValue::Int(i) => write!(f, "{}", i),
            FeatureValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Everything encoded in one GXL file.
#[derive(Clone, Debug, Serialize)]
pub struct ParsedGxlGraph {
    /// File name without the .gxl extension; used for output naming.
    pub file_id: String,
    /// The graph's declared identifier.
    pub graph_id: String,
    /// Whether edges carry explicit ids (`edgeids="True"`).
    pub edge_ids_present: bool,
    /// Declared edge mode, "directed" or "undirected".
    pub edgemode: String,
    /// Node feature names, in declaration order.
    pub node_feature_names: Vec<String>,
    /// One value tuple per node, aligned to `node_feature_names`.
    pub node_features: Vec<Vec<FeatureValue>>,
    /// (x, y) per node, extracted from the feature tuples.
    pub node_positions: Vec<(f64, f64)>,
    /// Zero-based (source, target) node indices.
    pub edges: Vec<(usize, usize)>,
    /// Edge feature names, in declaration order.
    pub edge_feature_names: Vec<String>,
    /// One value tuple per edge, aligned to `edge_feature_names`.
    pub edge_features: Vec<Vec<FeatureValue>>,
    /// Feature the nodes are colored by, when requested.
    pub color_by_feature: Option<String>,
    /// Per-node values of `color_by_feature`, aligned to `node_positions`.
    pub color_by_values: Vec<FeatureValue>,
}

impl ParsedGxlGraph {
    /// Parse the GXL file at `path`, optionally projecting out a feature to
    /// color nodes by.
    pub fn from_file(path: &Path, color_by_feature: Option<&str>) -> Result<Self, GxlError> {
        let text = std::fs::read_to_string(path)?;
        let mut graph = Self::from_str(&text, color_by_feature)?;
        graph.file_id = file_stem(path);
        Ok(graph)
    }

    /// Parse a GXL document held in memory. `file_id` defaults to the graph
    /// id until [`from_file`](Self::from_file) overrides it.
    pub fn from_str(text: &str, color_by_feature: Option<&str>) -> Result<Self, GxlError> {
        let doc = roxmltree::Document::parse(text)?;

        let graph_elements: Vec<roxmltree::Node> = doc
            .descendants()
            .filter(|n| n.has_tag_name("graph"))
            .collect();
        if graph_elements.len() != 1 {
            return Err(GxlError::InvalidFormat(format!(
                "expected exactly one graph element, found {}",
                graph_elements.len()
            )));
        }
        let graph_el = graph_elements[0];

        let (graph_id, edge_ids_present, edgemode) = graph_attributes(&graph_el)?;

        let nodes: Vec<roxmltree::Node> = graph_el
            .descendants()
            .filter(|n| n.has_tag_name("node"))
            .collect();
        if nodes.is_empty() {
            return Err(GxlError::InvalidFormat("graph has no nodes".to_string()));
        }

        let edge_elements: Vec<roxmltree::Node> = graph_el
            .descendants()
            .filter(|n| n.has_tag_name("edge"))
            .collect();
        if edge_elements.is_empty() {
            warn!("graph {} has no edges", graph_id);
        }

        // Smallest node id, used to shift edge endpoints to a zero base in
        // case the file's enumeration does not start at 0.
        let node_ids = nodes
            .iter()
            .map(|n| element_id_suffix(n, "id"))
            .collect::<Result<Vec<i64>, GxlError>>()?;
        let min_node_id = *node_ids.iter().min().expect("nodes is non-empty");

        let (node_feature_names, node_features) = element_features(&nodes)?;
        let (edge_feature_names, edge_features) = element_features(&edge_elements)?;

        let x_ind = feature_index(&node_feature_names, "x");
        let y_ind = feature_index(&node_feature_names, "y");
        let (x_ind, y_ind) = match (x_ind, y_ind) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(GxlError::MissingCoordinateFeature),
        };

        let node_positions = node_features
            .iter()
            .map(|features| {
                let coord = |ind: usize, name: &str| {
                    let value = tuple_value(features, ind, name)?;
                    value.as_f64().ok_or_else(|| GxlError::InvalidFeatureValue {
                        name: name.to_string(),
                        tag: "float".to_string(),
                        value: value.to_string(),
                    })
                };
                Ok((coord(x_ind, "x")?, coord(y_ind, "y")?))
            })
            .collect::<Result<Vec<(f64, f64)>, GxlError>>()?;

        let edges = parse_edges(&edge_elements, min_node_id, nodes.len())?;

        let color_by_values = match color_by_feature {
            Some(feature) => {
                let ind = feature_index(&node_feature_names, feature)
                    .ok_or_else(|| GxlError::UnknownFeature(feature.to_string()))?;
                node_features
                    .iter()
                    .map(|f| tuple_value(f, ind, feature).cloned())
                    .collect::<Result<Vec<FeatureValue>, GxlError>>()?
            }
            None => Vec::new(),
        };

        Ok(ParsedGxlGraph {
            file_id: graph_id.clone(),
            graph_id,
            edge_ids_present,
            edgemode,
            node_feature_names,
            node_features,
            node_positions,
            edges,
            edge_feature_names,
            edge_features,
            color_by_feature: color_by_feature.map(|s| s.to_string()),
            color_by_values,
        })
    }

    pub fn nb_of_nodes(&self) -> usize {
        self.node_features.len()
    }

    pub fn nb_of_edges(&self) -> usize {
        self.edges.len()
    }

    /// All node values for one feature name.
    pub fn node_feature_values(&self, feature: &str) -> Result<Vec<FeatureValue>, GxlError> {
        let ind = feature_index(&self.node_feature_names, feature)
            .ok_or_else(|| GxlError::UnknownFeature(feature.to_string()))?;
        self.node_features
            .iter()
            .map(|f| tuple_value(f, ind, feature).cloned())
            .collect()
    }

    pub fn stats(&self) -> String {
        format!(
            "Nodes: {}, Edges: {}, Mode: {}",
            self.nb_of_nodes(),
            self.nb_of_edges(),
            self.edgemode
        )
    }
}

fn id_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_(\d+)$").unwrap())
}

/// Extract the trailing integer of a `<prefix>_<integer>` identifier held in
/// the named attribute.
fn element_id_suffix(element: &roxmltree::Node, attribute: &str) -> Result<i64, GxlError> {
    let raw = element
        .attribute(attribute)
        .ok_or_else(|| GxlError::InvalidFormat(format!("element missing {:?} attribute", attribute)))?;
    let captures = id_suffix_regex()
        .captures(raw)
        .ok_or_else(|| GxlError::MalformedIdentifier(raw.to_string()))?;
    captures[1]
        .parse::<i64>()
        .map_err(|_| GxlError::MalformedIdentifier(raw.to_string()))
}

/// Graph-level attributes: id, edgeids flag, edgemode. The element must
/// carry exactly these three.
fn graph_attributes(graph: &roxmltree::Node) -> Result<(String, bool, String), GxlError> {
    let attribute_count = graph.attributes().count();
    if attribute_count != 3 {
        return Err(GxlError::InvalidFormat(format!(
            "graph element carries {} attributes, expected id, edgeids and edgemode",
            attribute_count
        )));
    }
    let get = |name: &str| {
        graph
            .attribute(name)
            .map(|v| v.to_string())
            .ok_or_else(|| GxlError::InvalidFormat(format!("graph element missing {:?} attribute", name)))
    };
    let id = get("id")?;
    let edge_ids_present = get("edgeids")? == "True";
    let edgemode = get("edgemode")?;
    Ok((id, edge_ids_present, edgemode))
}

/// Decode one typed feature leaf. The wrapper `<attr>` element carries the
/// feature name; its single child element carries the type tag and payload.
fn decode_feature(attr: &roxmltree::Node) -> Result<FeatureValue, GxlError> {
    let name = attr.attribute("name").unwrap_or_default();
    let value_el = attr
        .children()
        .find(|c| c.is_element())
        .ok_or_else(|| GxlError::InvalidFormat(format!("attr {:?} has no value element", name)))?;
    let tag = value_el.tag_name().name();
    let text = value_el.text().unwrap_or_default().trim();

    match tag {
        "string" => Ok(FeatureValue::Str(text.to_string())),
        "float" => text
            .parse::<f64>()
            .map(FeatureValue::Float)
            .map_err(|_| invalid_value(name, tag, text)),
        "int" => text
            .parse::<i64>()
            .map(FeatureValue::Int)
            .map_err(|_| invalid_value(name, tag, text)),
        other => Err(GxlError::UnknownFeatureType(other.to_string())),
    }
}

fn invalid_value(name: &str, tag: &str, value: &str) -> GxlError {
    GxlError::InvalidFeatureValue {
        name: name.to_string(),
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

/// Feature names (taken from the first element) and decoded value tuples for
/// a slice of node or edge elements.
#[allow(clippy::type_complexity)]
fn element_features(
    elements: &[roxmltree::Node],
) -> Result<(Vec<String>, Vec<Vec<FeatureValue>>), GxlError> {
    let Some(first) = elements.first() else {
        return Ok((Vec::new(), Vec::new()));
    };

    let feature_names: Vec<String> = first
        .children()
        .filter(|c| c.has_tag_name("attr"))
        .filter_map(|attr| attr.attribute("name").map(|n| n.to_string()))
        .collect();

    let features = elements
        .iter()
        .map(|el| {
            el.children()
                .filter(|c| c.has_tag_name("attr"))
                .filter(|attr| {
                    attr.attribute("name")
                        .map(|n| feature_names.iter().any(|f| f == n))
                        .unwrap_or(false)
                })
                .map(|attr| decode_feature(&attr))
                .collect::<Result<Vec<FeatureValue>, GxlError>>()
        })
        .collect::<Result<Vec<Vec<FeatureValue>>, GxlError>>()?;

    Ok((feature_names, features))
}

fn feature_index(names: &[String], feature: &str) -> Option<usize> {
    names.iter().position(|n| n == feature)
}

/// A value from a feature tuple; a short tuple means the element declared
/// fewer attrs than the first one did.
fn tuple_value<'a>(
    features: &'a [FeatureValue],
    ind: usize,
    name: &str,
) -> Result<&'a FeatureValue, GxlError> {
    features.get(ind).ok_or_else(|| {
        GxlError::InvalidFormat(format!("element is missing the {:?} feature", name))
    })
}

/// Edge endpoints shifted by `-min_node_id` so node indexing starts at 0,
/// then checked against the node count.
fn parse_edges(
    edge_elements: &[roxmltree::Node],
    min_node_id: i64,
    node_count: usize,
) -> Result<Vec<(usize, usize)>, GxlError> {
    edge_elements
        .iter()
        .map(|edge| {
            let from = element_id_suffix(edge, "from")? - min_node_id;
            let to = element_id_suffix(edge, "to")? - min_node_id;
            for endpoint in [from, to] {
                if endpoint < 0 || endpoint as usize >= node_count {
                    return Err(GxlError::EdgeOutOfRange {
                        index: endpoint,
                        node_count,
                    });
                }
            }
            Ok((from as usize, to as usize))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_gxl(first_id: u32) -> String {
        let node = |i: u32, x: f64, y: f64, kind: &str| {
            format!(
                r#"<node id="_{i}">
                     <attr name="x"><float>{x}</float></attr>
                     <attr name="y"><float>{y}</float></attr>
                     <attr name="kind"><string>{kind}</string></attr>
                   </node>"#
            )
        };
        format!(
            r#"<gxl><graph id="cell_graph" edgeids="False" edgemode="undirected">
                 {}{}{}
                 <edge from="_{}" to="_{}"/>
                 <edge from="_{}" to="_{}"/>
               </graph></gxl>"#,
            node(first_id, 10.5, 20.0, "tumor"),
            node(first_id + 1, 30.0, 40.5, "lymphocyte"),
            node(first_id + 2, 50.0, 60.0, "tumor"),
            first_id,
            first_id + 1,
            first_id + 1,
            first_id + 2,
        )
    }

    #[test]
    fn parses_nodes_edges_and_positions() {
        let graph = ParsedGxlGraph::from_str(&sample_gxl(0), None).unwrap();
        assert_eq!(graph.graph_id, "cell_graph");
        assert!(!graph.edge_ids_present);
        assert_eq!(graph.edgemode, "undirected");
        assert_eq!(graph.nb_of_nodes(), 3);
        assert_eq!(graph.edges, vec![(0, 1), (1, 2)]);
        assert_eq!(graph.node_positions[0], (10.5, 20.0));
        assert_eq!(
            graph.node_feature_names,
            vec!["x".to_string(), "y".to_string(), "kind".to_string()]
        );
    }

    #[test]
    fn edge_indices_are_shifted_to_zero_base() {
        let from_zero = ParsedGxlGraph::from_str(&sample_gxl(0), None).unwrap();
        let from_five = ParsedGxlGraph::from_str(&sample_gxl(5), None).unwrap();
        assert_eq!(from_zero.edges, from_five.edges);
        for &(s, t) in &from_five.edges {
            assert!(s < from_five.nb_of_nodes());
            assert!(t < from_five.nb_of_nodes());
        }
    }

    #[test]
    fn color_by_feature_projects_values() {
        let graph = ParsedGxlGraph::from_str(&sample_gxl(0), Some("kind")).unwrap();
        assert_eq!(
            graph.color_by_values,
            vec![
                FeatureValue::Str("tumor".to_string()),
                FeatureValue::Str("lymphocyte".to_string()),
                FeatureValue::Str("tumor".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_color_feature_is_an_error() {
        let err = ParsedGxlGraph::from_str(&sample_gxl(0), Some("absent")).unwrap_err();
        assert!(matches!(err, GxlError::UnknownFeature(f) if f == "absent"));
    }

    #[test]
    fn missing_coordinates_are_a_hard_error() {
        let text = r#"<gxl><graph id="g" edgeids="False" edgemode="undirected">
            <node id="_0"><attr name="area"><float>1.0</float></attr></node>
        </graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::MissingCoordinateFeature));
    }

    #[test]
    fn empty_graph_is_invalid() {
        let text = r#"<gxl><graph id="g" edgeids="False" edgemode="undirected"></graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::InvalidFormat(_)));
    }

    #[test]
    fn wrong_graph_attribute_count_is_invalid() {
        let text = r#"<gxl><graph id="g" edgemode="undirected">
            <node id="_0">
              <attr name="x"><float>1</float></attr>
              <attr name="y"><float>2</float></attr>
            </node>
        </graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::InvalidFormat(_)));
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        let text = r#"<gxl><graph id="g" edgeids="False" edgemode="undirected">
            <node id="node-zero">
              <attr name="x"><float>1</float></attr>
              <attr name="y"><float>2</float></attr>
            </node>
        </graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::MalformedIdentifier(_)));
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let text = r#"<gxl><graph id="g" edgeids="False" edgemode="undirected">
            <node id="_0">
              <attr name="x"><float>not a number</float></attr>
              <attr name="y"><float>2</float></attr>
            </node>
        </graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::InvalidFeatureValue { .. }));
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let text = r#"<gxl><graph id="g" edgeids="False" edgemode="undirected">
            <node id="_0">
              <attr name="x"><double>1.0</double></attr>
              <attr name="y"><float>2</float></attr>
            </node>
        </graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::UnknownFeatureType(t) if t == "double"));
    }

    #[test]
    fn edge_to_missing_node_is_out_of_range() {
        let text = r#"<gxl><graph id="g" edgeids="False" edgemode="undirected">
            <node id="_0">
              <attr name="x"><float>1</float></attr>
              <attr name="y"><float>2</float></attr>
            </node>
            <edge from="_0" to="_7"/>
        </graph></gxl>"#;
        let err = ParsedGxlGraph::from_str(text, None).unwrap_err();
        assert!(matches!(err, GxlError::EdgeOutOfRange { index: 7, .. }));
    }

    #[test]
    fn integer_features_keep_their_type() {
        let text = r#"<gxl><graph id="g" edgeids="True" edgemode="directed">
            <node id="_0">
              <attr name="x"><int>3</int></attr>
              <attr name="y"><int>4</int></attr>
            </node>
        </graph></gxl>"#;
        let graph = ParsedGxlGraph::from_str(text, None).unwrap();
        assert!(graph.edge_ids_present);
        assert_eq!(graph.node_features[0][0], FeatureValue::Int(3));
        assert_eq!(graph.node_positions[0], (3.0, 4.0));
    }
}
