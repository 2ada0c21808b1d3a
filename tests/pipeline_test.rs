//! End-to-end tests for the two data paths: GXL → overlay PNG, and
//! JSON exports → ASAP XML.

use slidegraph::common::write_string_to_file;
use slidegraph::convert::{run_conversion, run_metrics_export, OutputMode};
use slidegraph::draw::GraphDrawer;
use slidegraph::gxl::ParsedGxlGraph;
use slidegraph::offset::{Offset, OffsetSource};
use slidegraph::style::StyleConfig;
use tempfile::tempdir;

const GXL: &str = r#"<gxl><graph id="core_42" edgeids="False" edgemode="undirected">
    <node id="cell_5">
      <attr name="x"><float>12.0</float></attr>
      <attr name="y"><float>18.0</float></attr>
      <attr name="kind"><string>tumor</string></attr>
    </node>
    <node id="cell_6">
      <attr name="x"><float>40.0</float></attr>
      <attr name="y"><float>44.0</float></attr>
      <attr name="kind"><string>lymphocyte</string></attr>
    </node>
    <edge from="cell_5" to="cell_6"/>
</graph></gxl>"#;

fn tile_json(classification: &str) -> String {
    format!(
        r#"{{"Objects_Data": [{{
            "Object_Index": 1,
            "Classification": "{classification}",
            "ROI_Points": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            "Center_of_Mass": [5.0, 5.0],
            "Area": 50.0,
            "Circularity": 0.8,
            "Number_Cells": 12,
            "Perimeter": 34.0,
            "Solidity": 0.95
        }}]}}"#
    )
}

#[test]
fn gxl_file_renders_to_a_named_png() {
    let dir = tempdir().unwrap();
    let gxl_path = dir.path().join("core_42.gxl");
    write_string_to_file(&gxl_path, GXL).unwrap();

    let graph = ParsedGxlGraph::from_file(&gxl_path, Some("kind")).unwrap();
    assert_eq!(graph.file_id, "core_42");
    assert_eq!(graph.edges, vec![(0, 1)]);

    let style = StyleConfig::from_feature_values(&graph.color_by_values);
    let drawer = GraphDrawer::new(&graph, None, &style, 2.0, 125);
    let out = tempdir().unwrap();
    let path = drawer.save(out.path()).unwrap();

    assert_eq!(path.file_name().unwrap(), "core_42-vis.png");
    let reloaded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(reloaded.dimensions(), (1024, 1024));
    // Node at (12, 18) lands at (24, 36) under scaling 2.0.
    let tumor = style.node_style("tumor").unwrap().color.channels();
    assert_eq!(reloaded.get_pixel(24, 36).0, tumor);
}

#[test]
fn csv_conversion_writes_per_file_and_aggregate_documents() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let aux = tempdir().unwrap();

    write_string_to_file(
        &input.path().join("Masks_s1_CoreID_1.json"),
        &tile_json("Tumor"),
    )
    .unwrap();
    write_string_to_file(
        &input.path().join("Masks_s1_CoreID_2.json"),
        &tile_json("Intraepithelial CD8+ Cell"),
    )
    .unwrap();
    let csv_path = aux.path().join("centroids.csv");
    write_string_to_file(&csv_path, "1;100;200;10\n2;300;400;20\n").unwrap();

    let source = OffsetSource::CentroidCsv {
        path: csv_path,
        bounds_x: 0.0,
        bounds_y: 0.0,
    };
    let summary = run_conversion(input.path(), output.path(), &source, OutputMode::Both).unwrap();
    assert_eq!(summary.written.len(), 3);
    assert!(summary.skipped.is_empty());

    let aggregate =
        std::fs::read_to_string(output.path().join("centroids_asap.xml")).unwrap();
    assert_structure(&aggregate);
    assert!(aggregate.contains("Tumor, Core_ID_1"));
    assert!(aggregate.contains("Intraepithelial CD8+ Cell, Core_ID_2"));

    // Names stay unique across the aggregated tiles.
    let doc = roxmltree::Document::parse(&aggregate).unwrap();
    let names: Vec<&str> = doc
        .descendants()
        .filter(|n| n.has_tag_name("Annotation"))
        .filter_map(|n| n.attribute("Name"))
        .collect();
    let mut deduped = names.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(names.len(), deduped.len());

    let per_file =
        std::fs::read_to_string(output.path().join("Masks_s1_CoreID_1_asap.xml")).unwrap();
    assert_structure(&per_file);
    // Offset (100, 200), radius 10: (0,0) becomes (90, 190).
    assert!(per_file.contains(r#"<Coordinate Order="0" X="90" Y="190"/>"#));
}

#[test]
fn batch_continues_past_broken_files() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();

    write_string_to_file(&input.path().join("Masks_a.json"), &tile_json("Tumor")).unwrap();
    write_string_to_file(&input.path().join("Masks_b.json"), "{}").unwrap();

    let source = OffsetSource::Constant(Offset::new(10.0, -5.0, 0.0));
    let summary =
        run_conversion(input.path(), output.path(), &source, OutputMode::PerFile).unwrap();
    assert_eq!(summary.written.len(), 1);
    assert_eq!(summary.skipped.len(), 1);

    let xml = std::fs::read_to_string(output.path().join("Masks_a_asap.xml")).unwrap();
    assert!(xml.contains(r#"<Coordinate Order="0" X="10" Y="-5"/>"#));
    assert!(xml.contains(r#"<Coordinate Order="1" X="20" Y="-5"/>"#));
    assert!(xml.contains(r#"<Coordinate Order="2" X="20" Y="5"/>"#));
}

#[test]
fn metrics_tables_match_the_export_fields() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_string_to_file(
        &input.path().join("Masks_s1-level0-hotspot.json"),
        &tile_json("Tumor"),
    )
    .unwrap();

    let summary = run_metrics_export(input.path(), output.path()).unwrap();
    assert_eq!(summary.written.len(), 1);

    let csv = std::fs::read_to_string(output.path().join("Masks_s1-level0-hotspot.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Object_Index;Classification;Area;Circularity;Number_Cells;Perimeter;Solidity"
    );
    assert_eq!(lines.next().unwrap(), "1;Tumor;50;0.8;12;34;0.95");
}

fn assert_structure(xml: &str) {
    let doc = roxmltree::Document::parse(xml).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "ASAP_Annotations");
    let children: Vec<&str> = root
        .children()
        .filter(|n| n.is_element())
        .map(|n| n.tag_name().name())
        .collect();
    assert_eq!(children, vec!["Annotations", "AnnotationGroups"]);
    assert!(doc
        .descendants()
        .filter(|n| n.has_tag_name("Group"))
        .all(|g| {
            g.attribute("PartOfGroup") == Some("None")
                && g.children().filter(|c| c.is_element()).count() == 1
        }));
}
