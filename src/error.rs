//! Error types for parsing, drawing and conversion
//!
//! One enum per concern. Parse errors on a single input file are fatal for
//! that file only; the batch pipeline catches them, records the file name
//! and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing a GXL document
#[derive(Error, Debug)]
pub enum GxlError {
    /// Structurally broken document: wrong graph element count, wrong
    /// attribute set, or an empty node list
    #[error("invalid GXL structure: {0}")]
    InvalidFormat(String),

    /// A node or edge identifier does not end in `_<integer>`
    #[error("malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    /// A feature value carries a type tag other than string/float/int
    #[error("unknown feature type tag: {0:?}")]
    UnknownFeatureType(String),

    /// A feature payload does not parse under its declared type tag
    #[error("feature {name:?} value {value:?} is not a valid {tag}")]
    InvalidFeatureValue {
        name: String,
        tag: String,
        value: String,
    },

    /// Node features do not include both `x` and `y`
    #[error("graph does not contain x and y coordinates as node features")]
    MissingCoordinateFeature,

    /// A feature name requested for projection does not exist
    #[error("feature {0:?} not found among node features")]
    UnknownFeature(String),

    /// An edge endpoint falls outside the re-indexed node range
    #[error("edge endpoint {index} outside node range 0..{node_count}")]
    EdgeOutOfRange { index: i64, node_count: usize },

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while rasterizing a graph overlay
#[derive(Error, Debug)]
pub enum DrawError {
    /// A node type or feature value has no style bucket
    #[error("no style configured for key {0:?}")]
    UnknownStyleKey(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while converting annotation exports to ASAP XML
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The centroid table has no row for the core id taken from the filename
    #[error("no coordinates found for core id {0:?}")]
    CoreIdNotFound(String),

    /// No hotspot XML file matches the core id taken from the filename
    #[error("no hotspot annotation file for {}", .0.display())]
    HotspotFileNotFound(PathBuf),

    /// The filename does not match the pattern the offset strategy needs
    #[error("cannot extract a core id from file name {0:?}")]
    CoreIdUnmatched(String),

    /// The JSON document lacks the Objects_Data array
    #[error("missing Objects_Data in {}", .0.display())]
    MissingObjectsData(PathBuf),

    /// An annotation object lacks a measurement field the export needs
    #[error("object {index} is missing the {field:?} field")]
    MissingMetric { index: usize, field: &'static str },

    /// No input file matches the expected name pattern
    #[error("there are no files to process in the directory {}", .0.display())]
    EmptyInputDirectory(PathBuf),

    /// A centroid CSV row is too short or carries non-numeric coordinates
    #[error("invalid centroid row for core id {0:?}")]
    InvalidCentroidRow(String),

    /// A hotspot document has no Coordinate elements
    #[error("hotspot file {} contains no coordinates", .0.display())]
    EmptyHotspot(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
