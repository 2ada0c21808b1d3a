//! Per-tile JSON annotation exports
//!
//! Serde model of the segmentation tool's JSON format: a top-level
//! `Objects_Data` array of classified objects, each with an ROI polygon in
//! local tile coordinates, a center of mass and a set of scalar
//! measurements that are carried through unmodified.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConvertError;

/// One annotated object from the export.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationObject {
    #[serde(rename = "Classification")]
    pub classification: String,
    #[serde(rename = "ROI_Points", default)]
    pub roi_points: Vec<(f64, f64)>,
    #[serde(rename = "Center_of_Mass", default)]
    pub center_of_mass: (f64, f64),
    #[serde(rename = "Object_Index", default)]
    pub object_index: Option<i64>,
    #[serde(rename = "Area", default)]
    pub area: Option<f64>,
    #[serde(rename = "Circularity", default)]
    pub circularity: Option<f64>,
    #[serde(rename = "Number_Cells", default)]
    pub number_cells: Option<i64>,
    #[serde(rename = "Perimeter", default)]
    pub perimeter: Option<f64>,
    #[serde(rename = "Solidity", default)]
    pub solidity: Option<f64>,
}

/// The whole document. `Objects_Data` is optional at the serde layer so a
/// malformed export surfaces as a named error instead of a decode failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationFile {
    #[serde(rename = "Objects_Data")]
    objects: Option<Vec<AnnotationObject>>,
}

impl AnnotationFile {
    pub fn from_file(path: &Path) -> Result<Vec<AnnotationObject>, ConvertError> {
        let text = std::fs::read_to_string(path)?;
        let file: AnnotationFile = serde_json::from_str(&text)?;
        file.objects
            .ok_or_else(|| ConvertError::MissingObjectsData(path.to_path_buf()))
    }
}
