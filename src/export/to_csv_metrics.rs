//! Per-object measurement table export
//!
//! Writes the scalar measurements of every annotation object as a
//! semicolon-delimited CSV with a header row, one row per object in input
//! order.

use csv::WriterBuilder;

use crate::annotation::AnnotationObject;
use crate::error::ConvertError;

const FIELDS: [&str; 7] = [
    "Object_Index",
    "Classification",
    "Area",
    "Circularity",
    "Number_Cells",
    "Perimeter",
    "Solidity",
];

pub fn render(objects: &[AnnotationObject]) -> Result<String, ConvertError> {
    let mut wtr = WriterBuilder::new().delimiter(b';').from_writer(vec![]);

    wtr.write_record(FIELDS)?;

    for (index, object) in objects.iter().enumerate() {
        let metric = |field: &'static str, value: Option<f64>| {
            value
                .map(|v| v.to_string())
                .ok_or(ConvertError::MissingMetric { index, field })
        };
        wtr.write_record(&[
            object
                .object_index
                .map(|v| v.to_string())
                .ok_or(ConvertError::MissingMetric {
                    index,
                    field: "Object_Index",
                })?,
            object.classification.clone(),
            metric("Area", object.area)?,
            metric("Circularity", object.circularity)?,
            object
                .number_cells
                .map(|v| v.to_string())
                .ok_or(ConvertError::MissingMetric {
                    index,
                    field: "Number_Cells",
                })?,
            metric("Perimeter", object.perimeter)?,
            metric("Solidity", object.solidity)?,
        ])?;
    }

    let data = wtr.into_inner().map_err(|e| e.into_error())?;
    let csv_string = String::from_utf8(data).expect("csv output is UTF-8");

    Ok(csv_string)
}
