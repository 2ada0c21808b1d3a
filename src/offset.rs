//! Coordinate offset resolution
//!
//! Annotation exports are in local tile coordinates. Before emission every
//! point is translated into whole-slide space by an offset resolved per
//! source file: a constant, the matching row of a centroid CSV table, or
//! the first coordinate of the tile's hotspot annotation file.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::common::file_stem;
use crate::error::ConvertError;

/// A slide-space translation. `radius` recenters a hotspot crop: it is
/// subtracted from both axes on application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
    pub radius: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset {
        dx: 0.0,
        dy: 0.0,
        radius: 0.0,
    };

    pub fn new(dx: f64, dy: f64, radius: f64) -> Self {
        Self { dx, dy, radius }
    }

    /// Translate one point: `(x + dx - r, y + dy - r)`.
    pub fn apply(&self, point: (f64, f64)) -> (f64, f64) {
        (
            point.0 + self.dx - self.radius,
            point.1 + self.dy - self.radius,
        )
    }
}

/// Offset resolved for one input file. The hotspot strategy additionally
/// yields the hotspot polygon itself, emitted un-offset as a rectangle
/// annotation because its first coordinate defines the local origin.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedOffset {
    pub offset: Offset,
    pub hotspot_polygon: Option<Vec<(f64, f64)>>,
}

/// Where per-file offsets come from.
#[derive(Clone, Debug)]
pub enum OffsetSource {
    /// The same offset for every file.
    Constant(Offset),
    /// Semicolon-delimited table `id;x;y[;radius]`, keyed by the core id in
    /// the file name (`..._CoreID_<id>`). The slide bounds are added to the
    /// looked-up centroid.
    CentroidCsv {
        path: PathBuf,
        bounds_x: f64,
        bounds_y: f64,
    },
    /// Directory of `<core id>.xml` hotspot files, keyed by the core id in
    /// the file name (`Masks_<id>-level0-hotspot`).
    HotspotDir(PathBuf),
}

impl OffsetSource {
    /// Resolve the offset for one annotation export file.
    pub fn resolve(&self, input: &Path) -> Result<ResolvedOffset, ConvertError> {
        match self {
            OffsetSource::Constant(offset) => Ok(ResolvedOffset {
                offset: *offset,
                hotspot_polygon: None,
            }),
            OffsetSource::CentroidCsv {
                path,
                bounds_x,
                bounds_y,
            } => {
                let core_id = csv_core_id(input)?;
                let offset = centroid_lookup(path, &core_id, *bounds_x, *bounds_y)?;
                Ok(ResolvedOffset {
                    offset,
                    hotspot_polygon: None,
                })
            }
            OffsetSource::HotspotDir(dir) => {
                let core_id = hotspot_core_id(input)?;
                let hotspot_file = dir.join(format!("{}.xml", core_id));
                if !hotspot_file.is_file() {
                    return Err(ConvertError::HotspotFileNotFound(hotspot_file));
                }
                let polygon = read_hotspot_polygon(&hotspot_file)?;
                let (dx, dy) = polygon[0];
                Ok(ResolvedOffset {
                    offset: Offset::new(dx, dy, 0.0),
                    hotspot_polygon: Some(polygon),
                })
            }
        }
    }

    /// Whether this strategy emits the hotspot rectangle group.
    pub fn emits_hotspot(&self) -> bool {
        matches!(self, OffsetSource::HotspotDir(_))
    }
}

fn csv_core_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".*_CoreID_(.*)").unwrap())
}

fn hotspot_core_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Masks_(.*)-level0-hotspot").unwrap())
}

/// Core id from a `..._CoreID_<id>` file name.
pub fn csv_core_id(input: &Path) -> Result<String, ConvertError> {
    let stem = file_stem(input);
    csv_core_id_regex()
        .captures(&stem)
        .map(|c| c[1].to_string())
        .ok_or(ConvertError::CoreIdUnmatched(stem))
}

/// Core id from a `Masks_<id>-level0-hotspot` file name.
pub fn hotspot_core_id(input: &Path) -> Result<String, ConvertError> {
    let stem = file_stem(input);
    hotspot_core_id_regex()
        .captures(&stem)
        .map(|c| c[1].to_string())
        .ok_or(ConvertError::CoreIdUnmatched(stem))
}

/// Scan the centroid table for `core_id` and build the offset from its row.
fn centroid_lookup(
    csv_path: &Path,
    core_id: &str,
    bounds_x: f64,
    bounds_y: f64,
) -> Result<Offset, ConvertError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path)?;

    for record in reader.records() {
        let record = record?;
        if record.get(0) == Some(core_id) {
            let field = |i: usize| {
                record
                    .get(i)
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .ok_or_else(|| ConvertError::InvalidCentroidRow(core_id.to_string()))
            };
            let dx = field(1)? + bounds_x;
            let dy = field(2)? + bounds_y;
            let radius = match record.get(3) {
                Some(v) if !v.trim().is_empty() => v
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ConvertError::InvalidCentroidRow(core_id.to_string()))?,
                _ => 0.0,
            };
            debug!("core id {}: offset ({}, {}), radius {}", core_id, dx, dy, radius);
            return Ok(Offset::new(dx, dy, radius));
        }
    }

    Err(ConvertError::CoreIdNotFound(core_id.to_string()))
}

/// All `Coordinate` points of a hotspot annotation document.
fn read_hotspot_polygon(path: &Path) -> Result<Vec<(f64, f64)>, ConvertError> {
    let text = std::fs::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&text)?;
    let polygon: Vec<(f64, f64)> = doc
        .descendants()
        .filter(|n| n.has_tag_name("Coordinate"))
        .filter_map(|n| {
            let x = n.attribute("X")?.parse::<f64>().ok()?;
            let y = n.attribute("Y")?.parse::<f64>().ok()?;
            Some((x, y))
        })
        .collect();
    if polygon.is_empty() {
        return Err(ConvertError::EmptyHotspot(path.to_path_buf()));
    }
    Ok(polygon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::write_string_to_file;
    use tempfile::tempdir;

    #[test]
    fn constant_offset_applies_with_radius() {
        let offset = Offset::new(10.0, -5.0, 2.0);
        assert_eq!(offset.apply((1.0, 1.0)), (9.0, -6.0));
    }

    #[test]
    fn core_ids_are_extracted_from_file_names() {
        let id = csv_core_id(Path::new("Masks_00.2205_1D_CoreID_17.json")).unwrap();
        assert_eq!(id, "17");
        let id = hotspot_core_id(Path::new("Masks_00.2205_1D-level0-hotspot.json")).unwrap();
        assert_eq!(id, "00.2205_1D");
    }

    #[test]
    fn unmatched_file_name_is_an_error() {
        let err = csv_core_id(Path::new("unrelated.json")).unwrap_err();
        assert!(matches!(err, ConvertError::CoreIdUnmatched(_)));
    }

    #[test]
    fn centroid_lookup_finds_the_row() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("centroids.csv");
        write_string_to_file(&csv_path, "16;100.5;200.5;50\n17;300;400;25\n").unwrap();

        let source = OffsetSource::CentroidCsv {
            path: csv_path,
            bounds_x: 0.0,
            bounds_y: 0.0,
        };
        let resolved = source
            .resolve(Path::new("Masks_x_CoreID_17.json"))
            .unwrap();
        assert_eq!(resolved.offset, Offset::new(300.0, 400.0, 25.0));
        assert!(resolved.hotspot_polygon.is_none());
    }

    #[test]
    fn centroid_lookup_adds_slide_bounds() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("centroids.csv");
        write_string_to_file(&csv_path, "17;300;400;25\n").unwrap();

        let source = OffsetSource::CentroidCsv {
            path: csv_path,
            bounds_x: 30.0,
            bounds_y: 30320.0,
        };
        let resolved = source
            .resolve(Path::new("Masks_x_CoreID_17.json"))
            .unwrap();
        assert_eq!(resolved.offset, Offset::new(330.0, 30720.0, 25.0));
    }

    #[test]
    fn missing_core_id_row_is_reported() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("centroids.csv");
        write_string_to_file(&csv_path, "16;100;200;50\n").unwrap();

        let source = OffsetSource::CentroidCsv {
            path: csv_path,
            bounds_x: 0.0,
            bounds_y: 0.0,
        };
        let err = source
            .resolve(Path::new("Masks_x_CoreID_17.json"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::CoreIdNotFound(id) if id == "17"));
    }

    #[test]
    fn radius_column_is_optional() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("centroids.csv");
        write_string_to_file(&csv_path, "17;300;400\n").unwrap();

        let source = OffsetSource::CentroidCsv {
            path: csv_path,
            bounds_x: 0.0,
            bounds_y: 0.0,
        };
        let resolved = source
            .resolve(Path::new("Masks_x_CoreID_17.json"))
            .unwrap();
        assert_eq!(resolved.offset, Offset::new(300.0, 400.0, 0.0));
    }

    #[test]
    fn hotspot_lookup_reads_the_first_coordinate() {
        let dir = tempdir().unwrap();
        write_string_to_file(
            &dir.path().join("00.2205_1D.xml"),
            r#"<ASAP_Annotations><Annotations><Annotation>
                 <Coordinates>
                   <Coordinate Order="0" X="1000.5" Y="2000.5"/>
                   <Coordinate Order="1" X="1500.5" Y="2000.5"/>
                 </Coordinates>
               </Annotation></Annotations></ASAP_Annotations>"#,
        )
        .unwrap();

        let source = OffsetSource::HotspotDir(dir.path().to_path_buf());
        let resolved = source
            .resolve(Path::new("Masks_00.2205_1D-level0-hotspot.json"))
            .unwrap();
        assert_eq!(resolved.offset, Offset::new(1000.5, 2000.5, 0.0));
        assert_eq!(
            resolved.hotspot_polygon.unwrap(),
            vec![(1000.5, 2000.5), (1500.5, 2000.5)]
        );
    }

    #[test]
    fn missing_hotspot_file_is_reported() {
        let dir = tempdir().unwrap();
        let source = OffsetSource::HotspotDir(dir.path().to_path_buf());
        let err = source
            .resolve(Path::new("Masks_00.2205_1D-level0-hotspot.json"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::HotspotFileNotFound(_)));
    }
}
