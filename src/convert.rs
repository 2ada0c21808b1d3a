//! Batch annotation conversion
//!
//! Walks a directory of per-tile JSON exports, resolves a slide-space
//! offset for each file, and writes ASAP XML documents: one per input, one
//! aggregate document, or both. A failure on one file (missing offset row,
//! missing hotspot annotation, malformed JSON) skips that file and keeps
//! the batch going; the run ends with a summary of everything skipped.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::annotation::AnnotationFile;
use crate::common::{file_stem, list_matching_files, write_string_to_file};
use crate::error::ConvertError;
use crate::export::{to_asap_xml::AsapDocument, to_csv_metrics};
use crate::offset::{csv_core_id, OffsetSource};

/// Which documents a conversion run writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// One `<stem>_asap.xml` per input file.
    PerFile,
    /// One combined document for the whole run.
    Aggregate,
    /// Both of the above.
    Both,
}

impl OutputMode {
    fn per_file(self) -> bool {
        matches!(self, OutputMode::PerFile | OutputMode::Both)
    }

    fn aggregate(self) -> bool {
        matches!(self, OutputMode::Aggregate | OutputMode::Both)
    }
}

/// What a batch run did: files written and files skipped with the reason.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl RunSummary {
    fn skip(&mut self, file: &Path, reason: impl ToString) {
        warn!("Skipping {}: {}", file.display(), reason.to_string());
        self.skipped.push((file.to_path_buf(), reason.to_string()));
    }

    /// Log the outcome of the run.
    pub fn report(&self) {
        info!(
            "Conversion finished: {} file(s) written, {} skipped",
            self.written.len(),
            self.skipped.len()
        );
        for (file, reason) in &self.skipped {
            warn!("Skipped {}: {}", file.display(), reason);
        }
    }
}

fn masks_json_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Masks_.*\.json$").unwrap())
}

fn hotspot_json_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Masks_.*-level0-hotspot\.json$").unwrap())
}

/// The file-name pattern a strategy expects its inputs to match.
fn input_pattern(source: &OffsetSource) -> &'static Regex {
    match source {
        OffsetSource::HotspotDir(_) => hotspot_json_pattern(),
        _ => masks_json_pattern(),
    }
}

/// Aggregate document name; the centroid variant names it after the table.
fn aggregate_output_name(source: &OffsetSource) -> String {
    match source {
        OffsetSource::CentroidCsv { path, .. } => format!("{}_asap.xml", file_stem(path)),
        _ => "annotations_asap.xml".to_string(),
    }
}

fn matched_inputs(input_dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>, ConvertError> {
    let files = list_matching_files(input_dir, pattern)?;
    if files.is_empty() {
        return Err(ConvertError::EmptyInputDirectory(input_dir.to_path_buf()));
    }
    Ok(files)
}

/// Convert every matching export in `input_dir` into ASAP XML.
pub fn run_conversion(
    input_dir: &Path,
    output_dir: &Path,
    source: &OffsetSource,
    mode: OutputMode,
) -> Result<RunSummary, ConvertError> {
    let files = matched_inputs(input_dir, input_pattern(source))?;
    std::fs::create_dir_all(output_dir)?;

    info!(
        "Converting {} file(s) from {}",
        files.len(),
        input_dir.display()
    );

    let mut summary = RunSummary::default();
    let mut aggregate = AsapDocument::default();
    let mut name_base = 0;

    for file in &files {
        let resolved = match source.resolve(file) {
            Ok(resolved) => resolved,
            Err(e) => {
                summary.skip(file, e);
                continue;
            }
        };
        let objects = match AnnotationFile::from_file(file) {
            Ok(objects) => objects,
            Err(e) => {
                summary.skip(file, e);
                continue;
            }
        };

        // Centroid-derived documents mark every group with the core id so
        // tiles stay distinguishable when aggregated.
        let group_suffix = match source {
            OffsetSource::CentroidCsv { .. } => {
                csv_core_id(file).ok().map(|id| format!(", Core_ID_{}", id))
            }
            _ => None,
        };

        if mode.per_file() {
            let mut doc = AsapDocument::default();
            doc.append_tile(&objects, &resolved, group_suffix.as_deref(), 0);
            let output_file = output_dir.join(format!("{}_asap.xml", file_stem(file)));
            write_string_to_file(&output_file, &doc.render()?)?;
            info!("Wrote {}", output_file.display());
            summary.written.push(output_file);
        }
        if mode.aggregate() {
            name_base = aggregate.append_tile(
                &objects,
                &resolved,
                group_suffix.as_deref(),
                name_base,
            );
        }
    }

    if mode.aggregate() {
        let output_file = output_dir.join(aggregate_output_name(source));
        write_string_to_file(&output_file, &aggregate.render()?)?;
        info!("Wrote {}", output_file.display());
        summary.written.push(output_file);
    }

    summary.report();
    Ok(summary)
}

/// Write the measurement table of every matching export as CSV.
pub fn run_metrics_export(input_dir: &Path, output_dir: &Path) -> Result<RunSummary, ConvertError> {
    let files = matched_inputs(input_dir, hotspot_json_pattern())?;
    std::fs::create_dir_all(output_dir)?;

    let mut summary = RunSummary::default();
    for file in &files {
        let objects = match AnnotationFile::from_file(file) {
            Ok(objects) => objects,
            Err(e) => {
                summary.skip(file, e);
                continue;
            }
        };
        let csv = match to_csv_metrics::render(&objects) {
            Ok(csv) => csv,
            Err(e) => {
                summary.skip(file, e);
                continue;
            }
        };
        let output_file = output_dir.join(format!("{}.csv", file_stem(file)));
        write_string_to_file(&output_file, &csv)?;
        info!("Wrote {}", output_file.display());
        summary.written.push(output_file);
    }

    summary.report();
    Ok(summary)
}
