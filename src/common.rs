use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn write_string_to_file(filename: &Path, content: &str) -> std::io::Result<()> {
    let mut file = File::create(filename)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// File name without its extension, lossy on non-UTF-8 names.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// List the files in `dir` whose names match `pattern`, sorted by name.
pub fn list_matching_files(dir: &Path, pattern: &Regex) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| pattern.is_match(n))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
