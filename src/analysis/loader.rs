//! Discovery and parallel loading of run output files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use color_eyre::eyre::{Context, Result};
use rayon::prelude::*;
use regex::Regex;

use super::types::RunFile;
use crate::output::{TreeFile, EXTENSION};

/// Compiled regex patterns for file names
pub struct FilePatterns {
    /// Match: "<name>_<digits>", e.g. "copper_35.gxr"
    pub scan_parameter: Regex,
}

impl FilePatterns {
    pub fn new() -> Self {
        Self {
            scan_parameter: Regex::new(r"\w+_(\d+)").expect("Invalid scan_parameter regex"),
        }
    }
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<FilePatterns> = LazyLock::new(FilePatterns::new);

/// Scan parameter encoded in a file name, as (digits, value)
pub fn extract_parameter(file_name: &str) -> Option<(String, f64)> {
    let caps = PATTERNS.scan_parameter.captures(file_name)?;
    let digits = caps.get(1)?.as_str();
    let value = digits.parse().ok()?;
    Some((digits.to_string(), value))
}

/// Output files in `dir`, sorted by name
pub fn find_run_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read input directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

/// Load every output file in `dir` in parallel.
///
/// Files whose name carries no scan parameter, or that fail to decode, are
/// skipped with a warning. The result is ordered by scan parameter.
pub fn load_runs(dir: &Path) -> Result<Vec<RunFile>> {
    let files = find_run_files(dir)?;
    log::info!("Loading {} run files from {}...", files.len(), dir.display());

    let mut runs: Vec<RunFile> = files
        .par_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().to_string();
            let Some((label, parameter)) = extract_parameter(&name) else {
                log::warn!("Skipping {}: no scan parameter in file name", name);
                return None;
            };
            match TreeFile::read(path) {
                Ok(trees) => {
                    log::debug!("Loaded {} ({} trees)", name, trees.trees().len());
                    Some(RunFile {
                        path: path.clone(),
                        label,
                        parameter,
                        trees,
                    })
                }
                Err(e) => {
                    log::warn!("Failed to read {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    runs.sort_by(|a, b| a.parameter.total_cmp(&b.parameter).then_with(|| a.path.cmp(&b.path)));
    log::info!("Loaded {} runs", runs.len());
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Tree;
    use tempfile::TempDir;

    #[test]
    fn test_extract_parameter() {
        assert_eq!(extract_parameter("run_35.gxr"), Some(("35".to_string(), 35.0)));
        assert_eq!(extract_parameter("copper_tape_060.gxr"), Some(("060".to_string(), 60.0)));
        assert_eq!(extract_parameter("baseline.gxr"), None);
    }

    fn write_run(dir: &Path, name: &str, energy: f64) {
        let mut file = TreeFile::new();
        let mut primary = Tree::new("primary", &["energy"]);
        primary.fill(&[energy]).unwrap();
        file.add_tree(primary).unwrap();
        file.write(&dir.join(name)).unwrap();
    }

    #[test]
    fn test_load_runs_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_run(dir.path(), "run_60.gxr", 1.0);
        write_run(dir.path(), "run_5.gxr", 2.0);
        write_run(dir.path(), "nolabel.gxr", 3.0);
        fs::write(dir.path().join("run_7.txt"), "ignored").unwrap();
        fs::write(dir.path().join("run_8.gxr"), "corrupt").unwrap();

        let runs = load_runs(dir.path()).unwrap();
        let params: Vec<f64> = runs.iter().map(|r| r.parameter).collect();
        assert_eq!(params, vec![5.0, 60.0]);
        assert_eq!(runs[0].trees.tree("primary").unwrap().column("energy"), Some(&[2.0][..]));
    }

    #[test]
    fn test_missing_directory() {
        assert!(load_runs(Path::new("/nonexistent/dir")).is_err());
    }
}
