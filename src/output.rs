//! Columnar run output.
//!
//! A run produces one [`TreeFile`]: an ordered set of named trees, each a set
//! of equally long `f64` columns. Rows are appended in memory during the run
//! and the whole file is written once at the end, as a bincode payload
//! compressed with zstd behind a 4-byte magic.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Leading bytes of every container file
pub const MAGIC: &[u8; 4] = b"GXR\x01";

/// Conventional file extension
pub const EXTENSION: &str = "gxr";

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode or decode {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("{path} is not a gemxray output file")]
    BadMagic { path: PathBuf },

    #[error("Tree '{tree}' expects {expected} values per row, got {got}")]
    ArityMismatch {
        tree: String,
        expected: usize,
        got: usize,
    },

    #[error("Tree '{0}' already exists")]
    DuplicateTree(String),

    #[error("No tree named '{0}'")]
    UnknownTree(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Named table of equally long columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    name: String,
    columns: Vec<Column>,
}

impl Tree {
    pub fn new(name: &str, column_names: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: column_names
                .iter()
                .map(|c| Column {
                    name: c.to_string(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one row; `row` must have one value per column
    pub fn fill(&mut self, row: &[f64]) -> Result<(), OutputError> {
        if row.len() != self.columns.len() {
            return Err(OutputError::ArityMismatch {
                tree: self.name.clone(),
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.values.push(*value);
        }
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }
}

/// Ordered collection of trees persisted as one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeFile {
    trees: Vec<Tree>,
}

impl TreeFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tree(&mut self, tree: Tree) -> Result<(), OutputError> {
        if self.trees.iter().any(|t| t.name == tree.name) {
            return Err(OutputError::DuplicateTree(tree.name));
        }
        self.trees.push(tree);
        Ok(())
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree(&self, name: &str) -> Option<&Tree> {
        self.trees.iter().find(|t| t.name == name)
    }

    pub fn tree_mut(&mut self, name: &str) -> Result<&mut Tree, OutputError> {
        self.trees
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| OutputError::UnknownTree(name.to_string()))
    }

    pub fn tree_names(&self) -> Vec<&str> {
        self.trees.iter().map(|t| t.name.as_str()).collect()
    }

    /// Persist to `path` through a sibling temporary file and a rename, so a
    /// crash never leaves a truncated container behind.
    pub fn write(&self, path: &Path) -> Result<(), OutputError> {
        let tmp = temporary_path(path);
        let io_err = |p: &Path| {
            let p = p.to_path_buf();
            move |source: std::io::Error| OutputError::Io { path: p, source }
        };

        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC).map_err(io_err(&tmp))?;

        let mut encoder = zstd::stream::write::Encoder::new(writer, ZSTD_LEVEL).map_err(io_err(&tmp))?;
        bincode::serialize_into(&mut encoder, self).map_err(|source| OutputError::Codec {
            path: tmp.clone(),
            source,
        })?;
        let mut writer = encoder.finish().map_err(io_err(&tmp))?;
        writer.flush().map_err(io_err(&tmp))?;
        drop(writer);

        fs::rename(&tmp, path).map_err(io_err(path))?;
        log::info!("Wrote {} trees to {}", self.trees.len(), path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, OutputError> {
        let io_err = |source: std::io::Error| OutputError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        if reader.read_exact(&mut magic).is_err() || &magic != MAGIC {
            return Err(OutputError::BadMagic {
                path: path.to_path_buf(),
            });
        }
        let decoder = zstd::stream::read::Decoder::new(reader).map_err(io_err)?;
        bincode::deserialize_from(decoder).map_err(|source| OutputError::Codec {
            path: path.to_path_buf(),
            source,
        })
    }

    /// One line per tree with its entry count and columns
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for tree in &self.trees {
            out.push_str(&format!(
                "{:<12} {:>8} entries  [{}]\n",
                tree.name,
                tree.entries(),
                tree.column_names().join(", ")
            ));
        }
        out
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
