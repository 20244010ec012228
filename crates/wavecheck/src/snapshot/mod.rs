//! Append-only snapshot persistence.
//!
//! Captures are CSV files partitioned by (timing phase, side, organization,
//! entity type). Files are opened in append mode for every write and the
//! header row is written only when the file is empty, which makes a killed
//! run restartable: resume mode re-derives the set of already-written keys
//! from the partial output instead of overwriting it.

pub mod entities;

use std::collections::HashSet;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture timing relative to the migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the migration produced a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity types captured per organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Repos,
    Users,
    Teams,
    TeamRepos,
    TeamUsers,
}

impl Entity {
    /// All entity types, in capture order.
    pub const ALL: [Entity; 5] = [
        Entity::TeamRepos,
        Entity::TeamUsers,
        Entity::Teams,
        Entity::Repos,
        Entity::Users,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Entity::Repos => "repos",
            Entity::Users => "users",
            Entity::Teams => "teams",
            Entity::TeamRepos => "team-repos",
            Entity::TeamUsers => "team-users",
        }
    }

    /// The column reconciliation keys this entity's rows on.
    #[must_use]
    pub fn key_column(self) -> &'static str {
        match self {
            Entity::Repos => "name",
            Entity::Users => "login",
            Entity::Teams => "slug",
            Entity::TeamRepos => "name",
            Entity::TeamUsers => "login",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no column named {column:?}")]
    MissingColumn { path: PathBuf, column: String },
}

/// Append-only tabular store rooted at one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| SnapshotError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a per-wave stats capture: `{phase}-{side}-wave-{n}.csv`.
    #[must_use]
    pub fn stats_path(&self, phase: Phase, side: Side, wave: u32) -> PathBuf {
        self.root.join(format!("{phase}-{side}-wave-{wave}.csv"))
    }

    /// Path of a per-org entity capture: `{phase}-{side}-{org}-{entity}.csv`.
    #[must_use]
    pub fn entity_path(&self, phase: Phase, side: Side, org: &str, entity: Entity) -> PathBuf {
        self.root.join(format!("{phase}-{side}-{org}-{entity}.csv"))
    }

    /// Path of a mannequin mapping sheet: `manns-wave-{org}.csv`.
    #[must_use]
    pub fn mannequin_path(&self, org: &str) -> PathBuf {
        self.root.join(format!("manns-wave-{org}.csv"))
    }

    /// Delete a capture so a fresh (non-resume) run starts clean.
    pub fn reset(&self, path: &Path) -> Result<(), SnapshotError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Create a capture file if it does not exist yet, leaving it empty.
    ///
    /// Entity captures are created up front so an organization with no rows
    /// for an entity still produces a capture.
    pub fn touch(&self, path: &Path) -> Result<(), SnapshotError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map(|_| ())
            .map_err(|source| SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Append one record, writing the header row only if the file is empty.
    pub fn append<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), SnapshotError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let needs_header = file
            .metadata()
            .map_err(|source| SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record).map_err(|source| SnapshotError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Append a batch of records.
    pub fn append_all<T: Serialize>(
        &self,
        path: &Path,
        records: &[T],
    ) -> Result<(), SnapshotError> {
        for record in records {
            self.append(path, record)?;
        }
        Ok(())
    }

    /// Read the set of values in the named column of an existing capture.
    ///
    /// A missing file yields an empty set (nothing has been written yet);
    /// a present file without the column is an error.
    pub fn existing_values(
        &self,
        path: &Path,
        column: &str,
    ) -> Result<HashSet<String>, SnapshotError> {
        let mut values = HashSet::new();

        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind()
                    && io.kind() == std::io::ErrorKind::NotFound
                {
                    return Ok(values);
                }
                return Err(SnapshotError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let headers = reader.headers().map_err(|source| SnapshotError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let index = headers.iter().position(|h| h == column).ok_or_else(|| {
            SnapshotError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            }
        })?;

        for record in reader.records() {
            let record = record.map_err(|source| SnapshotError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            if let Some(value) = record.get(index) {
                values.insert(value.to_string());
            }
        }

        Ok(values)
    }
}
