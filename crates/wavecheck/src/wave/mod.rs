//! Wave resolution from the org mapping table.
//!
//! The mapping is tabular: one row per source organization with its target
//! and dry-run target names, the wave it migrates in, and an exclusion
//! flag. The engine only ever asks one question of it: which organizations
//! (for which role) belong to wave N, exclusions filtered out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Which mapping column names the organization to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgRole {
    Source,
    Target,
    DryRunTarget,
}

impl OrgRole {
    /// The mapping column this role reads.
    #[must_use]
    pub fn column_name(self) -> &'static str {
        match self {
            OrgRole::Source => "source_name",
            OrgRole::Target => "target_name",
            OrgRole::DryRunTarget => "dry_run_target_name",
        }
    }
}

#[derive(Debug, Error)]
pub enum WaveError {
    #[error("cannot read org mapping {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("no {column} orgs found for wave {wave}")]
    NoOrgsForWave { column: &'static str, wave: u32 },
}

/// One row of the org mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMappingRow {
    pub source_name: String,
    pub target_name: String,
    pub dry_run_target_name: String,
    pub wave: u32,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(deserialize_with = "flexible_bool")]
    pub exclude: bool,
    #[serde(default)]
    pub exclude_reason: String,
}

/// A source/target pair resolved for one wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgPair {
    pub source: String,
    pub target: String,
}

/// The loaded org mapping.
#[derive(Debug, Clone)]
pub struct OrgMapping {
    rows: Vec<OrgMappingRow>,
}

impl OrgMapping {
    /// Load the mapping from a CSV file.
    pub fn load(path: &Path) -> Result<Self, WaveError> {
        let mut reader = csv::Reader::from_path(path).map_err(|source| WaveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<OrgMappingRow>, _>>()
            .map_err(|source| WaveError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { rows })
    }

    #[must_use]
    pub fn from_rows(rows: Vec<OrgMappingRow>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[OrgMappingRow] {
        &self.rows
    }

    fn wave_rows(&self, wave: u32) -> impl Iterator<Item = &OrgMappingRow> {
        self.rows
            .iter()
            .filter(move |row| !row.exclude && row.wave == wave)
    }

    /// Non-excluded org names of `role` in `wave`.
    ///
    /// Resolving to nothing is a configuration error, surfaced before any
    /// harvesting starts.
    pub fn orgs_for_wave(&self, role: OrgRole, wave: u32) -> Result<Vec<String>, WaveError> {
        let orgs: Vec<String> = self
            .wave_rows(wave)
            .map(|row| match role {
                OrgRole::Source => row.source_name.clone(),
                OrgRole::Target => row.target_name.clone(),
                OrgRole::DryRunTarget => row.dry_run_target_name.clone(),
            })
            .collect();

        if orgs.is_empty() {
            return Err(WaveError::NoOrgsForWave {
                column: role.column_name(),
                wave,
            });
        }
        Ok(orgs)
    }

    /// Source/target pairs for one wave, for reconciliation file naming.
    pub fn pairs_for_wave(&self, wave: u32, dry_run: bool) -> Result<Vec<OrgPair>, WaveError> {
        let pairs: Vec<OrgPair> = self
            .wave_rows(wave)
            .map(|row| OrgPair {
                source: row.source_name.clone(),
                target: if dry_run {
                    row.dry_run_target_name.clone()
                } else {
                    row.target_name.clone()
                },
            })
            .collect();

        if pairs.is_empty() {
            return Err(WaveError::NoOrgsForWave {
                column: if dry_run {
                    OrgRole::DryRunTarget.column_name()
                } else {
                    OrgRole::Target.column_name()
                },
                wave,
            });
        }
        Ok(pairs)
    }
}

/// Accept the boolean spellings spreadsheets produce.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid exclude flag: {other:?}"
        ))),
    }
}
