//! Snapshot export file
//!
//! `{ title, description, type, parameters, timestamp, exportedAt, version }`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Snapshot;
use crate::platform::iso8601;
use crate::sim::{ConfigPatch, OscillatorKind};

/// Current export format version
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("not a snapshot file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported export version {0:?}")]
    UnsupportedVersion(String),

    #[error("export carries no parameters")]
    NoParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotExport {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OscillatorKind,
    pub parameters: ConfigPatch,
    /// Snapshot creation time (Unix ms)
    #[serde(default)]
    pub timestamp: f64,
    /// ISO-8601
    #[serde(default)]
    pub exported_at: String,
    pub version: String,
}

impl SnapshotExport {
    pub fn from_snapshot(snapshot: &Snapshot, exported_at_ms: f64) -> Self {
        Self {
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            kind: snapshot.kind,
            parameters: snapshot.parameters.clone(),
            timestamp: snapshot.created_at,
            exported_at: iso8601(exported_at_ms),
            version: EXPORT_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate an export file
    pub fn parse(json: &str) -> Result<Self, ImportError> {
        let export: SnapshotExport = serde_json::from_str(json)?;
        if export.version != EXPORT_VERSION {
            return Err(ImportError::UnsupportedVersion(export.version));
        }
        if export.parameters.is_empty() {
            return Err(ImportError::NoParameters);
        }
        Ok(export)
    }
}
