//! Snapshot persistence
//!
//! Features:
//! - Snapshot model shared by both storage tiers (camelCase JSON)
//! - `PersistenceAdapter`: the only interface the snapshot store talks to
//! - Device tier (LocalStorage, with legacy key merge)
//! - Account tier (external Auth/Storage collaborator)
//! - Merged, de-duplicated, ownership-aware listing
//! - JSON export/import

pub mod export;
pub mod local;
pub mod remote;
pub mod store;

pub use export::{EXPORT_VERSION, ImportError, SnapshotExport};
pub use local::LocalTier;
pub use remote::{AccountService, InMemoryAccounts, RemoteTier, SignedOut, User};
pub use store::{SnapshotStore, StoreError, merge_views};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::consts::ANONYMOUS_OWNER;
use crate::platform::StorageError;
use crate::sim::{ClockState, ConfigPatch, OscillatorKind, Sample, SessionCapture};

/// Failure in a storage tier
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("snapshot data not serializable: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("account service: {0}")]
    Remote(String),

    #[error("not signed in")]
    NotAuthenticated,
}

/// One storage tier
pub trait PersistenceAdapter {
    /// Every snapshot held by this tier
    fn load_all(&self) -> Result<Vec<Snapshot>, PersistenceError>;
    /// Replace the tier's contents
    fn save_all(&mut self, snapshots: &[Snapshot]) -> Result<(), PersistenceError>;
    /// Store a new snapshot; returns the id the tier recorded it under
    fn create(&mut self, snapshot: Snapshot) -> Result<String, PersistenceError>;
}

/// Who a snapshot belongs to. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    #[default]
    Anonymous,
    User(String),
}

impl Owner {
    pub fn for_user(user: Option<&User>) -> Self {
        match user {
            Some(u) => Owner::User(u.id.clone()),
            None => Owner::Anonymous,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Owner::Anonymous => ANONYMOUS_OWNER,
            Owner::User(id) => id,
        }
    }
}

impl From<String> for Owner {
    fn from(s: String) -> Self {
        if s.is_empty() || s == ANONYMOUS_OWNER {
            Owner::Anonymous
        } else {
            Owner::User(s)
        }
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Anonymous => ANONYMOUS_OWNER.to_string(),
            Owner::User(id) => id,
        }
    }
}

/// A saved parameter set plus clock state and recent samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: OscillatorKind,
    #[serde(default)]
    pub parameters: ConfigPatch,
    /// Virtual time at save
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub running: bool,
    /// Unix ms
    #[serde(default, alias = "timestamp")]
    pub created_at: f64,
    #[serde(rename = "ownerId", default)]
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_samples: Vec<Sample>,
}

impl Snapshot {
    pub fn from_capture(
        id: String,
        title: String,
        description: String,
        capture: SessionCapture,
        created_at: f64,
        owner: Owner,
    ) -> Self {
        Self {
            id,
            title,
            description,
            kind: capture.kind,
            parameters: capture.parameters,
            time: capture.clock.virtual_time,
            running: capture.clock.running,
            created_at,
            owner,
            recent_samples: capture.recent_samples,
        }
    }

    pub fn to_capture(&self) -> SessionCapture {
        SessionCapture {
            kind: self.kind,
            parameters: self.parameters.clone(),
            clock: ClockState {
                virtual_time: if self.time.is_finite() { self.time.max(0.0) } else { 0.0 },
                running: self.running,
            },
            recent_samples: self.recent_samples.clone(),
        }
    }
}

/// Older code paths stored numeric ids (`Date.now()`)
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

/// Parse a stored JSON array leniently: unreadable entries are skipped
pub(crate) fn parse_snapshot_list(json: &str) -> Vec<Snapshot> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(values) => values,
        Err(e) => {
            log::warn!("Stored snapshot list unreadable: {}", e);
            return Vec::new();
        }
    };
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<Snapshot>(v) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("Skipping unreadable snapshot: {}", e);
                None
            }
        })
        .collect()
}

/// Snapshot id generator
#[derive(Debug, Clone)]
pub struct SnapshotIds {
    rng: Pcg32,
}

impl SnapshotIds {
    /// Deterministic ids (tests, replays)
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Pcg32::from_rng(&mut rand::rng()),
        }
    }

    pub fn next_id(&mut self, created_at_ms: f64) -> String {
        let millis = if created_at_ms.is_finite() { created_at_ms.max(0.0) as u64 } else { 0 };
        format!("snap-{:x}-{:08x}", millis, self.rng.random::<u32>())
    }
}
