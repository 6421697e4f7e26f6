//! Session snapshot model and per-key merge.
//!
//! A snapshot holds browser state (cookies, local storage, session storage)
//! keyed by `(kind, domain, key)`. Incoming diffs are merged one key at a
//! time: an incoming change wins only if its client timestamp is strictly
//! newer than the stored entry's. Losing changes are reported back as lost
//! updates, never as errors.
//!
//! Removals are kept as timestamped tombstones so that an older add arriving
//! late cannot resurrect a deleted key. Tombstones are invisible to readers
//! and excluded from the content hash. They are compacted once older than
//! [`TOMBSTONE_RETENTION_DAYS`]; a change delayed longer than that can bring
//! a removed key back.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::types::{ResourceId, Timestamp, UserId};

/// Maximum number of entries accepted in a single diff.
pub const MAX_DIFF_ENTRIES: usize = 5_000;

/// Age after which a removal tombstone is dropped at the next merge.
pub const TOMBSTONE_RETENTION_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// Keys and entries
// ---------------------------------------------------------------------------

/// Which browser store an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Cookie,
    LocalStorage,
    SessionStorage,
}

/// Merge granularity: one cookie or storage key on one domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub kind: EntryKind,
    pub domain: String,
    pub key: String,
}

impl EntryKey {
    pub fn new(kind: EntryKind, domain: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind,
            domain: domain.into(),
            key: key.into(),
        }
    }
}

/// Stored value of a key plus its provenance. `value == None` is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: Option<String>,
    pub last_modified_at: Timestamp,
    pub last_modified_by: UserId,
}

impl StoredEntry {
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// The change a diff entry makes to its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffOp {
    Added { value: String },
    Modified { value: String },
    Removed,
}

impl DiffOp {
    fn new_value(&self) -> Option<String> {
        match self {
            Self::Added { value } | Self::Modified { value } => Some(value.clone()),
            Self::Removed => None,
        }
    }
}

/// One edit produced on a client, stamped with when and by whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub kind: EntryKind,
    pub domain: String,
    pub key: String,
    pub op: DiffOp,
    pub modified_at: Timestamp,
    pub modified_by: UserId,
}

impl DiffEntry {
    pub fn entry_key(&self) -> EntryKey {
        EntryKey::new(self.kind, self.domain.clone(), self.key.clone())
    }

    fn to_stored(&self) -> StoredEntry {
        StoredEntry {
            value: self.op.new_value(),
            last_modified_at: self.modified_at,
            last_modified_by: self.modified_by.clone(),
        }
    }
}

/// A batch of edits to merge into a resource's snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDiff {
    pub entries: Vec<DiffEntry>,
}

impl SessionDiff {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entries.len() > MAX_DIFF_ENTRIES {
            return Err(CoreError::Validation(format!(
                "Diff has {} entries (max {MAX_DIFF_ENTRIES})",
                self.entries.len()
            )));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.domain.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "entries[{i}].domain must not be empty"
                )));
            }
            if entry.key.is_empty() {
                return Err(CoreError::Validation(format!(
                    "entries[{i}].key must not be empty"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Durable session state of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub resource_id: ResourceId,
    #[serde(with = "entry_map")]
    pub entries: BTreeMap<EntryKey, StoredEntry>,
    /// Strictly increases by one per successful merge. 0 = never merged.
    pub version: u64,
    pub content_hash: String,
    pub updated_at: Option<Timestamp>,
}

impl SessionSnapshot {
    pub fn empty(resource_id: impl Into<ResourceId>) -> Self {
        let entries = BTreeMap::new();
        Self {
            resource_id: resource_id.into(),
            content_hash: content_hash(&entries),
            entries,
            version: 0,
            updated_at: None,
        }
    }

    /// Entries visible to readers (tombstones filtered out).
    pub fn live_entries(&self) -> impl Iterator<Item = (&EntryKey, &StoredEntry)> {
        self.entries.iter().filter(|(_, e)| !e.is_tombstone())
    }

    pub fn get(&self, key: &EntryKey) -> Option<&str> {
        self.entries.get(key).and_then(|e| e.value.as_deref())
    }
}

/// Canonical hash of the live entries.
///
/// `BTreeMap` iteration is key-sorted, so the hash depends only on content,
/// not on insertion order. Every field is length-prefixed so that no two
/// distinct entry sets feed the hasher the same bytes.
pub fn content_hash(entries: &BTreeMap<EntryKey, StoredEntry>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in entries
        .iter()
        .filter_map(|(k, e)| e.value.as_deref().map(|v| (k, v)))
    {
        hasher.update([key.kind as u8]);
        for field in [key.domain.as_str(), key.key.as_str(), value] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// An incoming change that lost to a newer (or equally old) stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LostUpdate {
    #[serde(flatten)]
    pub key: EntryKey,
    pub incoming_at: Timestamp,
    pub incoming_by: UserId,
    pub winning_at: Timestamp,
    pub winning_by: UserId,
}

/// What happened to each diff entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub applied: Vec<EntryKey>,
    /// Exact replays of already-applied entries (at-least-once delivery).
    pub duplicates: Vec<EntryKey>,
    pub lost_updates: Vec<LostUpdate>,
}

/// Successful merge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub version: u64,
    pub content_hash: String,
    pub report: MergeReport,
}

/// Outcome of `merge_and_persist`. Conflict is an expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Merged(MergeResult),
    Conflict {
        current_version: u64,
        base_version: u64,
    },
}

/// A base version newer than the stored snapshot means the client saw state
/// this store never had. Older bases are fine: the merge is per key.
pub fn check_base_version(current_version: u64, base_version: u64) -> Result<(), (u64, u64)> {
    if base_version > current_version {
        Err((current_version, base_version))
    } else {
        Ok(())
    }
}

enum Verdict {
    Apply,
    Duplicate,
    Lose {
        winning_at: Timestamp,
        winning_by: UserId,
    },
}

/// Merge `diff` into `current`, producing the next snapshot.
///
/// Entries are applied in diff order. The version increments by exactly one
/// regardless of how many keys changed.
pub fn merge_diff(
    current: &SessionSnapshot,
    diff: &SessionDiff,
    now: Timestamp,
) -> (SessionSnapshot, MergeReport) {
    let mut entries = current.entries.clone();
    let mut report = MergeReport::default();

    for change in &diff.entries {
        let key = change.entry_key();
        let incoming = change.to_stored();

        let verdict = match entries.get(&key) {
            None => Verdict::Apply,
            Some(existing) if incoming.last_modified_at > existing.last_modified_at => {
                Verdict::Apply
            }
            Some(existing) if *existing == incoming => Verdict::Duplicate,
            Some(existing) => Verdict::Lose {
                winning_at: existing.last_modified_at,
                winning_by: existing.last_modified_by.clone(),
            },
        };

        match verdict {
            Verdict::Apply => {
                entries.insert(key.clone(), incoming);
                report.applied.push(key);
            }
            Verdict::Duplicate => report.duplicates.push(key),
            Verdict::Lose {
                winning_at,
                winning_by,
            } => report.lost_updates.push(LostUpdate {
                key,
                incoming_at: incoming.last_modified_at,
                incoming_by: incoming.last_modified_by,
                winning_at,
                winning_by,
            }),
        }
    }

    let horizon = now - Duration::days(TOMBSTONE_RETENTION_DAYS);
    entries.retain(|_, e| !e.is_tombstone() || e.last_modified_at >= horizon);

    let next = SessionSnapshot {
        resource_id: current.resource_id.clone(),
        content_hash: content_hash(&entries),
        entries,
        version: current.version + 1,
        updated_at: Some(now),
    };
    (next, report)
}

// ---------------------------------------------------------------------------
// Serde helper: struct-keyed map <-> flat list
// ---------------------------------------------------------------------------

/// JSON objects need string keys, so the entry map travels as a list of
/// flat records.
pub mod entry_map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{EntryKey, EntryKind, StoredEntry};
    use crate::types::{Timestamp, UserId};

    #[derive(Serialize, Deserialize)]
    struct FlatEntry {
        kind: EntryKind,
        domain: String,
        key: String,
        value: Option<String>,
        last_modified_at: Timestamp,
        last_modified_by: UserId,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<EntryKey, StoredEntry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let flat: Vec<FlatEntry> = map
            .iter()
            .map(|(k, e)| FlatEntry {
                kind: k.kind,
                domain: k.domain.clone(),
                key: k.key.clone(),
                value: e.value.clone(),
                last_modified_at: e.last_modified_at,
                last_modified_by: e.last_modified_by.clone(),
            })
            .collect();
        flat.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<EntryKey, StoredEntry>, D::Error> {
        let flat = Vec::<FlatEntry>::deserialize(deserializer)?;
        Ok(flat
            .into_iter()
            .map(|f| {
                (
                    EntryKey::new(f.kind, f.domain, f.key),
                    StoredEntry {
                        value: f.value,
                        last_modified_at: f.last_modified_at,
                        last_modified_by: f.last_modified_by,
                    },
                )
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
