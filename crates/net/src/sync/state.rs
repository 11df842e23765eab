use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::net::SyncData;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("patch encoding failed: {0}")]
    Encode(rancor::Error),
    #[error("patch decoding failed: {0}")]
    Decode(rancor::Error),
    #[error("patch rejected: {0}")]
    Rejected(String),
}

/// A piece of game state that can be shipped to peers.
pub trait SyncEntity {
    fn sync_id(&self) -> u32;
    fn is_dirty(&self) -> bool;
    /// Complete serialized state of the entity.
    fn encode_state(&self) -> Vec<u8>;
    /// Clears the dirty flag, returning its previous value in the same
    /// atomic step so a write racing the harvest stays pending.
    fn take_dirty(&self) -> bool;
}

/// Authoritative game state owned by the host.
pub trait GameStateSource: Send + Sync {
    fn game_time(&self) -> u32;
    fn visit_entities(&self, visitor: &mut dyn FnMut(&dyn SyncEntity));

    /// Entities deleted since the previous incremental harvest.
    fn take_removed(&self) -> Vec<u32> {
        Vec::new()
    }
}

/// Receiving end of state patches on a client.
pub trait GameStateSink: Send + Sync {
    fn apply_patch(&self, patch: &SyncPatch) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PatchEntry {
    pub id: u32,
    pub state: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SyncPatch {
    pub game_time: u32,
    /// Full patches replace the receiver's entire entity set.
    pub full: bool,
    pub entries: Vec<PatchEntry>,
    pub removed: Vec<u32>,
}

impl SyncPatch {
    pub fn is_empty(&self) -> bool {
        !self.full && self.entries.is_empty() && self.removed.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(SyncError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, SyncError> {
        // Wire blobs carry no alignment guarantee.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(SyncError::Decode)
    }

    pub fn into_sync_data(self) -> Result<SyncData, SyncError> {
        Ok(SyncData {
            game_time: self.game_time,
            patch: self.encode()?,
        })
    }
}

pub struct StateSync;

impl StateSync {
    /// Collects entity state from `source`. Incremental harvests take only
    /// dirty entities and clear them; full harvests take everything and
    /// leave dirty flags alone so the next incremental tick still reaches
    /// every other peer.
    pub fn harvest(source: &dyn GameStateSource, mode: SyncMode) -> SyncPatch {
        let mut entries = Vec::new();

        source.visit_entities(&mut |entity| match mode {
            SyncMode::Full => entries.push(PatchEntry {
                id: entity.sync_id(),
                state: entity.encode_state(),
            }),
            SyncMode::Incremental => {
                if entity.take_dirty() {
                    entries.push(PatchEntry {
                        id: entity.sync_id(),
                        state: entity.encode_state(),
                    });
                }
            }
        });

        let removed = match mode {
            SyncMode::Full => Vec::new(),
            SyncMode::Incremental => source.take_removed(),
        };

        log::trace!(
            target: "serfnet::sync",
            "Harvested {} entities ({:?}), {} removed",
            entries.len(),
            mode,
            removed.len()
        );

        SyncPatch {
            game_time: source.game_time(),
            full: mode == SyncMode::Full,
            entries,
            removed,
        }
    }
}

#[derive(Debug, Default)]
struct MirrorState {
    game_time: u32,
    entities: BTreeMap<u32, Vec<u8>>,
    patches_applied: u64,
}

/// Sink keeping a replica of every entity's last received state.
#[derive(Debug, Default)]
pub struct StateMirror {
    state: Mutex<MirrorState>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game_time(&self) -> u32 {
        self.lock().game_time
    }

    pub fn entity(&self, id: u32) -> Option<Vec<u8>> {
        self.lock().entities.get(&id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn patches_applied(&self) -> u64 {
        self.lock().patches_applied
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameStateSink for StateMirror {
    fn apply_patch(&self, patch: &SyncPatch) -> Result<(), SyncError> {
        let mut state = self.lock();
        if patch.full {
            state.entities.clear();
        }
        for id in &patch.removed {
            state.entities.remove(id);
        }
        for entry in &patch.entries {
            state.entities.insert(entry.id, entry.state.clone());
        }
        state.game_time = patch.game_time;
        state.patches_applied += 1;
        Ok(())
    }
}
