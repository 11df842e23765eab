mod dirty;
mod state;

pub use dirty::{DirtyMap, WritePolicy};
pub use state::{
    GameStateSink, GameStateSource, PatchEntry, StateMirror, StateSync, SyncEntity, SyncError,
    SyncMode, SyncPatch,
};
