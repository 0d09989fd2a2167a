//! Callbacks deferred to a future tick.

use crate::{
    proto::ProtoId,
    world::chunk::TileLayerKind,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use tile_data::WorldCoord;


/// Simulation time, in ticks.
pub type GameTick = u64;


/// A registered deferral. Entities are referenced by coordinate, never
/// owned: the callback is skipped if its entity is gone by the due tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeferralCallback {
    /// Tombstone left by `remove_deferral` so outstanding entry handles
    /// keep indexing correctly.
    Blank,
    Entity {
        proto: ProtoId,
        coord: WorldCoord,
        layer: TileLayerKind,
    },
}

/// A callback that came due.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FiredDeferral {
    pub proto: ProtoId,
    pub coord: WorldCoord,
    pub layer: TileLayerKind,
}

/// Information about a registered deferral, for removing it later.
///
/// `callback_index` is one past the real index; zero marks an invalid
/// entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct DeferralEntry {
    pub due_tick: GameTick,
    callback_index: usize,
}

impl DeferralEntry {
    pub fn valid(&self) -> bool {
        self.callback_index != 0
    }

    pub fn invalidate(&mut self) {
        self.callback_index = 0;
    }
}


/// Wheel of callbacks scheduled for future ticks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeferralTimer {
    callbacks: HashMap<GameTick, Vec<DeferralCallback>>,
    last_tick: GameTick,
}

impl DeferralTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect all callbacks due at exactly `game_tick`, in registration
    /// order, dropping the whole bucket. The caller routes each fired
    /// callback to its prototype's behavior.
    pub fn update(&mut self, game_tick: GameTick) -> Vec<FiredDeferral> {
        self.last_tick = game_tick;

        self.callbacks
            .remove(&game_tick)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|callback| match callback {
                DeferralCallback::Blank => None,
                DeferralCallback::Entity { proto, coord, layer } => {
                    Some(FiredDeferral { proto, coord, layer })
                }
            })
            .collect()
    }

    /// Register a callback to run at the given game tick.
    pub fn register_at_tick(
        &mut self,
        proto: ProtoId,
        coord: WorldCoord,
        layer: TileLayerKind,
        due_game_tick: GameTick,
    ) -> DeferralEntry {
        assert!(due_game_tick > self.last_tick, "deferral scheduled in the past");

        let bucket = self.callbacks.entry(due_game_tick).or_default();
        bucket.push(DeferralCallback::Entity { proto, coord, layer });

        DeferralEntry { due_tick: due_game_tick, callback_index: bucket.len() }
    }

    /// Register a callback to run after the given number of ticks pass.
    pub fn register_from_tick(
        &mut self,
        proto: ProtoId,
        coord: WorldCoord,
        layer: TileLayerKind,
        elapse_game_tick: GameTick,
    ) -> DeferralEntry {
        assert!(elapse_game_tick > 0);
        self.register_at_tick(proto, coord, layer, self.last_tick + elapse_game_tick)
    }

    /// Cancel a registered callback.
    ///
    /// The slot is blanked rather than erased so other handles into the
    /// same bucket stay valid.
    pub fn remove_deferral(&mut self, entry: DeferralEntry) {
        assert!(entry.valid(), "invalid deferral entry");

        let Some(bucket) = self.callbacks.get_mut(&entry.due_tick) else {
            return;
        };

        let index = entry.callback_index - 1;
        assert!(index < bucket.len(), "deferral index out of range");
        bucket[index] = DeferralCallback::Blank;
    }

    /// Cancel a registered callback and invalidate the entry in place.
    pub fn remove_deferral_entry(&mut self, entry: &mut DeferralEntry) {
        if !entry.valid() {
            return;
        }
        self.remove_deferral(*entry);
        entry.invalidate();
    }

    /// Prototype ids of every pending callback, for validation against a
    /// registry after loading.
    pub fn callback_proto_ids(&self) -> impl Iterator<Item = ProtoId> + '_ {
        self.callbacks.values().flatten().filter_map(|callback| match callback {
            DeferralCallback::Blank => None,
            DeferralCallback::Entity { proto, .. } => Some(*proto),
        })
    }

    pub fn pending_count(&self) -> usize {
        self.callbacks.values().map(|bucket| bucket.len()).sum()
    }

    pub fn last_tick(&self) -> GameTick {
        self.last_tick
    }
}
