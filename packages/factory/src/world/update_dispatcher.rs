//! Coordinate-keyed update callbacks: an entity at one coordinate changes,
//! listeners registered against that coordinate wake.

use crate::proto::ProtoId;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use tile_data::WorldCoord;


/// What happened at the emitting coordinate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum UpdateKind {
    Place,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionElement {
    receiver: WorldCoord,
    listener: ProtoId,
    id: u64,
}

/// Handle to one registration. Identical registrations may coexist; each
/// carries its own id and must be unregistered separately.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ListenerEntry {
    /// Coordinate the listener watches.
    pub emitter: WorldCoord,
    /// Coordinate of the listening entity.
    pub receiver: WorldCoord,
    id: u64,
}

/// A listener due to be invoked for a dispatch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PendingUpdate {
    pub listener: ProtoId,
    pub emitter: WorldCoord,
    pub receiver: WorldCoord,
    pub kind: UpdateKind,
}


/// Emitting tile -> list of (receiving tile, callback prototype).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDispatcher {
    container: HashMap<(i32, i32), Vec<CollectionElement>>,
    next_id: u64,
}

impl UpdateDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` (an entity at `current_coord`) to be told when
    /// the tile at `target_coord` changes.
    pub fn register(
        &mut self,
        current_coord: WorldCoord,
        target_coord: WorldCoord,
        listener: ProtoId,
    ) -> ListenerEntry {
        let id = self.next_id;
        self.next_id += 1;

        self.container
            .entry((target_coord.x, target_coord.y))
            .or_default()
            .push(CollectionElement { receiver: current_coord, listener, id });

        ListenerEntry { emitter: target_coord, receiver: current_coord, id }
    }

    /// Unregister a previously returned entry.
    ///
    /// Returns false if the entry was already gone.
    pub fn unregister(&mut self, entry: &ListenerEntry) -> bool {
        let key = (entry.emitter.x, entry.emitter.y);
        let Some(collection) = self.container.get_mut(&key) else {
            return false;
        };

        let Some(i) = collection.iter().position(|e| e.id == entry.id) else {
            return false;
        };
        collection.remove(i);

        if collection.is_empty() {
            self.container.remove(&key);
        }
        true
    }

    /// Snapshot the listeners watching `coord`. The caller routes each to
    /// its prototype's tile-update behavior; taking a snapshot keeps the
    /// dispatcher reentrant under listeners that edit the world.
    pub fn pending(&self, coord: WorldCoord, kind: UpdateKind) -> Vec<PendingUpdate> {
        self.container
            .get(&(coord.x, coord.y))
            .map(|collection| {
                collection
                    .iter()
                    .map(|e| PendingUpdate {
                        listener: e.listener,
                        emitter: coord,
                        receiver: e.receiver,
                        kind,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Listener prototype ids of every registration, for validation
    /// against a registry after loading.
    pub fn listener_ids(&self) -> impl Iterator<Item = ProtoId> + '_ {
        self.container.values().flatten().map(|e| e.listener)
    }

    /// Total registration count, across all emitters.
    pub fn len(&self) -> usize {
        self.container.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }
}
