//! Chunks: fixed 32x32 blocks of tile cells plus per-group logic lists.

use crate::proto::{
    ProtoId,
    UniqueData,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    cell::RefCell,
    ops::{
        Index,
        IndexMut,
    },
    rc::Rc,
};
use tile_data::{
    local_tile_index,
    ChunkCoord,
    Orientation,
    WorldCoord,
    CHUNK_AREA,
};
use vek::*;


/// Kind of a layer within a tile cell.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum TileLayerKind {
    Base = 0,
    Resource,
    Entity,
    Overlay,
}

/// Number of layers per tile cell.
pub const TILE_LAYER_COUNT: usize = 4;

/// All layer kinds, in storage order.
pub const TILE_LAYERS: [TileLayerKind; TILE_LAYER_COUNT] = [
    TileLayerKind::Base,
    TileLayerKind::Resource,
    TileLayerKind::Entity,
    TileLayerKind::Overlay,
];

impl TileLayerKind {
    pub fn from_u8(n: u8) -> Option<Self> {
        TILE_LAYERS.get(n as usize).copied()
    }
}


/// One layer of one tile cell.
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub proto: Option<ProtoId>,
    pub orientation: Orientation,
    /// Index of this cell within its multi-tile region, row-major over the
    /// region, 0 at the top-left.
    pub multi_index: u16,
    /// Footprint of the region this cell belongs to.
    pub span: Extent2<u8>,
    /// Offset from this cell to the region's top-left cell. `None` on the
    /// top-left itself and on single-tile layers. Derived data: rebuilt
    /// after deserialization rather than persisted.
    pub top_left: Option<Vec2<i16>>,
    /// Per-instance state; only the region's top-left cell owns one.
    pub unique: Option<Rc<RefCell<UniqueData>>>,
}

impl Default for TileLayer {
    fn default() -> Self {
        TileLayer {
            proto: None,
            orientation: Orientation::Up,
            multi_index: 0,
            span: Extent2::new(1, 1),
            top_left: None,
            unique: None,
        }
    }
}

impl TileLayer {
    pub fn is_multi_tile(&self) -> bool {
        self.span.w > 1 || self.span.h > 1
    }

    pub fn is_top_left(&self) -> bool {
        self.top_left.is_none()
    }

    pub fn clear(&mut self) {
        *self = TileLayer::default();
    }
}


/// A tile cell: a fixed tuple of layers.
#[derive(Debug, Clone, Default)]
pub struct ChunkTile {
    layers: [TileLayer; TILE_LAYER_COUNT],
}

impl ChunkTile {
    pub fn layer(&self, kind: TileLayerKind) -> &TileLayer {
        &self.layers[kind as usize]
    }

    pub fn layer_mut(&mut self, kind: TileLayerKind) -> &mut TileLayer {
        &mut self.layers[kind as usize]
    }
}


/// Sets of entities within a chunk which receive per-tick logic updates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogicGroup {
    Conveyor = 0,
    Splitter,
    Inserter,
}

pub const LOGIC_GROUP_COUNT: usize = 3;

pub const LOGIC_GROUPS: [LogicGroup; LOGIC_GROUP_COUNT] = [
    LogicGroup::Conveyor,
    LogicGroup::Splitter,
    LogicGroup::Inserter,
];

impl LogicGroup {
    pub fn from_u8(n: u8) -> Option<Self> {
        LOGIC_GROUPS.get(n as usize).copied()
    }
}

/// A registered logic participant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LogicEntry {
    pub coord: WorldCoord,
    pub layer: TileLayerKind,
}

/// Per-`LogicGroup` storage.
#[derive(Debug, Clone, Default)]
pub struct PerLogicGroup<T>(pub [T; LOGIC_GROUP_COUNT]);

impl<T> Index<LogicGroup> for PerLogicGroup<T> {
    type Output = T;

    fn index(&self, i: LogicGroup) -> &T {
        &self.0[i as usize]
    }
}

impl<T> IndexMut<LogicGroup> for PerLogicGroup<T> {
    fn index_mut(&mut self, i: LogicGroup) -> &mut T {
        &mut self.0[i as usize]
    }
}


/// A 32x32 block of tile cells. Allocated lazily; an absent chunk means
/// "ungenerated", which is distinct from an empty chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    cc: ChunkCoord,
    tiles: Box<[ChunkTile]>,
    logic: PerLogicGroup<Vec<LogicEntry>>,
}

impl Chunk {
    pub fn new(cc: ChunkCoord) -> Self {
        Chunk {
            cc,
            tiles: vec![ChunkTile::default(); CHUNK_AREA].into_boxed_slice(),
            logic: PerLogicGroup::default(),
        }
    }

    pub fn cc(&self) -> ChunkCoord {
        self.cc
    }

    /// Tile by chunk-local coordinate.
    pub fn tile(&self, local: Vec2<i32>) -> &ChunkTile {
        &self.tiles[local_tile_index(local)]
    }

    pub fn tile_mut(&mut self, local: Vec2<i32>) -> &mut ChunkTile {
        &mut self.tiles[local_tile_index(local)]
    }

    /// Iterate all tiles with their chunk-local coordinates.
    pub fn iter_tiles(&self) -> impl Iterator<Item = (Vec2<i32>, &ChunkTile)> {
        self.tiles.iter().enumerate().map(|(i, tile)| {
            let i = i as i32;
            (
                Vec2::new(i % tile_data::CHUNK_WIDTH, i / tile_data::CHUNK_WIDTH),
                tile,
            )
        })
    }

    pub fn logic_entries(&self, group: LogicGroup) -> &[LogicEntry] {
        &self.logic[group]
    }

    pub fn logic_register(&mut self, group: LogicGroup, entry: LogicEntry) {
        self.logic[group].push(entry);
    }

    /// Remove every entry of the group matching the predicate.
    pub fn logic_remove_if(
        &mut self,
        group: LogicGroup,
        mut pred: impl FnMut(&LogicEntry) -> bool,
    ) {
        self.logic[group].retain(|entry| !pred(entry));
    }

    pub fn has_logic_entries(&self) -> bool {
        self.logic.0.iter().any(|entries| !entries.is_empty())
    }
}
