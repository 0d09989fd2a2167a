//! All data for one world: chunk storage, multi-tile region resolution,
//! logic groups, and the update dispatcher.

pub mod chunk;
pub mod update_dispatcher;

use crate::{
    entity,
    proto::{
        ProtoId,
        ProtoKind,
        ProtoRegistry,
        UniqueData,
    },
    world::{
        chunk::{
            Chunk,
            ChunkTile,
            LogicEntry,
            LogicGroup,
            TileLayer,
            TileLayerKind,
        },
        update_dispatcher::{
            UpdateDispatcher,
            UpdateKind,
        },
    },
};
use slab::Slab;
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};
use thiserror::Error;
use tile_data::{
    chunk_to_world,
    world_to_chunk,
    world_to_local,
    ChunkCoord,
    Orientation,
    WorldCoord,
    CHUNK_WIDTH,
};
use vek::*;


#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum EmplaceError {
    #[error("a chunk already exists at that coordinate")]
    AlreadyExists,
}

/// Why `World::place` refused to build.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum PlaceError {
    #[error("the base tile cannot be built over")]
    BlockedByTile,
    #[error("another entity occupies the region")]
    BlockedByEntity,
}


/// Stores all data for a world.
///
/// Chunks live in a slab, with a hashmap from chunk coordinate to slab
/// index; indices may be reused after a chunk is deleted.
#[derive(Debug, Default)]
pub struct World {
    pub update_dispatcher: UpdateDispatcher,
    chunk_index: HashMap<ChunkCoord, u32>,
    chunks: Slab<Chunk>,
    /// Chunks with at least one logic registration.
    logic_chunks: Vec<ChunkCoord>,
    gen_seed: i32,
}

impl World {
    pub fn new() -> Self {
        World { gen_seed: 1001, ..Default::default() }
    }

    // Chunk access

    /// Create a chunk.
    pub fn emplace_chunk(&mut self, cc: ChunkCoord) -> Result<&mut Chunk, EmplaceError> {
        if self.chunk_index.contains_key(&cc) {
            return Err(EmplaceError::AlreadyExists);
        }
        let idx = self.chunks.insert(Chunk::new(cc));
        self.chunk_index.insert(cc, idx as u32);
        trace!(cc = ?cc, "emplaced chunk");
        Ok(&mut self.chunks[idx])
    }

    pub fn delete_chunk(&mut self, cc: ChunkCoord) {
        if let Some(idx) = self.chunk_index.remove(&cc) {
            self.chunks.remove(idx as usize);
            self.logic_chunks.retain(|&c| c != cc);
        }
    }

    /// Chunk by chunk coordinate; `None` if ungenerated.
    pub fn get_chunk(&self, cc: ChunkCoord) -> Option<&Chunk> {
        self.chunk_index.get(&cc).map(|&idx| &self.chunks[idx as usize])
    }

    pub fn get_chunk_mut(&mut self, cc: ChunkCoord) -> Option<&mut Chunk> {
        let idx = *self.chunk_index.get(&cc)?;
        Some(&mut self.chunks[idx as usize])
    }

    /// Chunk containing a world coordinate.
    pub fn get_chunk_at(&self, coord: WorldCoord) -> Option<&Chunk> {
        self.get_chunk(world_to_chunk(coord))
    }

    /// All generated chunk coordinates, sorted for deterministic walks.
    pub fn chunk_coords_sorted(&self) -> Vec<ChunkCoord> {
        let mut ccs: Vec<ChunkCoord> = self.chunk_index.keys().copied().collect();
        ccs.sort_by_key(|cc| (cc.y, cc.x));
        ccs
    }

    // Tile access

    /// Tile by world coordinate; `None` if its chunk is ungenerated.
    pub fn get_tile(&self, coord: WorldCoord) -> Option<&ChunkTile> {
        self.get_chunk_at(coord).map(|chunk| chunk.tile(world_to_local(coord)))
    }

    pub fn get_tile_mut(&mut self, coord: WorldCoord) -> Option<&mut ChunkTile> {
        self.get_chunk_mut(world_to_chunk(coord))
            .map(|chunk| chunk.tile_mut(world_to_local(coord)))
    }

    pub fn layer(&self, coord: WorldCoord, kind: TileLayerKind) -> Option<&TileLayer> {
        self.get_tile(coord).map(|tile| tile.layer(kind))
    }

    pub fn layer_mut(&mut self, coord: WorldCoord, kind: TileLayerKind) -> Option<&mut TileLayer> {
        self.get_tile_mut(coord).map(|tile| tile.layer_mut(kind))
    }

    /// Resolve the top-left layer of the multi-tile region covering a
    /// coordinate (itself for single-tile layers).
    pub fn layer_top_left(
        &self,
        coord: WorldCoord,
        kind: TileLayerKind,
    ) -> Option<(WorldCoord, &TileLayer)> {
        let layer = self.layer(coord, kind)?;
        match layer.top_left {
            None => Some((coord, layer)),
            Some(offset) => {
                let tl = coord + Vec2::new(offset.x as i32, offset.y as i32);
                self.layer(tl, kind).map(|layer| (tl, layer))
            }
        }
    }

    /// Unique data of the entity covering a coordinate.
    pub fn get_unique(
        &self,
        coord: WorldCoord,
        kind: TileLayerKind,
    ) -> Option<Rc<RefCell<UniqueData>>> {
        self.layer_top_left(coord, kind)
            .and_then(|(_, layer)| layer.unique.clone())
    }

    /// Set a single layer's prototype without region bookkeeping. World
    /// generation writes terrain this way; entities go through `place`.
    pub fn set_prototype(
        &mut self,
        coord: WorldCoord,
        kind: TileLayerKind,
        orientation: Orientation,
        proto: Option<ProtoId>,
    ) {
        if let Some(layer) = self.layer_mut(coord, kind) {
            layer.proto = proto;
            layer.orientation = orientation;
        }
    }

    // Entity placement

    /// Write (or, with `None`, erase) an entity-layer region.
    ///
    /// Placement verifies every covered tile is buildable first, so a
    /// failure leaves the world unchanged. Erasing clears every cell
    /// sharing the target's top-left.
    pub fn place(
        &mut self,
        protos: &ProtoRegistry,
        coord: WorldCoord,
        orientation: Orientation,
        proto: Option<ProtoId>,
    ) -> Result<(), PlaceError> {
        match proto {
            Some(id) => self.place_entity(protos, coord, orientation, id),
            None => {
                self.remove_entity(coord);
                Ok(())
            }
        }
    }

    fn place_entity(
        &mut self,
        protos: &ProtoRegistry,
        coord: WorldCoord,
        orientation: Orientation,
        id: ProtoId,
    ) -> Result<(), PlaceError> {
        let span = protos.get(id).rotated_span(orientation);

        for dy in 0..span.h as i32 {
            for dx in 0..span.w as i32 {
                let c = coord + Vec2::new(dx, dy);
                let tile = self.get_tile(c).ok_or(PlaceError::BlockedByTile)?;

                let passable = tile
                    .layer(TileLayerKind::Base)
                    .proto
                    .map(|p| matches!(protos.get(p).kind, ProtoKind::Terrain { passable: true }))
                    .unwrap_or(false);
                if !passable {
                    return Err(PlaceError::BlockedByTile);
                }
                if tile.layer(TileLayerKind::Entity).proto.is_some() {
                    return Err(PlaceError::BlockedByEntity);
                }
            }
        }

        let mut multi_index = 0u16;
        for dy in 0..span.h as i32 {
            for dx in 0..span.w as i32 {
                let c = coord + Vec2::new(dx, dy);
                let layer = self
                    .layer_mut(c, TileLayerKind::Entity)
                    .expect("validated tile vanished");
                layer.proto = Some(id);
                layer.orientation = orientation;
                layer.multi_index = multi_index;
                layer.span = span;
                layer.top_left = if multi_index == 0 {
                    None
                } else {
                    Some(Vec2::new(-(dx as i16), -(dy as i16)))
                };
                layer.unique = None;
                multi_index += 1;
            }
        }
        Ok(())
    }

    fn remove_entity(&mut self, coord: WorldCoord) {
        let Some((tl, layer)) = self.layer_top_left(coord, TileLayerKind::Entity) else {
            return;
        };
        if layer.proto.is_none() {
            return;
        }
        let span = layer.span;

        for dy in 0..span.h as i32 {
            for dx in 0..span.w as i32 {
                if let Some(layer) = self.layer_mut(tl + Vec2::new(dx, dy), TileLayerKind::Entity)
                {
                    layer.clear();
                }
            }
        }
    }

    // Logic groups

    /// Add a layer at a coordinate to be considered for logic updates.
    pub fn logic_register(&mut self, group: LogicGroup, coord: WorldCoord, layer: TileLayerKind) {
        let cc = world_to_chunk(coord);
        if !self.logic_chunks.contains(&cc) {
            self.logic_chunks.push(cc);
        }
        let chunk = self.get_chunk_mut(cc).expect("logic_register on ungenerated chunk");
        chunk.logic_register(group, LogicEntry { coord, layer });
        trace!(?group, ?coord, "logic registered");
    }

    /// Remove a previously registered layer.
    pub fn logic_remove(&mut self, group: LogicGroup, coord: WorldCoord, layer: TileLayerKind) {
        let cc = world_to_chunk(coord);
        let mut chunk_empty = false;
        if let Some(chunk) = self.get_chunk_mut(cc) {
            chunk.logic_remove_if(group, |e| e.coord == coord && e.layer == layer);
            chunk_empty = !chunk.has_logic_entries();
        }
        if chunk_empty {
            self.logic_chunks.retain(|&c| c != cc);
        }
    }

    /// Remove one specific entry, wherever its chunk is.
    pub fn logic_remove_entry(&mut self, group: LogicGroup, entry: LogicEntry) {
        self.logic_remove(group, entry.coord, entry.layer);
    }

    /// Chunks holding logic registrations.
    pub fn logic_chunks(&self) -> &[ChunkCoord] {
        &self.logic_chunks
    }

    /// Snapshot of every registered entry of a group, across all logic
    /// chunks. A snapshot so callers may mutate the world while walking.
    pub fn logic_entries(&self, group: LogicGroup) -> Vec<LogicEntry> {
        let mut entries = Vec::new();
        for &cc in &self.logic_chunks {
            if let Some(chunk) = self.get_chunk(cc) {
                entries.extend_from_slice(chunk.logic_entries(group));
            }
        }
        entries
    }

    // Update dispatching

    /// Invoke every listener registered against `coord`.
    pub fn update_dispatch(
        &mut self,
        protos: &ProtoRegistry,
        coord: WorldCoord,
        kind: UpdateKind,
    ) {
        for pending in self.update_dispatcher.pending(coord, kind) {
            entity::on_tile_update(self, protos, pending);
        }
    }

    // World generation

    pub fn generator_seed(&self) -> i32 {
        self.gen_seed
    }

    pub fn set_generator_seed(&mut self, seed: i32) {
        self.gen_seed = seed;
    }

    // Deserialization

    /// To be used after loading a world.
    ///
    /// Rebuilds the top-left back-link of every multi-tile layer (derived
    /// from the persisted multi-tile indices), then fires per-tile
    /// deserialize hooks. Back-links resolve first so hooks observe a
    /// fully linked world.
    pub fn deserialize_post_process(&mut self, protos: &ProtoRegistry) {
        let ccs = self.chunk_coords_sorted();

        for &cc in &ccs {
            let chunk = self.get_chunk_mut(cc).expect("chunk listed but missing");
            for y in 0..CHUNK_WIDTH {
                for x in 0..CHUNK_WIDTH {
                    let tile = chunk.tile_mut(Vec2::new(x, y));
                    for kind in chunk::TILE_LAYERS {
                        let layer = tile.layer_mut(kind);
                        if layer.proto.is_none() || !layer.is_multi_tile() {
                            continue;
                        }
                        layer.top_left = if layer.multi_index == 0 {
                            None
                        } else {
                            let w = layer.span.w as u16;
                            Some(Vec2::new(
                                -((layer.multi_index % w) as i16),
                                -((layer.multi_index / w) as i16),
                            ))
                        };
                    }
                }
            }
        }

        let mut entity_coords = Vec::new();
        for &cc in &ccs {
            let chunk = self.get_chunk(cc).expect("chunk listed but missing");
            for (local, tile) in chunk.iter_tiles() {
                let layer = tile.layer(TileLayerKind::Entity);
                if layer.proto.is_some() && layer.is_top_left() {
                    entity_coords.push(chunk_to_world(cc) + local);
                }
            }
        }

        for coord in entity_coords {
            entity::on_deserialize(self, protos, coord);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TestCtx;

    #[test]
    fn test_emplace_chunk_duplicate() {
        let mut world = World::new();
        assert!(world.emplace_chunk(Vec2::new(0, 0)).is_ok());
        assert_eq!(
            world.emplace_chunk(Vec2::new(0, 0)).err(),
            Some(EmplaceError::AlreadyExists),
        );
    }

    #[test]
    fn test_get_tile_ungenerated_chunk() {
        let mut world = World::new();
        world.emplace_chunk(Vec2::new(0, 0)).unwrap();

        assert!(world.get_tile(Vec2::new(0, 0)).is_some());
        assert!(world.get_tile(Vec2::new(31, 31)).is_some());
        // Not an error, simply nothing there
        assert!(world.get_tile(Vec2::new(32, 0)).is_none());
        assert!(world.get_tile(Vec2::new(-1, 0)).is_none());
    }

    #[test]
    fn test_place_1x1() {
        let mut ctx = TestCtx::new();
        let chest = ctx.chest;

        ctx.world
            .place(&ctx.protos, Vec2::new(0, 0), Orientation::Up, Some(chest))
            .unwrap();

        let layer = ctx.world.layer(Vec2::new(0, 0), TileLayerKind::Entity).unwrap();
        assert_eq!(layer.proto, Some(chest));
        assert!(!layer.is_multi_tile());
    }

    #[test]
    fn test_place_blocked_by_water() {
        let mut ctx = TestCtx::new();
        let chest = ctx.chest;
        ctx.world
            .set_prototype(Vec2::new(1, 0), TileLayerKind::Base, Orientation::Up, Some(ctx.water));

        assert_eq!(
            ctx.world.place(&ctx.protos, Vec2::new(1, 0), Orientation::Up, Some(chest)),
            Err(PlaceError::BlockedByTile),
        );
        assert_eq!(
            ctx.world.layer(Vec2::new(1, 0), TileLayerKind::Entity).unwrap().proto,
            None,
        );
    }

    #[test]
    fn test_place_blocked_by_entity() {
        let mut ctx = TestCtx::new();
        let chest = ctx.chest;

        ctx.world
            .place(&ctx.protos, Vec2::new(0, 0), Orientation::Up, Some(chest))
            .unwrap();
        assert_eq!(
            ctx.world.place(&ctx.protos, Vec2::new(0, 0), Orientation::Up, Some(chest)),
            Err(PlaceError::BlockedByEntity),
        );
    }

    #[test]
    fn test_place_multi_tile_region() {
        let mut ctx = TestCtx::new();
        let machine = ctx.machine; // 3 x 2

        ctx.world
            .place(&ctx.protos, Vec2::new(4, 4), Orientation::Up, Some(machine))
            .unwrap();

        // Exactly one cell (the top-left) has no back-link; the others
        // point at it and multi-tile indices increase row-major
        let mut index = 0;
        for dy in 0..2 {
            for dx in 0..3 {
                let coord = Vec2::new(4 + dx, 4 + dy);
                let layer = ctx.world.layer(coord, TileLayerKind::Entity).unwrap();
                assert_eq!(layer.proto, Some(machine));
                assert_eq!(layer.multi_index, index);
                if index == 0 {
                    assert!(layer.is_top_left());
                } else {
                    assert_eq!(
                        layer.top_left,
                        Some(Vec2::new(-(dx as i16), -(dy as i16))),
                    );
                }
                let (tl, _) = ctx.world.layer_top_left(coord, TileLayerKind::Entity).unwrap();
                assert_eq!(tl, Vec2::new(4, 4));
                index += 1;
            }
        }

        // Overlap with any covered tile is refused
        assert_eq!(
            ctx.world.place(&ctx.protos, Vec2::new(6, 5), Orientation::Up, Some(ctx.chest)),
            Err(PlaceError::BlockedByEntity),
        );
    }

    #[test]
    fn test_place_multi_tile_partially_blocked_leaves_world_unchanged() {
        let mut ctx = TestCtx::new();
        let machine = ctx.machine;
        ctx.world
            .set_prototype(Vec2::new(6, 5), TileLayerKind::Base, Orientation::Up, Some(ctx.water));

        assert_eq!(
            ctx.world.place(&ctx.protos, Vec2::new(4, 4), Orientation::Up, Some(machine)),
            Err(PlaceError::BlockedByTile),
        );
        for dy in 0..2 {
            for dx in 0..3 {
                let layer =
                    ctx.world.layer(Vec2::new(4 + dx, 4 + dy), TileLayerKind::Entity).unwrap();
                assert_eq!(layer.proto, None);
            }
        }
    }

    #[test]
    fn test_remove_multi_tile_region_from_any_cell() {
        let mut ctx = TestCtx::new();
        let machine = ctx.machine;

        ctx.world
            .place(&ctx.protos, Vec2::new(4, 4), Orientation::Up, Some(machine))
            .unwrap();
        // Remove by a non-top-left cell
        ctx.world.place(&ctx.protos, Vec2::new(6, 5), Orientation::Up, None).unwrap();

        for dy in 0..2 {
            for dx in 0..3 {
                let layer =
                    ctx.world.layer(Vec2::new(4 + dx, 4 + dy), TileLayerKind::Entity).unwrap();
                assert_eq!(layer.proto, None);
                assert!(layer.top_left.is_none());
            }
        }
    }

    #[test]
    fn test_rotated_span() {
        let mut ctx = TestCtx::new();
        let machine = ctx.machine; // 3 x 2

        ctx.world
            .place(&ctx.protos, Vec2::new(10, 10), Orientation::Right, Some(machine))
            .unwrap();

        // 2 wide, 3 tall when rotated
        assert!(ctx.world.layer(Vec2::new(11, 12), TileLayerKind::Entity).unwrap().proto.is_some());
        assert!(ctx.world.layer(Vec2::new(12, 10), TileLayerKind::Entity).unwrap().proto.is_none());
    }

    #[test]
    fn test_logic_register_remove() {
        let mut ctx = TestCtx::new();
        let coord = Vec2::new(3, 3);

        ctx.world.logic_register(LogicGroup::Conveyor, coord, TileLayerKind::Entity);
        assert_eq!(ctx.world.logic_entries(LogicGroup::Conveyor).len(), 1);
        assert_eq!(ctx.world.logic_chunks().len(), 1);

        ctx.world.logic_remove(LogicGroup::Conveyor, coord, TileLayerKind::Entity);
        assert!(ctx.world.logic_entries(LogicGroup::Conveyor).is_empty());
        assert!(ctx.world.logic_chunks().is_empty());
    }
}
