//! Whole-world persistence.
//!
//! The archive is a portable binary encoding of everything observable:
//! the generator seed, every non-empty tile layer, logic-group lists, the
//! update dispatcher, the deferral timer, and a deduplicated segment
//! table. Shared segment handles become indices into that table;
//! prototype and item references become their internal ids, resolved back
//! through the registries on load. Segment targets and multi-tile
//! back-links are identity references and are rebuilt by the
//! deserialization post-pass instead of being written out.

use crate::{
    decimal::LineDist,
    logic::{
        conveyor_prop::LineOrientation,
        conveyor_struct::{
            ConveyorData,
            ConveyorItem,
            ConveyorLane,
            ConveyorSegment,
            SegmentRef,
            SplitterData,
            Termination,
        },
        deferral_timer::DeferralTimer,
        Logic,
    },
    proto::{
        ItemId,
        ItemRegistry,
        ProtoId,
        ProtoRegistry,
        UniqueData,
    },
    world::{
        chunk::{
            LogicEntry,
            LogicGroup,
            TileLayerKind,
            LOGIC_GROUPS,
            TILE_LAYERS,
        },
        update_dispatcher::UpdateDispatcher,
        World,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    collections::VecDeque,
    rc::Rc,
};
use thiserror::Error;
use tile_data::{
    chunk_to_world,
    local_tile_index,
    Orientation,
    CHUNK_WIDTH,
};
use vek::*;


#[derive(Debug, Error)]
pub enum SaveError {
    #[error("encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("decoding failed: {0}")]
    Decode(#[from] bincode::Error),
    #[error("unknown {kind} id {id} in archive")]
    IdUnknown { kind: &'static str, id: u32 },
    #[error("malformed archive: {0}")]
    Malformed(&'static str),
}


#[derive(Serialize, Deserialize)]
struct SavedWorld {
    seed: i32,
    segments: Vec<SavedSegment>,
    chunks: Vec<SavedChunk>,
    dispatcher: UpdateDispatcher,
    game_tick: u64,
    timer: DeferralTimer,
}

#[derive(Serialize, Deserialize)]
struct SavedSegment {
    direction: u8,
    termination: Termination,
    length: u16,
    left: SavedLane,
    right: SavedLane,
    head_offset: i32,
    target_insert_offset: i32,
}

#[derive(Serialize, Deserialize)]
struct SavedLane {
    items: Vec<(i64, u32)>,
    index: u64,
    back_item_distance: i64,
    visible: bool,
}

#[derive(Serialize, Deserialize)]
struct SavedChunk {
    cc: (i32, i32),
    cells: Vec<SavedCell>,
    logic: Vec<(LogicGroup, LogicEntry)>,
}

#[derive(Serialize, Deserialize)]
struct SavedCell {
    tile_index: u16,
    layer: TileLayerKind,
    proto: u32,
    orientation: u8,
    multi_index: u16,
    span: (u8, u8),
    unique: Option<SavedUnique>,
}

#[derive(Serialize, Deserialize)]
enum SavedUnique {
    Conveyor(SavedConveyor),
    Splitter {
        left: SavedConveyor,
        right: SavedConveyor,
        orientation: u8,
        swap: bool,
    },
}

#[derive(Serialize, Deserialize)]
struct SavedConveyor {
    segment: u32,
    struct_index: u16,
    line_orientation: LineOrientation,
}


/// Interns shared segment handles by pointer identity.
#[derive(Default)]
struct SegmentTable {
    indices: HashMap<*const RefCell<ConveyorSegment>, u32>,
    saved: Vec<SavedSegment>,
}

impl SegmentTable {
    fn intern(&mut self, structure: &SegmentRef) -> u32 {
        let ptr = Rc::as_ptr(structure);
        if let Some(&index) = self.indices.get(&ptr) {
            return index;
        }
        let index = self.saved.len() as u32;
        self.indices.insert(ptr, index);
        self.saved.push(save_segment(&structure.borrow()));
        index
    }
}

fn save_segment(segment: &ConveyorSegment) -> SavedSegment {
    SavedSegment {
        direction: segment.direction as u8,
        termination: segment.termination,
        length: segment.length,
        left: save_lane(&segment.left),
        right: save_lane(&segment.right),
        head_offset: segment.head_offset,
        target_insert_offset: segment.target_insert_offset,
    }
}

fn save_lane(lane: &ConveyorLane) -> SavedLane {
    SavedLane {
        items: lane.items.iter().map(|i| (i.dist.raw(), i.item.0)).collect(),
        index: lane.index as u64,
        back_item_distance: lane.back_item_distance.raw(),
        visible: lane.visible,
    }
}

fn save_conveyor_data(table: &mut SegmentTable, data: &ConveyorData) -> SavedConveyor {
    SavedConveyor {
        segment: table.intern(&data.structure),
        struct_index: data.struct_index,
        line_orientation: data.line_orientation,
    }
}


/// Serialize one world and its logic state.
pub fn save_world(world: &World, logic: &Logic) -> Result<Vec<u8>, SaveError> {
    let mut table = SegmentTable::default();
    let mut chunks = Vec::new();

    for cc in world.chunk_coords_sorted() {
        let chunk = world.get_chunk(cc).expect("chunk listed but missing");

        let mut cells = Vec::new();
        for (local, tile) in chunk.iter_tiles() {
            for kind in TILE_LAYERS {
                let layer = tile.layer(kind);
                let Some(proto) = layer.proto else {
                    continue;
                };

                let unique = layer.unique.as_ref().map(|cell| match &*cell.borrow() {
                    UniqueData::Conveyor(data) => {
                        SavedUnique::Conveyor(save_conveyor_data(&mut table, data))
                    }
                    UniqueData::Splitter(data) => SavedUnique::Splitter {
                        left: save_conveyor_data(&mut table, &data.left),
                        right: save_conveyor_data(&mut table, &data.right),
                        orientation: data.orientation as u8,
                        swap: data.swap,
                    },
                });

                cells.push(SavedCell {
                    tile_index: local_tile_index(local) as u16,
                    layer: kind,
                    proto: proto.0,
                    orientation: layer.orientation as u8,
                    multi_index: layer.multi_index,
                    span: (layer.span.w, layer.span.h),
                    unique,
                });
            }
        }

        let mut logic_entries = Vec::new();
        for group in LOGIC_GROUPS {
            for entry in chunk.logic_entries(group) {
                logic_entries.push((group, *entry));
            }
        }

        chunks.push(SavedChunk { cc: (cc.x, cc.y), cells, logic: logic_entries });
    }

    let saved = SavedWorld {
        seed: world.generator_seed(),
        segments: table.saved,
        chunks,
        dispatcher: world.update_dispatcher.clone(),
        game_tick: logic.game_tick(),
        timer: logic.deferral_timer.clone(),
    };

    Ok(bincode::serialize(&saved)?)
}


fn load_orientation(n: u8) -> Result<Orientation, LoadError> {
    Orientation::from_u8(n).ok_or(LoadError::Malformed("orientation out of range"))
}

fn load_lane(saved: &SavedLane, items: &ItemRegistry) -> Result<ConveyorLane, LoadError> {
    let mut lane_items = VecDeque::with_capacity(saved.items.len());
    for &(dist, item) in &saved.items {
        let item = ItemId(item);
        if !items.contains(item) {
            return Err(LoadError::IdUnknown { kind: "item", id: item.0 });
        }
        lane_items.push_back(ConveyorItem { dist: LineDist::from_raw(dist), item });
    }

    Ok(ConveyorLane {
        items: lane_items,
        index: saved.index as usize,
        back_item_distance: LineDist::from_raw(saved.back_item_distance),
        visible: saved.visible,
    })
}

fn load_conveyor_data(
    saved: &SavedConveyor,
    segments: &[SegmentRef],
) -> Result<ConveyorData, LoadError> {
    let structure = segments
        .get(saved.segment as usize)
        .ok_or(LoadError::Malformed("segment index out of range"))?
        .clone();
    Ok(ConveyorData {
        structure,
        struct_index: saved.struct_index,
        line_orientation: saved.line_orientation,
    })
}

fn check_proto(protos: &ProtoRegistry, id: u32) -> Result<ProtoId, LoadError> {
    let id = ProtoId(id);
    if protos.try_get(id).is_none() {
        return Err(LoadError::IdUnknown { kind: "prototype", id: id.0 });
    }
    Ok(id)
}

/// Deserialize a world and its logic state.
///
/// The load is atomic: any unknown id or malformed field aborts and no
/// partial world escapes. Afterwards multi-tile back-links are rebuilt
/// and conveyor targets re-linked.
pub fn load_world(
    bytes: &[u8],
    protos: &ProtoRegistry,
    items: &ItemRegistry,
) -> Result<(World, Logic), LoadError> {
    let saved: SavedWorld = bincode::deserialize(bytes)?;

    let segments: Vec<SegmentRef> = saved
        .segments
        .iter()
        .map(|s| {
            let mut segment = ConveyorSegment::new(
                load_orientation(s.direction)?,
                s.termination,
                s.length,
            );
            segment.left = load_lane(&s.left, items)?;
            segment.right = load_lane(&s.right, items)?;
            segment.head_offset = s.head_offset;
            segment.target_insert_offset = s.target_insert_offset;
            Ok(Rc::new(RefCell::new(segment)))
        })
        .collect::<Result<_, LoadError>>()?;

    for id in saved.dispatcher.listener_ids() {
        check_proto(protos, id.0)?;
    }
    for id in saved.timer.callback_proto_ids() {
        check_proto(protos, id.0)?;
    }

    let mut world = World::new();
    world.set_generator_seed(saved.seed);
    world.update_dispatcher = saved.dispatcher;

    for saved_chunk in &saved.chunks {
        let cc = Vec2::new(saved_chunk.cc.0, saved_chunk.cc.1);
        world
            .emplace_chunk(cc)
            .map_err(|_| LoadError::Malformed("duplicate chunk in archive"))?;

        for cell in &saved_chunk.cells {
            if cell.tile_index as usize >= tile_data::CHUNK_AREA {
                return Err(LoadError::Malformed("tile index out of range"));
            }
            let local = Vec2::new(
                cell.tile_index as i32 % CHUNK_WIDTH,
                cell.tile_index as i32 / CHUNK_WIDTH,
            );
            let coord = chunk_to_world(cc) + local;

            let proto = check_proto(protos, cell.proto)?;
            let orientation = load_orientation(cell.orientation)?;

            let unique = match &cell.unique {
                None => None,
                Some(SavedUnique::Conveyor(saved_con)) => {
                    Some(UniqueData::Conveyor(load_conveyor_data(saved_con, &segments)?))
                }
                Some(SavedUnique::Splitter { left, right, orientation, swap }) => {
                    Some(UniqueData::Splitter(SplitterData {
                        left: load_conveyor_data(left, &segments)?,
                        right: load_conveyor_data(right, &segments)?,
                        orientation: load_orientation(*orientation)?,
                        swap: *swap,
                    }))
                }
            };

            let layer = world
                .layer_mut(coord, cell.layer)
                .expect("chunk emplaced above");
            layer.proto = Some(proto);
            layer.orientation = orientation;
            layer.multi_index = cell.multi_index;
            layer.span = Extent2::new(cell.span.0, cell.span.1);
            layer.top_left = None; // rebuilt below
            layer.unique = unique.map(|u| Rc::new(RefCell::new(u)));
        }
    }

    // Logic lists are registered after all chunks exist
    for saved_chunk in &saved.chunks {
        for &(group, entry) in &saved_chunk.logic {
            world.logic_register(group, entry.coord, entry.layer);
        }
    }

    let mut logic = Logic::new();
    logic.set_state(saved.game_tick, saved.timer);

    world.deserialize_post_process(protos);

    Ok((world, logic))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity,
        logic::{
            conveyor_controller::conveyor_logic_update,
            conveyor_prop::Side,
            conveyor_utility::get_con_data,
        },
        test_util::TestCtx,
    };
    use tile_data::Orientation;

    /// A little factory: a straight run bending into a second belt, a
    /// splitter, items in transit, a listener, and a pending deferral.
    fn populated_ctx() -> (TestCtx, Logic) {
        let mut ctx = TestCtx::new();

        ctx.build_belt(Vec2::new(0, 0), Orientation::Down);
        ctx.build_belt(Vec2::new(0, 1), Orientation::Down);
        ctx.build_belt(Vec2::new(0, 2), Orientation::Right);
        ctx.build_belt(Vec2::new(1, 2), Orientation::Right);

        entity::build(
            &mut ctx.world,
            &ctx.protos,
            Vec2::new(5, 5),
            ctx.splitter,
            Orientation::Right,
        )
        .unwrap();

        let run = get_con_data(&ctx.world, Vec2::new(0, 0)).unwrap().structure();
        run.borrow_mut().append_item(Side::Left, LineDist::from_f64(0.3), ctx.item);
        run.borrow_mut().append_item(Side::Right, LineDist::from_f64(0.7), ctx.item);

        for _ in 0..10 {
            conveyor_logic_update(&mut ctx.world, &ctx.protos);
        }

        ctx.world.set_generator_seed(4242);
        ctx.world.update_dispatcher.register(Vec2::new(5, 5), Vec2::new(0, 2), ctx.splitter);

        let mut logic = Logic::new();
        logic.deferral_timer.register_at_tick(
            ctx.chest,
            Vec2::new(7, 7),
            TileLayerKind::Entity,
            30,
        );

        (ctx, logic)
    }

    #[test]
    fn test_round_trip_preserves_observable_state() {
        let (ctx, logic) = populated_ctx();

        let bytes = save_world(&ctx.world, &logic).unwrap();
        let (loaded, loaded_logic) = load_world(&bytes, &ctx.protos, &ctx.items).unwrap();

        assert_eq!(loaded.generator_seed(), 4242);
        assert_eq!(loaded.update_dispatcher.len(), ctx.world.update_dispatcher.len());
        assert_eq!(loaded_logic.game_tick(), logic.game_tick());
        assert_eq!(loaded_logic.deferral_timer.pending_count(), 1);

        assert_eq!(loaded.chunk_coords_sorted(), ctx.world.chunk_coords_sorted());
        for group in LOGIC_GROUPS {
            assert_eq!(loaded.logic_entries(group), ctx.world.logic_entries(group));
        }

        // Every tile layer matches field for field, segments too
        for cc in ctx.world.chunk_coords_sorted() {
            let original = ctx.world.get_chunk(cc).unwrap();
            for (local, tile) in original.iter_tiles() {
                let coord = chunk_to_world(cc) + local;
                for kind in TILE_LAYERS {
                    let a = tile.layer(kind);
                    let b = loaded.layer(coord, kind).unwrap();
                    assert_eq!(a.proto, b.proto);
                    assert_eq!(a.orientation, b.orientation);
                    assert_eq!(a.multi_index, b.multi_index);
                    if a.proto.is_some() {
                        assert_eq!(a.span, b.span);
                        assert_eq!(a.top_left, b.top_left);
                    }
                }

                let (Some(a), Some(b)) =
                    (get_con_data(&ctx.world, coord), get_con_data(&loaded, coord))
                else {
                    continue;
                };
                assert_eq!(a.struct_index(), b.struct_index());
                assert_eq!(a.line_orientation(), b.line_orientation());

                let a = a.structure();
                let b = b.structure();
                let a = a.borrow();
                let b = b.borrow();
                assert_eq!(a.direction, b.direction);
                assert_eq!(a.termination, b.termination);
                assert_eq!(a.length, b.length);
                assert_eq!(a.head_offset, b.head_offset);
                assert_eq!(a.target_insert_offset, b.target_insert_offset);
                assert_eq!(a.target.is_some(), b.target.is_some());
                for side in [Side::Left, Side::Right] {
                    let la = a.lane(side);
                    let lb = b.lane(side);
                    assert_eq!(la.index, lb.index);
                    assert_eq!(la.back_item_distance, lb.back_item_distance);
                    assert_eq!(la.visible, lb.visible);
                    assert_eq!(
                        la.items.iter().collect::<Vec<_>>(),
                        lb.items.iter().collect::<Vec<_>>(),
                    );
                }
            }
        }

        // The relinked world simulates identically; 25 further ticks carry
        // the leading item across the rebuilt target link
        let mut original_world = ctx.world;
        let mut loaded_world = loaded;
        for _ in 0..25 {
            conveyor_logic_update(&mut original_world, &ctx.protos);
            conveyor_logic_update(&mut loaded_world, &ctx.protos);
        }
        let a = get_con_data(&original_world, Vec2::new(0, 2)).unwrap().structure();
        let b = get_con_data(&loaded_world, Vec2::new(0, 2)).unwrap().structure();
        assert_eq!(
            a.borrow().left.items.iter().collect::<Vec<_>>(),
            b.borrow().left.items.iter().collect::<Vec<_>>(),
        );
        assert!(!a.borrow().left.items.is_empty());
    }

    #[test]
    fn test_load_rejects_unknown_prototype() {
        let (ctx, logic) = populated_ctx();
        let bytes = save_world(&ctx.world, &logic).unwrap();

        // A registry missing most prototypes cannot resolve the archive
        let empty = ProtoRegistry::new();
        match load_world(&bytes, &empty, &ctx.items) {
            Err(LoadError::IdUnknown { kind: "prototype", .. }) => {}
            other => panic!("expected unknown prototype id, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_unknown_item() {
        let (ctx, logic) = populated_ctx();
        let bytes = save_world(&ctx.world, &logic).unwrap();

        let empty_items = ItemRegistry::new();
        match load_world(&bytes, &ctx.protos, &empty_items) {
            Err(LoadError::IdUnknown { kind: "item", .. }) => {}
            other => panic!("expected unknown item id, got {other:?}"),
        }
    }
}
