//! Maintenance of the segment graph under player edits: grouping,
//! splitting, target connection, termination and line orientation updates.

use crate::{
    logic::{
        conveyor_prop::{
            line_orientation,
            LineOrientation,
        },
        conveyor_struct::{
            ConveyorData,
            ConveyorSegment,
            SegmentRef,
            Termination,
        },
    },
    proto::UniqueData,
    world::{
        chunk::{
            LogicGroup,
            TileLayerKind,
        },
        World,
    },
};
use crate::decimal::LineDist;
use std::{
    cell::RefCell,
    rc::Rc,
};
use tile_data::{
    advance,
    world_to_chunk,
    ChunkCoord,
    Orientation,
    PerOrientation,
    WorldCoord,
    ORIENTATIONS,
};


/// Which conveyor of an entity a tile refers to. Splitters carry one per
/// tile.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ConSlot {
    Belt,
    SplitterLeft,
    SplitterRight,
}

/// Handle to the conveyor data at one tile: the owning unique-data cell
/// plus the slot within it.
#[derive(Clone)]
pub struct ConDataRef {
    cell: Rc<RefCell<UniqueData>>,
    slot: ConSlot,
}

impl ConDataRef {
    pub fn with<R>(&self, f: impl FnOnce(&ConveyorData) -> R) -> R {
        let borrow = self.cell.borrow();
        let data = match (&*borrow, self.slot) {
            (UniqueData::Conveyor(data), ConSlot::Belt) => data,
            (UniqueData::Splitter(data), ConSlot::SplitterLeft) => &data.left,
            (UniqueData::Splitter(data), ConSlot::SplitterRight) => &data.right,
            _ => unreachable!("unique data does not match conveyor slot"),
        };
        f(data)
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut ConveyorData) -> R) -> R {
        let mut borrow = self.cell.borrow_mut();
        let data = match (&mut *borrow, self.slot) {
            (UniqueData::Conveyor(data), ConSlot::Belt) => data,
            (UniqueData::Splitter(data), ConSlot::SplitterLeft) => &mut data.left,
            (UniqueData::Splitter(data), ConSlot::SplitterRight) => &mut data.right,
            _ => unreachable!("unique data does not match conveyor slot"),
        };
        f(data)
    }

    pub fn structure(&self) -> SegmentRef {
        self.with(|data| data.structure.clone())
    }

    pub fn set_structure(&self, structure: SegmentRef) {
        self.with_mut(|data| data.structure = structure);
    }

    pub fn struct_index(&self) -> u16 {
        self.with(|data| data.struct_index)
    }

    pub fn set_struct_index(&self, index: u16) {
        self.with_mut(|data| data.struct_index = index);
    }

    pub fn line_orientation(&self) -> LineOrientation {
        self.with(|data| data.line_orientation)
    }

    pub fn set_line_orientation(&self, orientation: LineOrientation) {
        self.with_mut(|data| data.line_orientation = orientation);
    }

    fn is_belt(&self) -> bool {
        self.slot == ConSlot::Belt
    }
}


/// Conveyor data at a coordinate, resolving splitter tiles to the correct
/// half. `None` if there is no conveyor there.
pub fn get_con_data(world: &World, coord: WorldCoord) -> Option<ConDataRef> {
    let (tl_coord, layer) = world.layer_top_left(coord, TileLayerKind::Entity)?;
    layer.proto?;
    let cell = layer.unique.clone()?;

    let slot = match &*cell.borrow() {
        UniqueData::Conveyor(_) => ConSlot::Belt,
        UniqueData::Splitter(data) => {
            if coord == splitter_left_coord(tl_coord, data.orientation) {
                ConSlot::SplitterLeft
            } else {
                ConSlot::SplitterRight
            }
        }
    };

    Some(ConDataRef { cell, slot })
}

/// Coordinate of a splitter's left-hand tile given its top-left tile.
pub fn splitter_left_coord(tl_coord: WorldCoord, orientation: Orientation) -> WorldCoord {
    match orientation {
        // Facing up or right the top-left tile is on the left hand
        Orientation::Up | Orientation::Right => tl_coord,
        Orientation::Down => advance(tl_coord, Orientation::Right, 1),
        Orientation::Left => advance(tl_coord, Orientation::Down, 1),
    }
}


// ======================================================================
// Build

/// All steps for cleanly building a conveyor at a placed belt tile:
/// create or group its structure, cache its line orientation, connect and
/// re-terminate neighbors. Further neighbors are updated through neighbor
/// update events after the build.
pub fn build_conveyor(world: &mut World, coord: WorldCoord, direction: Orientation) {
    conveyor_create(world, coord, direction);
    conveyor_update_line_orien(world, coord);
    conveyor_neighbor_connect(world, coord);
    conveyor_update_neighbor_termination(world, coord);
    conveyor_update_neighbor_line_orien(world, coord);
}

/// All steps for cleanly removing the conveyor at a coordinate: ungroup
/// its structure, disconnect feeders, refresh neighbor line orientations.
pub fn remove_conveyor(world: &mut World, coord: WorldCoord) {
    conveyor_destroy(world, coord);
    conveyor_neighbor_disconnect(world, coord);
    conveyor_update_neighbor_line_orien(world, coord);
}

/// React to a change on a neighboring tile: refresh connections,
/// terminations and the cached orientation, and wake the lanes so stalled
/// heads notice a target that appeared.
pub fn conveyor_on_neighbor_update(world: &mut World, _emit: WorldCoord, receive: WorldCoord) {
    let Some(con) = get_con_data(world, receive) else {
        return;
    };

    conveyor_neighbor_connect(world, receive);
    conveyor_update_neighbor_termination(world, receive);
    conveyor_update_line_orien(world, receive);

    let structure = con.structure();
    let mut seg = structure.borrow_mut();
    seg.left.index = 0;
    seg.right.index = 0;
}

/// Create the conveyor structure for a belt tile and store its data.
///
/// Grouping rules, for a run pointing left (buildings in [order]):
///
/// `< < < [1, 2, 3]` line ahead: extends the segment at the tail.
/// `< < < [3, 2, 1]` line behind: moves the segment head forward.
/// `< < < [1, 3, 2]` both: behaves as line ahead.
///
/// Grouping stays within one chunk so a segment's logic registration
/// remains with the chunk that renders it. Splitter halves never group
/// with plain belts; they connect via targets instead.
fn conveyor_create(world: &mut World, coord: WorldCoord, direction: Orientation) {
    let origin_chunk = world_to_chunk(coord);

    let groupable = |world: &World, c: WorldCoord| -> Option<ConDataRef> {
        if world_to_chunk(c) != origin_chunk {
            return None;
        }
        get_con_data(world, c)
            .filter(|con| con.is_belt())
            .filter(|con| con.structure().borrow().direction == direction)
    };

    // Group ahead
    if let Some(ahead) = groupable(world, advance(coord, direction, 1)) {
        let structure = ahead.structure();
        structure.borrow_mut().length += 1;
        let index = ahead.struct_index() + 1;
        store_conveyor_data(world, coord, structure, index);
        debug!(?coord, index, "conveyor grouped with the run ahead");
        return;
    }

    // Group behind
    if let Some(behind) = groupable(world, advance(coord, direction, -1)) {
        let structure = behind.structure();
        conveyor_lengthen_front(&structure);
        store_conveyor_data(world, coord, structure.clone(), 0);

        // The head moved one tile forward; re-register it there
        conveyor_logic_remove(world, coord, &structure);
        world.logic_register(LogicGroup::Conveyor, coord, TileLayerKind::Entity);

        conveyor_renumber(world, coord, 0);
        debug!(?coord, "conveyor grouped with the run behind");
        return;
    }

    // New conveyor
    let structure = ConveyorSegment::new_ref(direction, Termination::Straight, 1);
    store_conveyor_data(world, coord, structure, 0);
    world.logic_register(LogicGroup::Conveyor, coord, TileLayerKind::Entity);
    debug!(?coord, ?direction, "conveyor created");
}

fn store_conveyor_data(world: &mut World, coord: WorldCoord, structure: SegmentRef, index: u16) {
    let layer = world
        .layer_mut(coord, TileLayerKind::Entity)
        .expect("conveyor built on an ungenerated chunk");
    let mut data = ConveyorData::new(structure);
    data.struct_index = index;
    layer.unique = Some(Rc::new(RefCell::new(UniqueData::Conveyor(data))));
}


// ======================================================================
// Remove

/// Destroy the conveyor structure at a coordinate, splitting the tiles
/// behind it into a new segment.
fn conveyor_destroy(world: &mut World, coord: WorldCoord) {
    let Some(con) = get_con_data(world, coord) else {
        return;
    };
    let old_structure = con.structure();
    let struct_index = con.struct_index();

    let (direction, length, head_offset, termination) = {
        let seg = old_structure.borrow();
        (seg.direction, seg.length, seg.head_offset, seg.termination)
    };

    // Tiles behind the removed one become a new straight segment
    let new_length = length as i32 - struct_index as i32 - 1;
    if new_length > 0 {
        let behind_coord = advance(coord, direction, -1);

        let new_structure =
            ConveyorSegment::new_ref(direction, Termination::Straight, new_length as u16);
        // Keeps absolute offsets stored against the old segment valid on
        // the new one
        new_structure.borrow_mut().head_offset = head_offset - struct_index as i32 - 1;

        world.logic_register(LogicGroup::Conveyor, behind_coord, TileLayerKind::Entity);

        conveyor_change_structure(world, behind_coord, &new_structure);
        conveyor_renumber(world, behind_coord, 0);
        debug!(?coord, new_length, "conveyor segment split");
    }

    // Heads of non-straight segments sit at struct index 1; index 0 is the
    // virtual tile inside the target
    let removed_head =
        struct_index == 0 || (struct_index == 1 && !termination.is_straight());
    if removed_head {
        conveyor_logic_remove(world, coord, &old_structure);
    } else {
        old_structure.borrow_mut().length = struct_index;
    }
}

/// Drop the logic registration of a structure, wherever its head was
/// registered.
pub fn conveyor_logic_remove(world: &mut World, coord: WorldCoord, structure: &SegmentRef) {
    let mut ccs: Vec<ChunkCoord> = vec![world_to_chunk(coord)];
    for cc in world.logic_chunks() {
        if !ccs.contains(cc) {
            ccs.push(*cc);
        }
    }

    for cc in ccs {
        let mut found = None;
        if let Some(chunk) = world.get_chunk(cc) {
            for entry in chunk.logic_entries(LogicGroup::Conveyor) {
                let matches = get_con_data(world, entry.coord)
                    .map(|con| Rc::ptr_eq(&con.structure(), structure))
                    .unwrap_or(false);
                if matches {
                    found = Some(*entry);
                    break;
                }
            }
        }
        if let Some(entry) = found {
            world.logic_remove_entry(LogicGroup::Conveyor, entry);
            return;
        }
    }
}


// ======================================================================
// Segment geometry

/// Grow a segment one tile longer in front of the current head.
///
/// Items keep their world position: they are one tile further from the
/// new head, and stored offsets stay valid through the head offset.
pub fn conveyor_lengthen_front(structure: &SegmentRef) {
    let mut borrow = structure.borrow_mut();
    let seg = &mut *borrow;
    seg.length += 1;
    seg.head_offset += 1;
    for lane in [&mut seg.left, &mut seg.right] {
        if let Some(front) = lane.items.front_mut() {
            front.dist += LineDist::from_tiles(1);
            lane.back_item_distance += LineDist::from_tiles(1);
        }
    }
}

/// Shrink a segment one tile from the head; the tile after the old head
/// becomes the head.
pub fn conveyor_shorten_front(structure: &SegmentRef) {
    let mut borrow = structure.borrow_mut();
    let seg = &mut *borrow;
    seg.length -= 1;
    seg.head_offset -= 1;
    for lane in [&mut seg.left, &mut seg.right] {
        if let Some(front) = lane.items.front_mut() {
            front.dist -= LineDist::from_tiles(1);
            lane.back_item_distance -= LineDist::from_tiles(1);
        }
    }
}

/// Renumber the struct indices of a segment's tiles, walking from `coord`
/// towards the tail, assigning `start_index` onwards.
pub fn conveyor_renumber(world: &mut World, mut coord: WorldCoord, start_index: u16) {
    let con = get_con_data(world, coord).expect("renumber without a conveyor");
    let (length, direction) = {
        let structure = con.structure();
        let seg = structure.borrow();
        (seg.length, seg.direction)
    };

    for i in start_index..length {
        let con = get_con_data(world, coord).expect("conveyor run ended before its length");
        con.set_struct_index(i);
        coord = advance(coord, direction, -1);
    }
}

/// Replace the structure shared by a run of tiles starting at `coord`
/// (the new head), retargeting every neighbor structure that pointed at
/// the old one.
pub fn conveyor_change_structure(world: &mut World, coord: WorldCoord, new_structure: &SegmentRef) {
    let head_con = get_con_data(world, coord).expect("change structure without a conveyor");
    let old_structure = head_con.structure();

    let (new_direction, new_length) = {
        let seg = new_structure.borrow();
        (seg.direction, seg.length)
    };
    let old_length = old_structure.borrow().length;

    // Feeders along the two parallel lines may target the old structure
    let (side_a, side_b) = match new_direction {
        Orientation::Up | Orientation::Down => (Orientation::Left, Orientation::Right),
        Orientation::Right | Orientation::Left => (Orientation::Up, Orientation::Down),
    };
    for side in [side_a, side_b] {
        let mut c = advance(coord, side, 1);
        for _ in 0..old_length {
            change_target_single(world, c, &old_structure, new_structure);
            c = advance(c, new_direction, -1);
        }
    }

    // And so may the structure one past the new tail
    change_target_single(
        world,
        advance(coord, new_direction, -(new_length as i32)),
        &old_structure,
        new_structure,
    );

    let mut c = coord;
    for _ in 0..new_length {
        let con = get_con_data(world, c).expect("conveyor run ended before its length");
        debug_assert_eq!(con.structure().borrow().direction, new_direction);
        con.set_structure(new_structure.clone());
        c = advance(c, new_direction, -1);
    }
}

fn change_target_single(
    world: &World,
    coord: WorldCoord,
    old_structure: &SegmentRef,
    new_structure: &SegmentRef,
) {
    let Some(con) = get_con_data(world, coord) else {
        return;
    };
    let structure = con.structure();
    let mut seg = structure.borrow_mut();
    let targets_old = seg
        .target
        .as_ref()
        .map(|t| Rc::ptr_eq(t, old_structure))
        .unwrap_or(false);
    if targets_old {
        seg.target = Some(new_structure.clone());
    }
}


// ======================================================================
// Connections

/// Attempt connections between the conveyor at `coord` and all four
/// neighbors.
pub fn conveyor_neighbor_connect(world: &mut World, coord: WorldCoord) {
    for orientation in ORIENTATIONS {
        let neighbor_coord = advance(coord, orientation, 1);
        let (Some(origin), Some(neighbor)) =
            (get_con_data(world, coord), get_con_data(world, neighbor_coord))
        else {
            continue;
        };
        calculate_targets(&origin, &neighbor, orientation);
    }
}

/// Determine whether origin feeds neighbor or neighbor feeds origin, and
/// set the one target accordingly. Only one of the pair can ever be the
/// other's target, and a structure never targets itself.
///
/// `origin_connect` is the orientation origin must have to feed neighbor.
fn calculate_targets(origin: &ConDataRef, neighbor: &ConDataRef, origin_connect: Orientation) {
    let origin_structure = origin.structure();
    let neighbor_structure = neighbor.structure();

    if Rc::ptr_eq(&origin_structure, &neighbor_structure) {
        return;
    }

    let origin_can_connect = origin_structure.borrow().direction == origin_connect;
    let neighbor_can_connect =
        neighbor_structure.borrow().direction == origin_connect.invert();

    if origin_can_connect == neighbor_can_connect {
        return;
    }

    if origin_can_connect {
        connect_segment(&origin_structure, neighbor);
    } else {
        connect_segment(&neighbor_structure, origin);
    }
}

fn connect_segment(from: &SegmentRef, to: &ConDataRef) {
    let to_structure = to.structure();
    // Insert at the correct offset for targets spanning multiple tiles
    let insert_offset = to.struct_index() as i32 + to_structure.borrow().head_offset;

    let mut seg = from.borrow_mut();
    seg.target = Some(to_structure);
    seg.target_insert_offset = insert_offset;
}

/// Disconnect any neighbor structure that targeted the conveyor at
/// `coord`, reverting its termination. Applying this twice is the same as
/// applying it once.
pub fn conveyor_neighbor_disconnect(world: &mut World, coord: WorldCoord) {
    for orientation in ORIENTATIONS {
        disconnect_segment(world, coord, advance(coord, orientation, 1));
    }
}

fn disconnect_segment(world: &mut World, origin_coord: WorldCoord, neighbor_coord: WorldCoord) {
    let Some(origin) = get_con_data(world, origin_coord) else {
        return;
    };
    let Some(neighbor) = get_con_data(world, neighbor_coord) else {
        return;
    };
    let origin_structure = origin.structure();
    let neighbor_structure = neighbor.structure();

    let targets_origin = neighbor_structure
        .borrow()
        .target
        .as_ref()
        .map(|t| Rc::ptr_eq(t, &origin_structure))
        .unwrap_or(false);
    if !targets_origin {
        return;
    }

    neighbor_structure.borrow_mut().target = None;

    let termination = neighbor_structure.borrow().termination;
    if !termination.is_straight() {
        // The neighbor no longer reaches into the origin's tile
        conveyor_shorten_front(&neighbor_structure);
        neighbor_structure.borrow_mut().termination = Termination::Straight;
        conveyor_renumber(world, neighbor_coord, 0);
    }
}


// ======================================================================
// Termination

/// Re-derive the termination of every perpendicular feeder into the
/// conveyor tile at `coord`.
///
/// A feeder bends onto its target when it is the target tile's only
/// input; it becomes side-only when the target tile also has a straight
/// input or an opposing side feeder.
pub fn conveyor_update_neighbor_termination(world: &mut World, coord: WorldCoord) {
    let Some(target_con) = get_con_data(world, coord) else {
        return;
    };
    let target_structure = target_con.structure();
    let target_direction = target_structure.borrow().direction;

    let behind = advance(coord, target_direction, -1);
    let has_straight_input = get_con_data(world, behind)
        .map(|con| con.structure().borrow().direction == target_direction)
        .unwrap_or(false);

    for side_direction in [target_direction.rotate_left(), target_direction.rotate_right()] {
        let feeder_coord = advance(coord, side_direction, 1);
        let Some(feeder) = get_con_data(world, feeder_coord) else {
            continue;
        };
        let feeder_structure = feeder.structure();

        let feeder_direction = feeder_structure.borrow().direction;
        if feeder_direction != side_direction.invert() {
            continue;
        }
        let targets_here = feeder_structure
            .borrow()
            .target
            .as_ref()
            .map(|t| Rc::ptr_eq(t, &target_structure))
            .unwrap_or(false);
        if !targets_here {
            continue;
        }

        let opposite_coord = advance(coord, side_direction.invert(), 1);
        let has_opposing_feeder = get_con_data(world, opposite_coord)
            .map(|con| con.structure().borrow().direction == side_direction)
            .unwrap_or(false);

        // A feeder from the target's right hand lands on the right lane
        let feeds_right_lane = feeder_direction == target_direction.rotate_left();

        let desired = if has_straight_input || has_opposing_feeder {
            let side_insert_index =
                target_con.struct_index() as i32 - target_structure.borrow().head_offset;
            if feeds_right_lane {
                Termination::RightOnly(side_insert_index)
            } else {
                Termination::LeftOnly(side_insert_index)
            }
        } else if feeds_right_lane {
            Termination::BendRight
        } else {
            Termination::BendLeft
        };

        apply_termination(world, feeder_coord, &feeder_structure, desired);
    }
}

fn apply_termination(
    world: &mut World,
    feeder_head_coord: WorldCoord,
    structure: &SegmentRef,
    desired: Termination,
) {
    let current = structure.borrow().termination;
    if current == desired {
        return;
    }
    trace!(?feeder_head_coord, ?current, ?desired, "feeder termination change");

    if current.is_straight() {
        // The segment head advances into the target's tile
        conveyor_lengthen_front(structure);
        structure.borrow_mut().termination = desired;
        conveyor_renumber(world, feeder_head_coord, 1);
    } else if desired.is_straight() {
        conveyor_shorten_front(structure);
        structure.borrow_mut().termination = desired;
        conveyor_renumber(world, feeder_head_coord, 0);
    } else {
        // Bend to side-only and back keeps the segment's extent
        structure.borrow_mut().termination = desired;
    }
}


// ======================================================================
// Line orientation

/// Line orientation for a conveyor at `coord` moving `direction`,
/// regardless of whether conveyor data exists there yet.
pub fn conveyor_calc_line_orien(
    world: &World,
    coord: WorldCoord,
    direction: Orientation,
) -> LineOrientation {
    let mut neighbors = PerOrientation([None; 4]);
    for orientation in ORIENTATIONS {
        neighbors[orientation] = get_con_data(world, advance(coord, orientation, 1))
            .map(|con| con.structure().borrow().direction);
    }
    line_orientation(direction, neighbors)
}

/// Refresh the cached line orientation of the conveyor at `coord`.
pub fn conveyor_update_line_orien(world: &mut World, coord: WorldCoord) {
    let Some(con) = get_con_data(world, coord) else {
        return;
    };
    let direction = con.structure().borrow().direction;
    con.set_line_orientation(conveyor_calc_line_orien(world, coord, direction));
}

/// Refresh the cached line orientations of the four neighbors of `coord`.
pub fn conveyor_update_neighbor_line_orien(world: &mut World, coord: WorldCoord) {
    for orientation in ORIENTATIONS {
        conveyor_update_line_orien(world, advance(coord, orientation, 1));
    }
}
