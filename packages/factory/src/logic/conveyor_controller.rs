//! Per-tick conveyor and splitter updates.
//!
//! A logic update happens in two passes over every active segment: move
//! the one eligible item per lane, then transition items which reached the
//! end of their segment onto the next one. Splitter lane swapping runs
//! strictly between the two passes.

use crate::{
    decimal::LineDist,
    logic::{
        conveyor_prop::{
            termination_deduction,
            Side,
            ITEM_SPACING,
            SIDES,
            SPLITTER_THRESHOLD,
        },
        conveyor_struct::{
            ConveyorLane,
            ConveyorSegment,
            SegmentRef,
            SplitterData,
            Termination,
        },
        conveyor_utility::get_con_data,
    },
    proto::{
        ItemId,
        ProtoRegistry,
        UniqueData,
    },
    world::{
        chunk::{
            LogicGroup,
            TileLayerKind,
        },
        World,
    },
};
use std::{
    cell::RefCell,
    rc::Rc,
};
use tile_data::WorldCoord;


/// One logic update of every conveyor and splitter in the world.
///
/// Movement of every kind finishes before any transition runs; otherwise
/// an item crossing from a belt into a splitter within the tick would be
/// moved twice. Splitter swaps resolve after all movement and before any
/// transition, so a swapped item neither double-moves nor falls one
/// update behind.
pub fn conveyor_logic_update(world: &mut World, protos: &ProtoRegistry) {
    let conveyors = world.logic_entries(LogicGroup::Conveyor);
    let splitters = world.logic_entries(LogicGroup::Splitter);

    for entry in &conveyors {
        let Some((structure, speed)) = conveyor_entry(world, protos, entry.coord) else {
            continue;
        };
        move_segment_items(&mut structure.borrow_mut(), speed);
    }

    for entry in &splitters {
        let Some((cell, speed)) = splitter_entry(world, protos, entry.coord) else {
            continue;
        };
        let data = cell.borrow();
        let data = data.as_splitter().expect("splitter entry without splitter data");
        move_segment_items(&mut data.left.structure.borrow_mut(), speed);
        move_segment_items(&mut data.right.structure.borrow_mut(), speed);
    }

    for entry in &splitters {
        let Some((cell, speed)) = splitter_entry(world, protos, entry.coord) else {
            continue;
        };
        let mut data = cell.borrow_mut();
        let data = data.as_splitter_mut().expect("splitter entry without splitter data");
        splitter_swap(data, speed);
    }

    for entry in &conveyors {
        let Some((structure, speed)) = conveyor_entry(world, protos, entry.coord) else {
            continue;
        };
        transition_segment_items(&structure, speed);
    }

    for entry in &splitters {
        let Some((cell, speed)) = splitter_entry(world, protos, entry.coord) else {
            continue;
        };
        let (left, right) = {
            let data = cell.borrow();
            let data = data.as_splitter().expect("splitter entry without splitter data");
            (data.left.structure.clone(), data.right.structure.clone())
        };
        transition_segment_items(&left, speed);
        transition_segment_items(&right, speed);
    }
}

fn conveyor_entry(
    world: &World,
    protos: &ProtoRegistry,
    coord: WorldCoord,
) -> Option<(SegmentRef, LineDist)> {
    let con = get_con_data(world, coord)?;
    Some((con.structure(), entry_speed(world, protos, coord)?))
}

fn splitter_entry(
    world: &World,
    protos: &ProtoRegistry,
    coord: WorldCoord,
) -> Option<(Rc<RefCell<UniqueData>>, LineDist)> {
    let cell = world.get_unique(coord, TileLayerKind::Entity)?;
    Some((cell, entry_speed(world, protos, coord)?))
}

fn entry_speed(world: &World, protos: &ProtoRegistry, coord: WorldCoord) -> Option<LineDist> {
    let (_, layer) = world.layer_top_left(coord, TileLayerKind::Entity)?;
    protos.get(layer.proto?).conveyor_speed()
}


// ======================================================================
// Pass A: move

/// Decrement the active item's distance on both lanes.
fn move_segment_items(segment: &mut ConveyorSegment, speed: LineDist) {
    for side in SIDES {
        let lane = segment.lane_mut(side);
        // Empty lane or an index past the end means nothing to move
        if lane.is_active() {
            let index = lane.index;
            lane.items[index].dist -= speed;
            lane.back_item_distance -= speed;
        }
    }
}


// ======================================================================
// Pass B: transition

fn transition_segment_items(structure: &SegmentRef, speed: LineDist) {
    for side in SIDES {
        if structure.borrow().is_active(side) {
            update_side(structure, side, speed);
        }
        debug_assert!(
            structure.borrow().lane(side).is_consistent(),
            "lane back distance diverged from its items",
        );
    }
}

/// Advance the lane index to the next item with spacing to spare and
/// decrement it.
///
/// With no target segment the index follows the item it moved (a stalled
/// head is final until the world changes); with one the index stays put
/// so the head retries its insertion every tick. When nothing can move
/// the index resets to 0.
fn move_next_item(
    tiles_moved: LineDist,
    lane: &mut ConveyorLane,
    has_target_segment: bool,
) -> bool {
    for i in (lane.index + 1)..lane.items.len() {
        if lane.items[i].dist > ITEM_SPACING {
            if !has_target_segment {
                lane.index = i;
            }
            lane.items[i].dist -= tiles_moved;
            return true;
        }
    }

    lane.index = 0;
    false
}

fn update_side(structure: &SegmentRef, side: Side, tiles_moved: LineDist) {
    let mut borrow = structure.borrow_mut();
    let segment = &mut *borrow;

    let index = segment.lane(side).index;

    if index == 0 {
        let offset = segment.lane(side).items[0].dist;

        // Front item has not reached the head yet
        if offset >= LineDist::ZERO {
            return;
        }

        if let Some(target_ref) = segment.target.clone() {
            debug_assert!(
                !Rc::ptr_eq(structure, &target_ref),
                "segment targets itself",
            );
            let mut target = target_ref.borrow_mut();

            // Side-only terminations can feed the middle of a grouped
            // segment, so they carry their own insertion index; everything
            // else inserts relative to the target's head
            let length = match segment.termination {
                Termination::LeftOnly(i) | Termination::RightOnly(i) => {
                    LineDist::from_tiles(1 + i as i64)
                }
                _ => LineDist::from_tiles(target.length as i64),
            };
            let target_offset = length
                - offset.abs()
                - termination_deduction(side, segment.termination, target.termination);

            let item = segment.lane(side).items[0].item;
            let moved_item = match segment.termination {
                Termination::LeftOnly(_) => {
                    let head_offset = target.head_offset;
                    target.lane_mut(Side::Left).try_insert_item(target_offset, item, head_offset)
                }
                Termination::RightOnly(_) => {
                    let head_offset = target.head_offset;
                    target.lane_mut(Side::Right).try_insert_item(target_offset, item, head_offset)
                }
                _ => target.try_insert_item(side, target_offset, item),
            };

            if moved_item {
                let lane = segment.lane_mut(side);
                lane.items.pop_front();

                // Pull the next item forward to keep the spacing it had to
                // the departed one; offset is negative here. (Would not
                // hold for speeds above the item spacing.)
                if let Some(front) = lane.items.front_mut() {
                    front.dist += offset;
                } else {
                    lane.back_item_distance = LineDist::ZERO;
                }
                return;
            }
        }

        // No target segment, or it had no room: hold the item at the head
        // and make up the lost movement on the first trailing item with
        // room
        let has_target = segment.target.is_some();
        let lane = segment.lane_mut(side);
        lane.items[0].dist = LineDist::ZERO;
        lane.back_item_distance += tiles_moved;
        if move_next_item(tiles_moved, lane, has_target) {
            lane.back_item_distance -= tiles_moved;
        }
    } else {
        // An item behind another one: trailing items keep a minimum gap of
        // one item spacing
        let has_target = segment.target.is_some();
        let lane = segment.lane_mut(side);

        let offset = lane.items[index].dist;
        if offset >= ITEM_SPACING {
            return;
        }

        // Gap closed below the minimum: pin it there and push the motion
        // one slot back
        lane.items[index].dist = ITEM_SPACING;
        if move_next_item(tiles_moved, lane, has_target) {
            lane.back_item_distance -= tiles_moved;
        }
    }
}


// ======================================================================
// Splitter swap

struct SwapCandidate {
    index: usize,
    dist_from_front: LineDist,
    item: ItemId,
}

/// An item just entering the rear swap window of a splitter lane. At most
/// one item can be inside the window at a time.
fn find_swap_candidate(
    lane: &ConveyorLane,
    lane_length: LineDist,
    speed: LineDist,
) -> Option<SwapCandidate> {
    let mut dist_from_front = LineDist::ZERO;

    for (i, item) in lane.items.iter().enumerate() {
        dist_from_front += item.dist;
        let dist_from_rear = lane_length - dist_from_front;

        // Swapping is only allowed within a short window, otherwise items
        // would trade places back and forth every tick
        if dist_from_rear > SPLITTER_THRESHOLD && dist_from_rear <= SPLITTER_THRESHOLD + speed {
            return Some(SwapCandidate { index: i, dist_from_front, item: item.item });
        }
    }
    None
}

/// Resolve cross-lane exchange for one splitter.
///
/// A lone candidate crosses to the other side only when that side leads
/// somewhere; matched candidates trade items in place. Either way the
/// move is staged one tick through the `swap` flag, which keeps
/// compressed lanes compressed.
fn splitter_swap(data: &mut SplitterData, speed: LineDist) {
    let left_ref = data.left.structure.clone();
    let right_ref = data.right.structure.clone();
    let mut left = left_ref.borrow_mut();
    let mut right = right_ref.borrow_mut();

    let staged = data.swap;
    let mut want_stage = false;
    let mut swapped = false;

    let left_leads_out = left.target.is_some();
    let right_leads_out = right.target.is_some();

    // The two lanes of a belt never mix; candidates pair up between the
    // same lane of the two sides
    for lane_side in SIDES {
        let l_candidate =
            find_swap_candidate(left.lane(lane_side), left.lane_length(lane_side), speed);
        let r_candidate =
            find_swap_candidate(right.lane(lane_side), right.lane_length(lane_side), speed);

        match (l_candidate, r_candidate) {
            (Some(candidate), None) if right_leads_out => {
                if !staged {
                    want_stage = true;
                } else if transfer(
                    left.lane_mut(lane_side),
                    right.lane_mut(lane_side),
                    &candidate,
                ) {
                    swapped = true;
                }
            }
            (None, Some(candidate)) if left_leads_out => {
                if !staged {
                    want_stage = true;
                } else if transfer(
                    right.lane_mut(lane_side),
                    left.lane_mut(lane_side),
                    &candidate,
                ) {
                    swapped = true;
                }
            }
            (Some(l_candidate), Some(r_candidate)) => {
                if !staged {
                    want_stage = true;
                } else {
                    // Forgive small spacing differences by exchanging just
                    // the item references
                    let l_item = left.lane(lane_side).items[l_candidate.index].item;
                    let r_item = right.lane(lane_side).items[r_candidate.index].item;
                    left.lane_mut(lane_side).items[l_candidate.index].item = r_item;
                    right.lane_mut(lane_side).items[r_candidate.index].item = l_item;
                    swapped = true;
                }
            }
            _ => {}
        }
    }

    if swapped {
        data.swap = false;
    } else if want_stage {
        data.swap = true;
    }
}

/// Move a candidate onto the same lane of the other side, at the same
/// distance from the front.
fn transfer(from: &mut ConveyorLane, to: &mut ConveyorLane, candidate: &SwapCandidate) -> bool {
    if to.try_insert_item(candidate.dist_from_front, candidate.item, 0) {
        from.remove_item(candidate.index);
        true
    } else {
        false
    }
}
