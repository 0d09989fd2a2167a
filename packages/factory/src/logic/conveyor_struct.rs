//! Conveyor segments: a run of same-direction belt tiles whose items live
//! in two lane deques.
//!
//! Each lane stores items head-first as `(distance, item)` pairs, where
//! distance is the gap to the item ahead (or to the segment head for the
//! first item). Items nearest the head are at the front of the deque.
//! See FFF 176 <https://factorio.com/blog/post/fff-176>.

use crate::{
    decimal::LineDist,
    logic::conveyor_prop::{
        lane_reduction,
        LineOrientation,
        Side,
        ITEM_EPSILON,
        ITEM_SPACING,
    },
    proto::ItemId,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};
use tile_data::Orientation;


/// Shared handle to a segment. Every tile of the segment plus any upstream
/// segment's `target` slot co-own it; topology edits are responsible for
/// clearing `target`s so belt cycles cannot keep dead segments alive.
pub type SegmentRef = Rc<RefCell<ConveyorSegment>>;


/// An item riding a lane.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConveyorItem {
    /// Tile distance to the next item ahead, or to the segment head for
    /// the front item.
    pub dist: LineDist,
    pub item: ItemId,
}


/// How a segment ends.
///
/// Side-only variants carry the insertion index along the target: the
/// target tile's `struct_index` with the target's `head_offset` already
/// subtracted, so the value stays correct when the target later grows
/// from its head.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    Straight,
    BendLeft,
    BendRight,
    /// Both lanes feed the target's left lane.
    LeftOnly(i32),
    /// Both lanes feed the target's right lane.
    RightOnly(i32),
}

impl Termination {
    pub fn is_straight(self) -> bool {
        matches!(self, Termination::Straight)
    }

    pub fn is_side_only(self) -> bool {
        matches!(self, Termination::LeftOnly(_) | Termination::RightOnly(_))
    }

    pub fn side_insert_index(self) -> Option<i32> {
        match self {
            Termination::LeftOnly(i) | Termination::RightOnly(i) => Some(i),
            _ => None,
        }
    }
}


/// One side of a conveyor.
#[derive(Debug, Clone)]
pub struct ConveyorLane {
    pub items: VecDeque<ConveyorItem>,
    /// Index of the active item, the first one eligible to move.
    /// The lane is inactive while this points past the end.
    pub index: usize,
    /// Distance from the head to the last item. Cached so insertion at the
    /// tail does not have to walk the deque.
    pub back_item_distance: LineDist,
    /// Whether items on this lane are drawn.
    pub visible: bool,
}

impl Default for ConveyorLane {
    fn default() -> Self {
        Self::new()
    }
}

impl ConveyorLane {
    pub fn new() -> Self {
        ConveyorLane {
            items: VecDeque::new(),
            index: 0,
            back_item_distance: LineDist::ZERO,
            visible: true,
        }
    }

    /// Whether the lane is non-empty and its index refers to an item.
    pub fn is_active(&self) -> bool {
        !(self.items.is_empty() || self.index >= self.items.len())
    }

    /// Whether an item can sit at `start_offset` tiles from the head
    /// without coming closer than `ITEM_SPACING` to any existing item.
    /// `extra` shifts the offset by whole tiles (the head-offset hook).
    pub fn can_insert(&self, start_offset: LineDist, extra: i32) -> bool {
        let start_offset = start_offset + LineDist::from_tiles(extra as i64);
        debug_assert!(!start_offset.is_negative());

        let mut offset = LineDist::ZERO;

        for item in &self.items {
            // Item is not compressed with the previous item
            if item.dist > ITEM_SPACING {
                //  OFFSET item_spacing             item_spacing  OFFSET + dist
                //     | ------------ |  GAP FOR ITEM  | ------------ |
                if ITEM_SPACING + offset <= start_offset
                    && start_offset <= offset + item.dist - ITEM_SPACING
                {
                    return true;
                }
            }

            offset += item.dist;

            // Offset past start_offset, not possible to be true past this
            if offset > start_offset {
                return false;
            }
        }

        // Account for the spacing of the last item if not the first item
        if !self.items.is_empty() {
            offset += ITEM_SPACING;
        }

        offset <= start_offset
    }

    /// Append behind the last item. `offset` is the gap to the previous
    /// item, or to the head when the lane is empty; it is clamped up to
    /// `ITEM_SPACING` on a non-empty lane.
    pub fn append_item(&mut self, mut offset: LineDist, item: ItemId) {
        if offset < ITEM_SPACING && !self.items.is_empty() {
            offset = ITEM_SPACING;
        }

        self.items.push_back(ConveyorItem { dist: offset, item });
        self.back_item_distance += offset;
    }

    /// Insert at an absolute offset from the head, rewriting the follower's
    /// stored distance to remain a gap.
    pub fn insert_item(&mut self, offset: LineDist, item: ItemId, extra: i32) {
        let mut target_offset = offset + LineDist::from_tiles(extra as i64);
        debug_assert!(!target_offset.is_negative());

        let mut counter_offset = LineDist::ZERO;

        for i in 0..self.items.len() {
            counter_offset += self.items[i].dist;

            // Ends at the item the new one is inserted ahead of
            if counter_offset > target_offset {
                counter_offset -= self.items[i].dist;

                // Make insert offset relative to the previous item, and the
                // following item relative to the newly inserted one
                target_offset -= counter_offset;
                self.items[i].dist -= target_offset;

                debug_assert!(!target_offset.is_negative());
                self.items.insert(i, ConveyorItem { dist: target_offset, item });
                return;
            }
        }

        // No item lies past the target offset, insert at back
        self.back_item_distance = target_offset;
        target_offset -= counter_offset;

        debug_assert!(!target_offset.is_negative());
        self.items.push_back(ConveyorItem { dist: target_offset, item });
    }

    /// `can_insert` then `insert_item`. Reactivates an inactive lane.
    pub fn try_insert_item(&mut self, offset: LineDist, item: ItemId, extra: i32) -> bool {
        if !self.can_insert(offset, extra) {
            return false;
        }

        if !self.is_active() {
            self.index = 0;
        }

        self.insert_item(offset, item, extra);
        true
    }

    /// Locate the item whose head-relative position lies within `epsilon`
    /// of `offset`. At most one can match since no two items are closer
    /// than an item width.
    pub fn get_item(&self, offset: LineDist, epsilon: LineDist) -> Option<(usize, ConveyorItem)> {
        let lower_bound = offset - epsilon;
        let upper_bound = offset + epsilon;

        let mut offset_counter = LineDist::ZERO;

        for (i, item) in self.items.iter().enumerate() {
            offset_counter += item.dist;

            if offset_counter >= lower_bound {
                if offset_counter <= upper_bound {
                    return Some((i, *item));
                }
                return None;
            }
        }

        None
    }

    /// `get_item` then erase, folding the erased gap into the follower.
    pub fn try_pop_item(&mut self, offset: LineDist, epsilon: LineDist) -> Option<ItemId> {
        let (i, _) = self.get_item(offset, epsilon)?;
        Some(self.remove_item(i).item)
    }

    /// Erase by deque index, preserving every other item's position.
    pub fn remove_item(&mut self, i: usize) -> ConveyorItem {
        let removed = self.items.remove(i).expect("lane item index out of range");
        if let Some(follower) = self.items.get_mut(i) {
            follower.dist += removed.dist;
        } else {
            // No follower absorbs the gap, so the cached tail distance
            // shrinks instead
            self.back_item_distance -= removed.dist;
        }
        removed
    }

    /// Sum of stored distances. Equals `back_item_distance` whenever the
    /// lane is consistent.
    pub fn distances_sum(&self) -> LineDist {
        self.items.iter().map(|i| i.dist).sum()
    }

    pub fn is_consistent(&self) -> bool {
        self.distances_sum() == self.back_item_distance
    }
}


/// A run of consecutive conveyor tiles moving in one direction.
#[derive(Debug)]
pub struct ConveyorSegment {
    /// Direction items travel in.
    pub direction: Orientation,
    /// How the belt terminates.
    pub termination: Termination,
    /// Length in tiles.
    pub length: u16,

    pub left: ConveyorLane,
    pub right: ConveyorLane,

    /// Offset applied to stored struct indices.
    ///
    /// Increments when the segment is extended from the head, decrements
    /// when it is shortened from the head; unaffected by tail growth.
    /// Entities which store an offset into the segment apply it so the
    /// same stored offset keeps denoting the same world position as the
    /// head moves.
    pub head_offset: i32,

    /// Segment the head feeds into.
    pub target: Option<SegmentRef>,

    /// Offset into `target` where this segment connects, stored when the
    /// target is set: the target tile's struct index plus the target's
    /// head offset at connection time.
    pub target_insert_offset: i32,
}

impl ConveyorSegment {
    pub fn new(direction: Orientation, termination: Termination, length: u16) -> Self {
        ConveyorSegment {
            direction,
            termination,
            length,
            left: ConveyorLane::new(),
            right: ConveyorLane::new(),
            head_offset: 0,
            target: None,
            target_insert_offset: 0,
        }
    }

    pub fn new_ref(direction: Orientation, termination: Termination, length: u16) -> SegmentRef {
        Rc::new(RefCell::new(Self::new(direction, termination, length)))
    }

    pub fn lane(&self, side: Side) -> &ConveyorLane {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn lane_mut(&mut self, side: Side) -> &mut ConveyorLane {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn is_active(&self, side: Side) -> bool {
        self.lane(side).is_active()
    }

    /// Effective lane length: tile length minus what the termination
    /// shaves off this side.
    pub fn lane_length(&self, side: Side) -> LineDist {
        LineDist::from_tiles(self.length as i64) - lane_reduction(side, self.termination)
    }

    pub fn can_insert(&self, side: Side, offset: LineDist) -> bool {
        self.lane(side).can_insert(offset, 0)
    }

    /// Append onto a side behind its last item.
    pub fn append_item(&mut self, side: Side, offset: LineDist, item: ItemId) {
        self.lane_mut(side).append_item(offset, item);
    }

    /// Insert at an offset from the head of the segment.
    pub fn insert_item(&mut self, side: Side, offset: LineDist, item: ItemId) {
        self.lane_mut(side).insert_item(offset, item, 0);
    }

    pub fn try_insert_item(&mut self, side: Side, offset: LineDist, item: ItemId) -> bool {
        self.lane_mut(side).try_insert_item(offset, item, 0)
    }

    pub fn get_item(&self, side: Side, offset: LineDist) -> Option<(usize, ConveyorItem)> {
        self.lane(side).get_item(offset, ITEM_EPSILON)
    }

    pub fn get_item_within(
        &self,
        side: Side,
        offset: LineDist,
        epsilon: LineDist,
    ) -> Option<(usize, ConveyorItem)> {
        self.lane(side).get_item(offset, epsilon)
    }

    pub fn try_pop_item(&mut self, side: Side, offset: LineDist) -> Option<ItemId> {
        self.lane_mut(side).try_pop_item(offset, ITEM_EPSILON)
    }

    pub fn try_pop_item_within(
        &mut self,
        side: Side,
        offset: LineDist,
        epsilon: LineDist,
    ) -> Option<ItemId> {
        self.lane_mut(side).try_pop_item(offset, epsilon)
    }

    // Absolute variants: the same stored offset refers to the same world
    // location regardless of how the head has moved since it was stored.

    pub fn offset_abs_index(&self, val: i32) -> i32 {
        val + self.head_offset
    }

    pub fn offset_abs(&self, val: LineDist) -> LineDist {
        val + LineDist::from_tiles(self.head_offset as i64)
    }

    pub fn can_insert_abs(&self, side: Side, offset: LineDist) -> bool {
        self.lane(side).can_insert(offset, self.head_offset)
    }

    pub fn insert_item_abs(&mut self, side: Side, offset: LineDist, item: ItemId) {
        let head_offset = self.head_offset;
        self.lane_mut(side).insert_item(offset, item, head_offset);
    }

    pub fn try_insert_item_abs(&mut self, side: Side, offset: LineDist, item: ItemId) -> bool {
        let head_offset = self.head_offset;
        self.lane_mut(side).try_insert_item(offset, item, head_offset)
    }

    /// Whether both lanes' cached tail distances agree with their items.
    pub fn is_consistent(&self) -> bool {
        self.left.is_consistent() && self.right.is_consistent()
    }
}


/// Per-tile unique data of a conveyor.
#[derive(Debug, Clone)]
pub struct ConveyorData {
    /// Segment this tile belongs to, shared with every other tile of the
    /// run and with upstream segments targeting it.
    pub structure: SegmentRef,
    /// Position of this tile along the segment, 0 at the head.
    pub struct_index: u16,
    /// Cached render orientation.
    pub line_orientation: LineOrientation,
}

impl ConveyorData {
    pub fn new(structure: SegmentRef) -> Self {
        ConveyorData {
            structure,
            struct_index: 0,
            line_orientation: LineOrientation::default(),
        }
    }
}


/// Unique data of a splitter: two parallel conveyors plus the staging flag
/// for cross-lane exchange.
#[derive(Debug)]
pub struct SplitterData {
    /// Conveyor on the orientation's left hand.
    pub left: ConveyorData,
    /// Conveyor on the orientation's right hand.
    pub right: ConveyorData,
    pub orientation: Orientation,
    /// Set when a swap was staged last tick; cleared after it resolves.
    pub swap: bool,
}
