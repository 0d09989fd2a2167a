//! Conveyor geometry data: item sizes, bend reductions, and the line
//! orientation table. Everything "bend physics" lives here and nowhere
//! else.

use crate::{
    decimal::LineDist,
    logic::conveyor_struct::Termination,
};
use serde::{
    Deserialize,
    Serialize,
};
use tile_data::{
    Orientation,
    PerOrientation,
};


// Placement of items across a conveyor tile (decimal fractions of a tile):
//
// | R padding                                        0.0
// -------------------------------------------------- 0.1
// <<<<<< center of R item <<<<<<<<<<<<<<<<<<<<<<<<<< 0.3
// ====== center of belt ============================ 0.5
// <<<<<< center of L item <<<<<<<<<<<<<<<<<<<<<<<<<< 0.7
// -------------------------------------------------- 0.9
// | L padding                                        1.0

/// Width of one item on a belt, in tiles.
pub const ITEM_WIDTH: LineDist = LineDist::from_raw(4_000);

/// Gap between item fronts when a lane is fully compressed, in tiles.
pub const ITEM_SPACING: LineDist = LineDist::from_raw(2_500);

/// Default search epsilon for locating an item at an offset.
pub const ITEM_EPSILON: LineDist = LineDist::from_raw(2_000);

/// Distance from a splitter's rear within which items may swap lanes.
/// Keeps items from swapping while still in view of the previous tile.
pub const SPLITTER_THRESHOLD: LineDist = LineDist::from_raw(2_500);

// When bending, these amounts are deducted from the distance to the end of
// the next segment:
//
// === 0.7 ===
// =0.3=
//     ------------------------->
//     ^         *
//     |    -------------------->
//     |    ^    *
//     |    |    *
//     |    |    *

pub const BEND_LEFT_L_REDUCTION: LineDist = LineDist::from_raw(7_000);
pub const BEND_LEFT_R_REDUCTION: LineDist = LineDist::from_raw(3_000);

pub const BEND_RIGHT_L_REDUCTION: LineDist = LineDist::from_raw(3_000);
pub const BEND_RIGHT_R_REDUCTION: LineDist = LineDist::from_raw(7_000);

pub const TARGET_SIDE_ONLY_REDUCTION: LineDist = LineDist::from_raw(7_000);


/// One of the two parallel streams of a segment, named relative to the
/// direction of travel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Both sides, iteration order left then right.
pub const SIDES: [Side; 2] = [Side::Left, Side::Right];

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}


/// Length a termination shaves off a lane, relative to the segment's tile
/// length. Side-only terminations curve like the corresponding bend.
pub fn lane_reduction(side: Side, termination: Termination) -> LineDist {
    match (side, termination) {
        (_, Termination::Straight) => LineDist::ZERO,
        (Side::Left, Termination::BendLeft | Termination::LeftOnly(_)) => BEND_LEFT_L_REDUCTION,
        (Side::Right, Termination::BendLeft | Termination::LeftOnly(_)) => BEND_LEFT_R_REDUCTION,
        (Side::Left, Termination::BendRight | Termination::RightOnly(_)) => BEND_RIGHT_L_REDUCTION,
        (Side::Right, Termination::BendRight | Termination::RightOnly(_)) => BEND_RIGHT_R_REDUCTION,
    }
}

/// Extra deduction contributed by the *target* segment's termination,
/// evaluated for the lane the item lands in.
fn target_reduction(receiving_side: Side, termination: Termination) -> LineDist {
    match termination {
        Termination::Straight => LineDist::ZERO,
        Termination::BendLeft | Termination::BendRight => {
            lane_reduction(receiving_side, termination)
        }
        Termination::LeftOnly(_) | Termination::RightOnly(_) => TARGET_SIDE_ONLY_REDUCTION,
    }
}

/// Total deduction applied when the head of a lane crosses into a target:
/// the source lane's own reduction plus the target's, the latter measured
/// on whichever of the target's lanes actually receives the item.
pub fn termination_deduction(
    side: Side,
    termination: Termination,
    target_termination: Termination,
) -> LineDist {
    let receiving_side = match termination {
        Termination::LeftOnly(_) => Side::Left,
        Termination::RightOnly(_) => Side::Right,
        _ => side,
    };
    lane_reduction(side, termination) + target_reduction(receiving_side, target_termination)
}


/// Cached render orientation of a conveyor tile: its direction of travel
/// combined with how neighbors curve into it. `UpRight` is a right-moving
/// tile fed from below by an up-moving belt, and so on.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum LineOrientation {
    #[default]
    Up = 0,
    RightUp,
    LeftUp,
    Right,
    UpRight,
    DownRight,
    Down,
    RightDown,
    LeftDown,
    Left,
    UpLeft,
    DownLeft,
}

impl LineOrientation {
    /// The underlying direction of travel.
    pub fn direction(self) -> Orientation {
        use LineOrientation::*;
        match self {
            Up | RightUp | LeftUp => Orientation::Up,
            Right | UpRight | DownRight => Orientation::Right,
            Down | RightDown | LeftDown => Orientation::Down,
            Left | UpLeft | DownLeft => Orientation::Left,
        }
    }

    pub fn from_u8(n: u8) -> Option<Self> {
        use LineOrientation::*;
        [
            Up, RightUp, LeftUp, Right, UpRight, DownRight, Down, RightDown, LeftDown, Left,
            UpLeft, DownLeft,
        ]
        .get(n as usize)
        .copied()
    }
}

/// Compute the line orientation for a conveyor moving `direction`, given
/// the directions of the conveyors on its four sides (indexed by which
/// side of this tile the neighbor is on).
///
/// A tile curves when it has exactly one perpendicular input and no
/// straight one.
pub fn line_orientation(
    direction: Orientation,
    neighbors: PerOrientation<Option<Orientation>>,
) -> LineOrientation {
    let feeds = |side: Orientation, wanted: Orientation| neighbors[side] == Some(wanted);

    match direction {
        Orientation::Up => {
            if !feeds(Orientation::Down, Orientation::Up)
                && feeds(Orientation::Left, Orientation::Right)
                    != feeds(Orientation::Right, Orientation::Left)
            {
                if feeds(Orientation::Left, Orientation::Right) {
                    LineOrientation::RightUp
                } else {
                    LineOrientation::LeftUp
                }
            } else {
                LineOrientation::Up
            }
        }
        Orientation::Right => {
            if !feeds(Orientation::Left, Orientation::Right)
                && feeds(Orientation::Up, Orientation::Down)
                    != feeds(Orientation::Down, Orientation::Up)
            {
                if feeds(Orientation::Up, Orientation::Down) {
                    LineOrientation::DownRight
                } else {
                    LineOrientation::UpRight
                }
            } else {
                LineOrientation::Right
            }
        }
        Orientation::Down => {
            if !feeds(Orientation::Up, Orientation::Down)
                && feeds(Orientation::Left, Orientation::Right)
                    != feeds(Orientation::Right, Orientation::Left)
            {
                if feeds(Orientation::Left, Orientation::Right) {
                    LineOrientation::RightDown
                } else {
                    LineOrientation::LeftDown
                }
            } else {
                LineOrientation::Down
            }
        }
        Orientation::Left => {
            if !feeds(Orientation::Right, Orientation::Left)
                && feeds(Orientation::Up, Orientation::Down)
                    != feeds(Orientation::Down, Orientation::Up)
            {
                if feeds(Orientation::Up, Orientation::Down) {
                    LineOrientation::DownLeft
                } else {
                    LineOrientation::UpLeft
                }
            } else {
                LineOrientation::Left
            }
        }
    }
}
