//! Factory-automation simulation core.
//!
//! The heart of the crate is the conveyor belt engine: a chunked 2-D tile
//! world carrying a dynamic graph of two-lane belt segments, advanced by
//! a deterministic tick loop. Player edits flow through `entity::build` /
//! `entity::remove`, which keep the segment graph consistent; each call
//! to `Logic::update` performs one tick over every registered segment.
//!
//! The engine owns no game content: prototype and item registries are
//! handed in by reference (see `proto`), and rendering, input, and
//! non-conveyor entity behavior live outside, interacting with belts
//! through the public lane interface.

#[macro_use]
extern crate tracing;

pub mod decimal;
pub mod entity;
pub mod logging;
pub mod logic;
pub mod proto;
pub mod save;
pub mod world;

#[cfg(test)]
mod test_util;

pub use self::{
    decimal::LineDist,
    logic::{
        conveyor_prop::{
            LineOrientation,
            Side,
        },
        conveyor_struct::{
            ConveyorData,
            ConveyorItem,
            ConveyorLane,
            ConveyorSegment,
            SegmentRef,
            SplitterData,
            Termination,
        },
        deferral_timer::{
            DeferralTimer,
            GameTick,
        },
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
            LogicGroup,
            TileLayerKind,
        },
        update_dispatcher::UpdateKind,
        PlaceError,
        World,
    },
};
