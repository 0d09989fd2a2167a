//! The simulation side of the engine: segments, their per-tick updates,
//! topology maintenance, and deferred callbacks.

pub mod conveyor_controller;
pub mod conveyor_prop;
pub mod conveyor_struct;
pub mod conveyor_utility;
pub mod deferral_timer;
pub mod splitter;

use crate::{
    entity,
    logic::deferral_timer::{
        DeferralTimer,
        GameTick,
    },
    proto::ProtoRegistry,
    world::World,
};


/// Per-world simulation state outside the world grid itself: the current
/// tick and the deferral timer.
#[derive(Debug, Default)]
pub struct Logic {
    game_tick: GameTick,
    pub deferral_timer: DeferralTimer,
}

impl Logic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game_tick(&self) -> GameTick {
        self.game_tick
    }

    pub(crate) fn set_state(&mut self, game_tick: GameTick, timer: DeferralTimer) {
        self.game_tick = game_tick;
        self.deferral_timer = timer;
    }

    /// One tick. Fixed order:
    ///
    /// 1. deferral callbacks due this tick fire, then the tick advances;
    /// 2. conveyor movement;
    /// 3. splitter movement, then splitter swap resolution;
    /// 4. conveyor transitions;
    /// 5. splitter transitions.
    ///
    /// Non-conveyor logic groups are driven by their own controllers
    /// between ticks through the public lane interface.
    ///
    /// A tick is atomic: it is a straight-line call with no suspension,
    /// and the engine assumes exclusive world access for its duration.
    pub fn update(&mut self, world: &mut World, protos: &ProtoRegistry) {
        for fired in self.deferral_timer.update(self.game_tick) {
            entity::on_defer_elapsed(world, protos, fired);
        }
        self.game_tick += 1;

        conveyor_controller::conveyor_logic_update(world, protos);
    }
}
