//! Shared fixtures for the test suites.

use crate::{
    decimal::LineDist,
    logic::conveyor_struct::{
        ConveyorData,
        SegmentRef,
    },
    proto::{
        ItemDef,
        ItemId,
        ProtoId,
        ProtoKind,
        Prototype,
        SpriteId,
        UniqueData,
    },
    world::{
        chunk::{
            LogicGroup,
            TileLayerKind,
        },
        World,
    },
    ItemRegistry,
    ProtoRegistry,
};
use std::{
    cell::RefCell,
    rc::Rc,
};
use tile_data::{
    Orientation,
    WorldCoord,
    CHUNK_WIDTH,
};
use vek::*;


/// A world with one land-covered chunk at (0, 0) plus a minimal registry:
/// land/water terrain, a transport belt, a splitter, a chest, a machine,
/// and one item.
pub struct TestCtx {
    pub world: World,
    pub protos: ProtoRegistry,
    pub items: ItemRegistry,
    pub land: ProtoId,
    pub water: ProtoId,
    pub belt: ProtoId,
    pub splitter: ProtoId,
    pub chest: ProtoId,
    pub machine: ProtoId,
    pub item: ItemId,
}

impl TestCtx {
    pub fn new() -> Self {
        let mut protos = ProtoRegistry::new();
        let land = protos.register(Prototype {
            name: "land".into(),
            span: Extent2::new(1, 1),
            sprite: SpriteId(0),
            kind: ProtoKind::Terrain { passable: true },
        });
        let water = protos.register(Prototype {
            name: "water".into(),
            span: Extent2::new(1, 1),
            sprite: SpriteId(1),
            kind: ProtoKind::Terrain { passable: false },
        });
        let belt = protos.register(Prototype {
            name: "transport-belt".into(),
            span: Extent2::new(1, 1),
            sprite: SpriteId(2),
            kind: ProtoKind::Conveyor { speed: LineDist::from_f64(0.01) },
        });
        let splitter = protos.register(Prototype {
            name: "splitter".into(),
            span: Extent2::new(2, 1),
            sprite: SpriteId(3),
            kind: ProtoKind::Splitter { speed: LineDist::from_f64(0.01) },
        });
        let chest = protos.register(Prototype {
            name: "chest".into(),
            span: Extent2::new(1, 1),
            sprite: SpriteId(4),
            kind: ProtoKind::Structure,
        });
        let machine = protos.register(Prototype {
            name: "machine".into(),
            span: Extent2::new(3, 2),
            sprite: SpriteId(5),
            kind: ProtoKind::Structure,
        });

        let mut items = ItemRegistry::new();
        let item = items.register(ItemDef { name: "iron-plate".into(), sprite: SpriteId(6) });

        let mut world = World::new();
        world.emplace_chunk(Vec2::new(0, 0)).unwrap();
        for y in 0..CHUNK_WIDTH {
            for x in 0..CHUNK_WIDTH {
                world.set_prototype(
                    Vec2::new(x, y),
                    TileLayerKind::Base,
                    Orientation::Up,
                    Some(land),
                );
            }
        }

        TestCtx { world, protos, items, land, water, belt, splitter, chest, machine, item }
    }

    /// Cover another chunk with land.
    pub fn add_land_chunk(&mut self, cc: Vec2<i32>) {
        self.world.emplace_chunk(cc).unwrap();
        let base = tile_data::chunk_to_world(cc);
        for y in 0..CHUNK_WIDTH {
            for x in 0..CHUNK_WIDTH {
                self.world.set_prototype(
                    base + Vec2::new(x, y),
                    TileLayerKind::Base,
                    Orientation::Up,
                    Some(self.land),
                );
            }
        }
    }

    /// Build a belt through the full edit path.
    pub fn build_belt(&mut self, coord: WorldCoord, orientation: Orientation) {
        crate::entity::build(&mut self.world, &self.protos, coord, self.belt, orientation)
            .expect("belt placement failed");
    }

    /// Remove whatever entity covers `coord`.
    pub fn remove_entity(&mut self, coord: WorldCoord) {
        assert!(crate::entity::remove(&mut self.world, &self.protos, coord));
    }

    /// Attach a pre-built segment to a belt tile, the low-level harness
    /// used by the controller tests: prototype, unique data, and a logic
    /// registration, with no topology side effects.
    pub fn create_segment(&mut self, coord: WorldCoord, structure: &SegmentRef) {
        let layer = self
            .world
            .layer_mut(coord, TileLayerKind::Entity)
            .expect("segment outside generated chunks");
        layer.proto = Some(self.belt);
        layer.orientation = structure.borrow().direction;
        layer.unique = Some(Rc::new(RefCell::new(UniqueData::Conveyor(ConveyorData::new(
            structure.clone(),
        )))));
        self.world.logic_register(LogicGroup::Conveyor, coord, TileLayerKind::Entity);
    }

    /// Change the registered belt speed (tiles per tick).
    pub fn set_belt_speed(&mut self, speed: f64) {
        let belt = self.belt;
        self.set_speed_of(belt, speed);
        let splitter = self.splitter;
        self.set_speed_of(splitter, speed);
    }

    fn set_speed_of(&mut self, id: ProtoId, speed: f64) {
        // Registries are immutable at runtime; tests rebuild the one
        // entry instead
        let mut rebuilt = ProtoRegistry::new();
        for i in 0..self.protos.len() {
            let mut proto = self.protos.get(ProtoId(i as u32)).clone();
            if ProtoId(i as u32) == id {
                proto.kind = match proto.kind {
                    ProtoKind::Conveyor { .. } => {
                        ProtoKind::Conveyor { speed: LineDist::from_f64(speed) }
                    }
                    ProtoKind::Splitter { .. } => {
                        ProtoKind::Splitter { speed: LineDist::from_f64(speed) }
                    }
                    other => other,
                };
            }
            rebuilt.register(proto);
        }
        self.protos = rebuilt;
    }
}
