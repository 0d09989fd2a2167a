//! Prototype and item registries.
//!
//! The engine does not own game content. Callers hand it read-only
//! registries that resolve internal ids to prototype objects; the engine
//! stores only ids in world data, which is also what makes world state
//! serializable. Registries are plain context objects passed by reference,
//! never process globals.

use crate::{
    decimal::LineDist,
    logic::conveyor_struct::{
        ConveyorData,
        SplitterData,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use vek::*;


/// Internal id of a prototype, an index into the `ProtoRegistry`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct ProtoId(pub u32);

/// Internal id of an item, an index into the `ItemRegistry`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct ItemId(pub u32);

/// Opaque sprite handle. The engine never interprets it.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
pub struct SpriteId(pub u32);


/// What a prototype is, plus the fields the engine reads off it.
#[derive(Debug, Clone)]
pub enum ProtoKind {
    /// Ground in the base tile layer. Entities may only be built over
    /// passable terrain.
    Terrain { passable: bool },
    /// A conveyor belt tile.
    Conveyor { speed: LineDist },
    /// A splitter, occupying two parallel tiles.
    Splitter { speed: LineDist },
    /// Any other entity (machine, chest, inserter base). Opaque to the
    /// conveyor engine apart from the tiles it occupies.
    Structure,
}

/// A registered prototype.
#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: String,
    /// Tile footprint before orientation is applied.
    pub span: Extent2<u8>,
    pub sprite: SpriteId,
    pub kind: ProtoKind,
}

impl Prototype {
    /// Footprint with the orientation applied: left/right facings swap the
    /// axes.
    pub fn rotated_span(&self, orientation: tile_data::Orientation) -> Extent2<u8> {
        use tile_data::Orientation::*;
        match orientation {
            Up | Down => self.span,
            Left | Right => Extent2::new(self.span.h, self.span.w),
        }
    }

    /// Items-per-tick speed for conveyors and splitters.
    pub fn conveyor_speed(&self) -> Option<LineDist> {
        match self.kind {
            ProtoKind::Conveyor { speed } | ProtoKind::Splitter { speed } => Some(speed),
            _ => None,
        }
    }
}


/// Read-only resolution of `ProtoId`s. Built once at data-load time.
#[derive(Debug, Clone, Default)]
pub struct ProtoRegistry {
    protos: Vec<Prototype>,
}

impl ProtoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, proto: Prototype) -> ProtoId {
        let id = ProtoId(self.protos.len() as u32);
        self.protos.push(proto);
        id
    }

    /// Panics on an unknown id; world data only ever stores ids this
    /// registry handed out (loading validates with `try_get`).
    pub fn get(&self, id: ProtoId) -> &Prototype {
        &self.protos[id.0 as usize]
    }

    pub fn try_get(&self, id: ProtoId) -> Option<&Prototype> {
        self.protos.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.protos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protos.is_empty()
    }
}


/// A registered item definition. The conveyor engine moves items around
/// without ever looking inside them.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub sprite: SpriteId,
}

/// Read-only resolution of `ItemId`s.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    items: Vec<ItemDef>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, item: ItemDef) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        self.items.push(item);
        id
    }

    pub fn get(&self, id: ItemId) -> &ItemDef {
        &self.items[id.0 as usize]
    }

    pub fn contains(&self, id: ItemId) -> bool {
        (id.0 as usize) < self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}


/// Per-instance state owned by a placed entity's top-left tile layer.
///
/// Tiles hold these behind `Rc<RefCell<..>>`: the update dispatcher and
/// deferral timer refer to entity instances by coordinate instead, so the
/// tile is the only owner.
#[derive(Debug)]
pub enum UniqueData {
    Conveyor(ConveyorData),
    Splitter(SplitterData),
}

impl UniqueData {
    pub fn as_conveyor(&self) -> Option<&ConveyorData> {
        match self {
            UniqueData::Conveyor(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_conveyor_mut(&mut self) -> Option<&mut ConveyorData> {
        match self {
            UniqueData::Conveyor(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_splitter(&self) -> Option<&SplitterData> {
        match self {
            UniqueData::Splitter(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_splitter_mut(&mut self) -> Option<&mut SplitterData> {
        match self {
            UniqueData::Splitter(data) => Some(data),
            _ => None,
        }
    }
}
