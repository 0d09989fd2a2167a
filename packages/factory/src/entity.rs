//! Entity build/remove orchestration and per-kind event routing.
//!
//! `build` and `remove` are the two funnels through which every world
//! edit flows: place or clear the tile region, run the kind-specific
//! topology work, then wake the neighborhood and any registered update
//! listeners.

use crate::{
    logic::{
        conveyor_utility,
        deferral_timer::FiredDeferral,
        splitter,
    },
    proto::{
        ProtoId,
        ProtoKind,
        ProtoRegistry,
    },
    world::{
        chunk::TileLayerKind,
        update_dispatcher::{
            PendingUpdate,
            UpdateKind,
        },
        PlaceError,
        World,
    },
};
use tile_data::{
    advance,
    Orientation,
    WorldCoord,
    ORIENTATIONS,
};
use vek::*;


/// Build an entity at a coordinate (its top-left for multi-tile kinds).
pub fn build(
    world: &mut World,
    protos: &ProtoRegistry,
    coord: WorldCoord,
    proto: ProtoId,
    orientation: Orientation,
) -> Result<(), PlaceError> {
    world.place(protos, coord, orientation, Some(proto))?;

    match protos.get(proto).kind {
        ProtoKind::Conveyor { .. } => conveyor_utility::build_conveyor(world, coord, orientation),
        ProtoKind::Splitter { .. } => splitter::build_splitter(world, coord, orientation),
        _ => {}
    }

    let span = protos.get(proto).rotated_span(orientation);
    neighbor_update_region(world, protos, coord, span);
    world.update_dispatch(protos, coord, UpdateKind::Place);
    Ok(())
}

/// Remove the entity covering a coordinate. Returns false if there was
/// none.
pub fn remove(world: &mut World, protos: &ProtoRegistry, coord: WorldCoord) -> bool {
    let Some((tl_coord, layer)) = world.layer_top_left(coord, TileLayerKind::Entity) else {
        return false;
    };
    let Some(proto) = layer.proto else {
        return false;
    };
    let span = layer.span;

    match protos.get(proto).kind {
        // Conveyor teardown keys off the exact removed tile
        ProtoKind::Conveyor { .. } => conveyor_utility::remove_conveyor(world, coord),
        ProtoKind::Splitter { .. } => splitter::remove_splitter(world, tl_coord),
        _ => {}
    }

    world
        .place(protos, tl_coord, Orientation::Up, None)
        .expect("erasing a region cannot fail");

    neighbor_update_region(world, protos, tl_coord, span);
    world.update_dispatch(protos, tl_coord, UpdateKind::Remove);
    true
}

/// Notify every tile bordering a region that the region changed.
fn neighbor_update_region(
    world: &mut World,
    protos: &ProtoRegistry,
    tl_coord: WorldCoord,
    span: Extent2<u8>,
) {
    let inside = |c: WorldCoord| {
        c.x >= tl_coord.x
            && c.x < tl_coord.x + span.w as i32
            && c.y >= tl_coord.y
            && c.y < tl_coord.y + span.h as i32
    };

    for dy in 0..span.h as i32 {
        for dx in 0..span.w as i32 {
            let covered = tl_coord + Vec2::new(dx, dy);
            for orientation in ORIENTATIONS {
                let neighbor = advance(covered, orientation, 1);
                if !inside(neighbor) {
                    on_neighbor_update(world, protos, covered, neighbor);
                }
            }
        }
    }
}

/// An adjacent tile changed; let the entity at `receive_coord` react.
pub fn on_neighbor_update(
    world: &mut World,
    protos: &ProtoRegistry,
    emit_coord: WorldCoord,
    receive_coord: WorldCoord,
) {
    let Some((_, layer)) = world.layer_top_left(receive_coord, TileLayerKind::Entity) else {
        return;
    };
    let Some(proto) = layer.proto else {
        return;
    };

    match protos.get(proto).kind {
        ProtoKind::Conveyor { .. } | ProtoKind::Splitter { .. } => {
            conveyor_utility::conveyor_on_neighbor_update(world, emit_coord, receive_coord);
        }
        _ => {}
    }
}

/// Route one update-dispatcher invocation to its listener's behavior.
pub fn on_tile_update(world: &mut World, protos: &ProtoRegistry, pending: PendingUpdate) {
    let Some(listener) = protos.try_get(pending.listener) else {
        warn!(listener = ?pending.listener, "update listener with unknown prototype");
        return;
    };

    match listener.kind {
        ProtoKind::Conveyor { .. } | ProtoKind::Splitter { .. } => {
            conveyor_utility::conveyor_on_neighbor_update(world, pending.emitter, pending.receiver);
        }
        _ => {}
    }
}

/// Per-tile hook fired after a world finishes loading, once multi-tile
/// back-links are resolved. Conveyors re-link their targets here; they
/// are identity references and are not persisted.
pub fn on_deserialize(world: &mut World, protos: &ProtoRegistry, coord: WorldCoord) {
    let Some(layer) = world.layer(coord, TileLayerKind::Entity) else {
        return;
    };
    let Some(proto) = layer.proto else {
        return;
    };
    let orientation = layer.orientation;

    match protos.get(proto).kind {
        ProtoKind::Conveyor { .. } => conveyor_utility::conveyor_neighbor_connect(world, coord),
        ProtoKind::Splitter { .. } => {
            let (left_coord, right_coord) = splitter::splitter_tile_coords(coord, orientation);
            conveyor_utility::conveyor_neighbor_connect(world, left_coord);
            conveyor_utility::conveyor_neighbor_connect(world, right_coord);
        }
        _ => {}
    }
}

/// Route a fired deferral to its prototype's behavior. No core entity
/// kind schedules deferrals; external prototypes hook in here.
pub fn on_defer_elapsed(_world: &mut World, protos: &ProtoRegistry, fired: FiredDeferral) {
    match protos.try_get(fired.proto).map(|p| &p.kind) {
        None => warn!(proto = ?fired.proto, "deferral for unknown prototype"),
        Some(_) => trace!(coord = ?fired.coord, "deferral elapsed"),
    }
}
