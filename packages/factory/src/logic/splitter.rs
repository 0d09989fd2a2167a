//! Splitter topology: two parallel conveyor structures behind one entity.

use crate::{
    logic::{
        conveyor_struct::{
            ConveyorData,
            ConveyorSegment,
            SplitterData,
            Termination,
        },
        conveyor_utility::{
            conveyor_neighbor_connect,
            conveyor_neighbor_disconnect,
            conveyor_update_neighbor_line_orien,
            conveyor_update_neighbor_termination,
            splitter_left_coord,
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
use std::{
    cell::RefCell,
    rc::Rc,
};
use tile_data::{
    advance,
    Orientation,
    WorldCoord,
};


/// The two tile coordinates of a splitter, (left hand, right hand).
pub fn splitter_tile_coords(
    tl_coord: WorldCoord,
    orientation: Orientation,
) -> (WorldCoord, WorldCoord) {
    let left = splitter_left_coord(tl_coord, orientation);
    let right = match orientation {
        Orientation::Up | Orientation::Right => other_splitter_tile(tl_coord, orientation),
        Orientation::Down | Orientation::Left => tl_coord,
    };
    (left, right)
}

fn other_splitter_tile(tl_coord: WorldCoord, orientation: Orientation) -> WorldCoord {
    match orientation {
        Orientation::Up | Orientation::Down => advance(tl_coord, Orientation::Right, 1),
        Orientation::Left | Orientation::Right => advance(tl_coord, Orientation::Down, 1),
    }
}

/// Create both conveyor structures for a placed splitter and wire them
/// into the neighborhood.
///
/// Each half is its own length-1 segment; belts before and after a
/// splitter connect to it through targets, they never share a structure
/// with it. One logic entry in the splitter group drives both halves.
pub fn build_splitter(world: &mut World, tl_coord: WorldCoord, orientation: Orientation) {
    let left = ConveyorData::new(ConveyorSegment::new_ref(
        orientation,
        Termination::Straight,
        1,
    ));
    let right = ConveyorData::new(ConveyorSegment::new_ref(
        orientation,
        Termination::Straight,
        1,
    ));

    let layer = world
        .layer_mut(tl_coord, TileLayerKind::Entity)
        .expect("splitter built on an ungenerated chunk");
    layer.unique = Some(Rc::new(RefCell::new(UniqueData::Splitter(SplitterData {
        left,
        right,
        orientation,
        swap: false,
    }))));

    world.logic_register(LogicGroup::Splitter, tl_coord, TileLayerKind::Entity);

    let (left_coord, right_coord) = splitter_tile_coords(tl_coord, orientation);
    for coord in [left_coord, right_coord] {
        conveyor_neighbor_connect(world, coord);
        conveyor_update_neighbor_termination(world, coord);
        conveyor_update_neighbor_line_orien(world, coord);
    }
    debug!(?tl_coord, ?orientation, "splitter built");
}

/// Tear a splitter back out: detach every feeder from its structures and
/// drop its logic entry. The structures die with the tile data.
pub fn remove_splitter(world: &mut World, tl_coord: WorldCoord) {
    let Some(cell) = world.get_unique(tl_coord, TileLayerKind::Entity) else {
        return;
    };
    let orientation = match &*cell.borrow() {
        UniqueData::Splitter(data) => data.orientation,
        _ => return,
    };

    let (left_coord, right_coord) = splitter_tile_coords(tl_coord, orientation);
    for coord in [left_coord, right_coord] {
        conveyor_neighbor_disconnect(world, coord);
        conveyor_update_neighbor_line_orien(world, coord);
    }

    world.logic_remove(LogicGroup::Splitter, tl_coord, TileLayerKind::Entity);
    debug!(?tl_coord, "splitter removed");
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity,
        logic::conveyor_utility::get_con_data,
        test_util::TestCtx,
    };
    use std::rc::Rc;
    use vek::Vec2;

    #[test]
    fn test_tile_coords_by_orientation() {
        let tl = Vec2::new(4, 4);
        assert_eq!(
            splitter_tile_coords(tl, Orientation::Up),
            (Vec2::new(4, 4), Vec2::new(5, 4)),
        );
        assert_eq!(
            splitter_tile_coords(tl, Orientation::Down),
            (Vec2::new(5, 4), Vec2::new(4, 4)),
        );
        assert_eq!(
            splitter_tile_coords(tl, Orientation::Right),
            (Vec2::new(4, 4), Vec2::new(4, 5)),
        );
        assert_eq!(
            splitter_tile_coords(tl, Orientation::Left),
            (Vec2::new(4, 5), Vec2::new(4, 4)),
        );
    }

    #[test]
    fn test_build_connects_both_halves() {
        // v v
        // C C  splitter facing down
        // < >
        let mut ctx = TestCtx::new();
        ctx.build_belt(Vec2::new(0, 0), Orientation::Down);
        ctx.build_belt(Vec2::new(1, 0), Orientation::Down);
        ctx.build_belt(Vec2::new(0, 2), Orientation::Left);
        ctx.build_belt(Vec2::new(1, 2), Orientation::Right);

        entity::build(
            &mut ctx.world,
            &ctx.protos,
            Vec2::new(0, 1),
            ctx.splitter,
            Orientation::Down,
        )
        .unwrap();

        // Facing down, the left half sits on the +x column
        let left_half = get_con_data(&ctx.world, Vec2::new(1, 1)).unwrap().structure();
        let right_half = get_con_data(&ctx.world, Vec2::new(0, 1)).unwrap().structure();
        assert!(!Rc::ptr_eq(&left_half, &right_half));

        let top_left = get_con_data(&ctx.world, Vec2::new(0, 0)).unwrap().structure();
        let top_right = get_con_data(&ctx.world, Vec2::new(1, 0)).unwrap().structure();
        let bottom_left = get_con_data(&ctx.world, Vec2::new(0, 2)).unwrap().structure();
        let bottom_right = get_con_data(&ctx.world, Vec2::new(1, 2)).unwrap().structure();

        // Belts above feed the halves, the halves feed the belts below
        assert!(top_left.borrow().target.as_ref().is_some_and(|t| Rc::ptr_eq(t, &right_half)));
        assert!(top_right.borrow().target.as_ref().is_some_and(|t| Rc::ptr_eq(t, &left_half)));
        assert!(right_half.borrow().target.as_ref().is_some_and(|t| Rc::ptr_eq(t, &bottom_left)));
        assert!(left_half.borrow().target.as_ref().is_some_and(|t| Rc::ptr_eq(t, &bottom_right)));

        assert_eq!(ctx.world.logic_entries(LogicGroup::Splitter).len(), 1);
    }

    #[test]
    fn test_remove_detaches_feeders() {
        let mut ctx = TestCtx::new();
        ctx.build_belt(Vec2::new(0, 0), Orientation::Down);
        entity::build(
            &mut ctx.world,
            &ctx.protos,
            Vec2::new(0, 1),
            ctx.splitter,
            Orientation::Down,
        )
        .unwrap();

        let feeder = get_con_data(&ctx.world, Vec2::new(0, 0)).unwrap().structure();
        assert!(feeder.borrow().target.is_some());

        assert!(entity::remove(&mut ctx.world, &ctx.protos, Vec2::new(1, 1)));

        assert!(feeder.borrow().target.is_none());
        assert!(ctx.world.logic_entries(LogicGroup::Splitter).is_empty());
        assert!(ctx
            .world
            .layer(Vec2::new(0, 1), TileLayerKind::Entity)
            .unwrap()
            .proto
            .is_none());
        assert!(ctx
            .world
            .layer(Vec2::new(1, 1), TileLayerKind::Entity)
            .unwrap()
            .proto
            .is_none());
    }
}
