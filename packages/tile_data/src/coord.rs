//! Coordinate conversions between world, chunk, and chunk-local space.

use vek::*;


/// Width of a chunk in tiles, both axes.
pub const CHUNK_WIDTH: i32 = 32;

/// Number of tiles in a chunk.
pub const CHUNK_AREA: usize = (CHUNK_WIDTH * CHUNK_WIDTH) as usize;


/// Coordinate of a tile in the world.
pub type WorldCoord = Vec2<i32>;

/// Coordinate of a chunk in the world.
pub type ChunkCoord = Vec2<i32>;


/// Get the chunk coordinate containing a world coordinate.
pub fn world_to_chunk(coord: WorldCoord) -> ChunkCoord {
    Vec2 {
        x: coord.x.div_euclid(CHUNK_WIDTH),
        y: coord.y.div_euclid(CHUNK_WIDTH),
    }
}

/// Get the world coordinate of a chunk's first (top-left) tile.
pub fn chunk_to_world(cc: ChunkCoord) -> WorldCoord {
    cc * CHUNK_WIDTH
}

/// Get the chunk-local part of a world coordinate.
///
/// Components are within `0..CHUNK_WIDTH`.
pub fn world_to_local(coord: WorldCoord) -> Vec2<i32> {
    Vec2 {
        x: coord.x.rem_euclid(CHUNK_WIDTH),
        y: coord.y.rem_euclid(CHUNK_WIDTH),
    }
}

/// Convert a chunk-local coordinate into a row-major index into a chunk's
/// tile array.
pub fn local_tile_index(local: Vec2<i32>) -> usize {
    debug_assert!(local.x >= 0 && local.x < CHUNK_WIDTH);
    debug_assert!(local.y >= 0 && local.y < CHUNK_WIDTH);
    (local.y * CHUNK_WIDTH + local.x) as usize
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_chunk_round_trip() {
        for x in -70..70 {
            for y in -70..70 {
                let c = Vec2::new(x, y);
                let cc = world_to_chunk(c);
                let local = world_to_local(c);
                assert_eq!(chunk_to_world(cc) + local, c);
            }
        }
    }

    #[test]
    fn test_negative_coords_floor() {
        assert_eq!(world_to_chunk(Vec2::new(-1, -1)), Vec2::new(-1, -1));
        assert_eq!(world_to_chunk(Vec2::new(-32, 0)), Vec2::new(-1, 0));
        assert_eq!(world_to_chunk(Vec2::new(-33, 31)), Vec2::new(-2, 0));
        assert_eq!(world_to_local(Vec2::new(-1, -33)), Vec2::new(31, 31));
    }

    #[test]
    fn test_local_tile_index_covers_chunk() {
        let mut seen = vec![false; CHUNK_AREA];
        for y in 0..CHUNK_WIDTH {
            for x in 0..CHUNK_WIDTH {
                let i = local_tile_index(Vec2::new(x, y));
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
        assert!(seen.into_iter().all(|b| b));
    }
}
