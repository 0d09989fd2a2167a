//! Spatial primitives for a chunked 2-D tile world.
//!
//! ## tiles, world coordinates
//!
//! The world is a grid of _tiles_ extending indefinitely in all directions.
//! A tile is globally identified by a _world coordinate_, a 2-vec of signed
//! integers. Positive x heads right, positive y heads down.
//!
//! ## chunks, chunk coordinates
//!
//! Tiles are grouped into _chunks_ of 32 by 32 tiles. A chunk is globally
//! identified by a _chunk coordinate_, a 2-vec of signed integers wherein
//! the area occupied by that chunk starts at 32 times those coordinates.
//! Chunks are generated lazily; the absence of a chunk is distinct from an
//! empty chunk.
//!
//! ## orientation
//!
//! Entities face one of four cardinal directions, encoded so that
//! `invert(o) == (o + 2) % 4`. Facing up decreases y.


mod coord;
mod orientation;


pub use self::{
    coord::{
        CHUNK_WIDTH,
        CHUNK_AREA,
        WorldCoord,
        ChunkCoord,
        world_to_chunk,
        chunk_to_world,
        world_to_local,
        local_tile_index,
    },
    orientation::{
        NUM_ORIENTATIONS,
        ORIENTATIONS,
        Orientation,
        PerOrientation,
        advance,
    },
};
