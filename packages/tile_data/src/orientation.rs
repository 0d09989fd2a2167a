//! The four cardinal directions and direction-indexed storage.

use std::ops::{
    Index,
    IndexMut,
};
use vek::*;


/// Number of variants of `Orientation`.
pub const NUM_ORIENTATIONS: usize = 4;

/// All variants of `Orientation`, in encoding order.
pub const ORIENTATIONS: PerOrientation<Orientation> = PerOrientation([
    Orientation::Up,
    Orientation::Right,
    Orientation::Down,
    Orientation::Left,
]);


/// A cardinal direction.
///
/// Encoded so that the inverse of a direction is `(n + 2) % 4`. "Up"
/// decreases y.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Up = 0,
    Right,
    Down,
    Left,
}

impl Orientation {
    /// The direction facing the opposite way.
    pub const fn invert(self) -> Self {
        Self::from_u8_wrapping(self as u8 + 2)
    }

    /// The direction one quarter turn clockwise (with y heading down).
    pub const fn rotate_right(self) -> Self {
        Self::from_u8_wrapping(self as u8 + 1)
    }

    /// The direction one quarter turn counterclockwise.
    pub const fn rotate_left(self) -> Self {
        Self::from_u8_wrapping(self as u8 + 3)
    }

    const fn from_u8_wrapping(n: u8) -> Self {
        match n % 4 {
            0 => Orientation::Up,
            1 => Orientation::Right,
            2 => Orientation::Down,
            _ => Orientation::Left,
        }
    }

    /// Decode from the wire encoding.
    pub const fn from_u8(n: u8) -> Option<Self> {
        if n < 4 {
            Some(Self::from_u8_wrapping(n))
        } else {
            None
        }
    }

    /// Unit step of this direction in tile space.
    pub fn to_vec(self) -> Vec2<i32> {
        match self {
            Orientation::Up => Vec2::new(0, -1),
            Orientation::Right => Vec2::new(1, 0),
            Orientation::Down => Vec2::new(0, 1),
            Orientation::Left => Vec2::new(-1, 0),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Orientation::Up => "up",
            Orientation::Right => "right",
            Orientation::Down => "down",
            Orientation::Left => "left",
        }
    }
}


/// Shift a coordinate `n` tiles in a direction.
pub fn advance(coord: Vec2<i32>, orientation: Orientation, n: i32) -> Vec2<i32> {
    coord + orientation.to_vec() * n
}


/// Array of `T` for each `Orientation`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct PerOrientation<T>(pub [T; NUM_ORIENTATIONS]);

impl<T> Index<Orientation> for PerOrientation<T> {
    type Output = T;

    fn index(&self, i: Orientation) -> &Self::Output {
        &self.0[i as usize]
    }
}

impl<T> IndexMut<Orientation> for PerOrientation<T> {
    fn index_mut(&mut self, i: Orientation) -> &mut Self::Output {
        &mut self.0[i as usize]
    }
}

impl<T> PerOrientation<T> {
    pub fn map<B, F>(self, f: F) -> PerOrientation<B>
    where
        F: FnMut(T) -> B,
    {
        PerOrientation(self.0.map(f))
    }
}

impl<T> IntoIterator for PerOrientation<T> {
    type Item = T;
    type IntoIter = <[T; NUM_ORIENTATIONS] as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
