//! Integer grid coordinates and the direction tables built on them.

use std::{
    cmp::Ordering,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};

/// Location of a single grid cell. Positive `y` points up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    /// Horizontal component.
    pub x: i32,
    /// Vertical component.
    pub y: i32,
}

impl Coordinates {
    /// The origin.
    pub const ZERO: Self = Self::new(0, 0);
    /// One cell to the right.
    pub const RIGHT: Self = Self::new(1, 0);
    /// One cell up.
    pub const UP: Self = Self::new(0, 1);
    /// One cell to the left.
    pub const LEFT: Self = Self::new(-1, 0);
    /// One cell down, the direction gravity pulls.
    pub const DOWN: Self = Self::new(0, -1);

    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise minimum of two coordinates.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum of two coordinates.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// The eight surrounding cells in [`ALL_DIRECTIONS`] order.
    #[must_use]
    pub fn neighbors(self) -> [Coordinates; 8] {
        ALL_DIRECTIONS.map(|direction| self + direction)
    }
}

impl Add for Coordinates {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Coordinates {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Coordinates {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Coordinates {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<i32> for Coordinates {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<i32> for Coordinates {
    type Output = Self;

    fn div(self, rhs: i32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Coordinates {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Row-major ordering: bottom row first, left to right within a row.
impl Ord for Coordinates {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for Coordinates {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Unit vectors indexed by facing: Right, Up, Left, Down.
pub const FACING_DIRECTIONS: [Coordinates; 4] = [
    Coordinates::RIGHT,
    Coordinates::UP,
    Coordinates::LEFT,
    Coordinates::DOWN,
];

/// Cardinal directions ordered North, East, South, West.
pub const COMPASS_DIRECTIONS: [Coordinates; 4] = [
    Coordinates::UP,
    Coordinates::RIGHT,
    Coordinates::DOWN,
    Coordinates::LEFT,
];

/// Diagonal directions ordered NE, NW, SW, SE.
pub const DIAGONAL_DIRECTIONS: [Coordinates; 4] = [
    Coordinates::new(1, 1),
    Coordinates::new(-1, 1),
    Coordinates::new(-1, -1),
    Coordinates::new(1, -1),
];

/// The full eight-neighbourhood, clockwise starting from North.
pub const ALL_DIRECTIONS: [Coordinates; 8] = [
    Coordinates::new(0, 1),
    Coordinates::new(1, 1),
    Coordinates::new(1, 0),
    Coordinates::new(1, -1),
    Coordinates::new(0, -1),
    Coordinates::new(-1, -1),
    Coordinates::new(-1, 0),
    Coordinates::new(-1, 1),
];

/// Maps a unit direction back to its index in [`FACING_DIRECTIONS`].
#[must_use]
pub fn facing_index(direction: Coordinates) -> Option<usize> {
    FACING_DIRECTIONS
        .iter()
        .position(|candidate| *candidate == direction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_matches_component_wise_expectation() {
        let a = Coordinates::new(3, -2);
        let b = Coordinates::new(-1, 5);
        assert_eq!(a + b, Coordinates::new(2, 3));
        assert_eq!(a - b, Coordinates::new(4, -7));
        assert_eq!(a * 2, Coordinates::new(6, -4));
        assert_eq!(Coordinates::new(6, -4) / 2, a);
        assert_eq!(-a, Coordinates::new(-3, 2));
    }

    #[test]
    fn facing_index_inverts_facing_table() {
        for (index, direction) in FACING_DIRECTIONS.iter().enumerate() {
            assert_eq!(facing_index(*direction), Some(index));
        }
        assert_eq!(facing_index(Coordinates::new(1, 1)), None);
        assert_eq!(facing_index(Coordinates::ZERO), None);
    }

    #[test]
    fn ordering_is_row_major() {
        let mut cells = vec![
            Coordinates::new(1, 1),
            Coordinates::new(0, 1),
            Coordinates::new(5, 0),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                Coordinates::new(5, 0),
                Coordinates::new(0, 1),
                Coordinates::new(1, 1)
            ]
        );
    }

    #[test]
    fn neighbors_cover_every_adjacent_cell_once() {
        let center = Coordinates::new(4, 4);
        let neighbors = center.neighbors();
        for direction in COMPASS_DIRECTIONS.iter().chain(DIAGONAL_DIRECTIONS.iter()) {
            assert_eq!(
                neighbors.iter().filter(|cell| **cell == center + *direction).count(),
                1
            );
        }
    }
}
