use std::f32::consts::SQRT_2;

use crate::grid::cell::Cell;

/// Moore neighbourhood offsets `(dx, dy)`, clockwise from north (+y).
pub const MOORE_OFFSETS: [(i32, i32); 8] = [
    (0, 1),   // North
    (1, 1),   // Northeast
    (1, 0),   // East
    (1, -1),  // Southeast
    (0, -1),  // South
    (-1, -1), // Southwest
    (-1, 0),  // West
    (-1, 1),  // Northwest
];

/// Maximum neighbourhood size.
pub const MAX_NEIGHBOURS: usize = MOORE_OFFSETS.len();

/// Positions of the in-bounds Moore neighbours of `(x, y)` with their offsets.
///
/// No wrapping: corner cells get 3 neighbours, edge cells 5, interior cells 8.
pub fn moore_positions(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> impl Iterator<Item = (u32, u32, i32, i32)> {
    MOORE_OFFSETS.iter().filter_map(move |&(dx, dy)| {
        let nx = x as i64 + dx as i64;
        let ny = y as i64 + dy as i64;
        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
            None
        } else {
            Some((nx as u32, ny as u32, dx, dy))
        }
    })
}

/// Number of in-bounds Moore neighbours of `(x, y)`.
pub fn neighbour_count(x: u32, y: u32, width: u32, height: u32) -> usize {
    moore_positions(x, y, width, height).count()
}

/// A neighbouring cell together with its offset from the centre cell.
#[derive(Debug, Clone, Copy)]
pub struct Neighbour<'a> {
    pub cell: Cell<'a>,
    pub dx: i32,
    pub dy: i32,
}

impl Neighbour<'_> {
    /// 1 for orthogonal neighbours, sqrt(2) for diagonal ones.
    pub fn distance(&self) -> f32 {
        if self.dx != 0 && self.dy != 0 {
            SQRT_2
        } else {
            1.0
        }
    }

    /// Unit vector pointing from this neighbour toward the centre cell.
    pub fn direction_to_centre(&self) -> (f32, f32) {
        let d = self.distance();
        (-self.dx as f32 / d, -self.dy as f32 / d)
    }

    pub fn is_diagonal(&self) -> bool {
        self.dx != 0 && self.dy != 0
    }
}

/// Fixed-capacity, allocation-free Moore neighbourhood.
#[derive(Debug, Clone, Copy)]
pub struct Neighbourhood<'a> {
    slots: [Option<Neighbour<'a>>; MAX_NEIGHBOURS],
    len: usize,
}

impl<'a> Neighbourhood<'a> {
    pub(crate) fn empty() -> Self {
        Self {
            slots: [None; MAX_NEIGHBOURS],
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, neighbour: Neighbour<'a>) {
        debug_assert!(self.len < MAX_NEIGHBOURS);
        self.slots[self.len] = Some(neighbour);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbour<'a>> {
        self.slots[..self.len].iter().flatten()
    }

    /// Neighbours currently on fire.
    pub fn burning(&self) -> impl Iterator<Item = &Neighbour<'a>> {
        self.iter().filter(|n| n.cell.fire().is_burning())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn corner_edge_interior_counts() {
        let (w, h) = (5, 4);
        assert_eq!(neighbour_count(0, 0, w, h), 3);
        assert_eq!(neighbour_count(4, 0, w, h), 3);
        assert_eq!(neighbour_count(0, 3, w, h), 3);
        assert_eq!(neighbour_count(4, 3, w, h), 3);
        assert_eq!(neighbour_count(2, 0, w, h), 5);
        assert_eq!(neighbour_count(0, 2, w, h), 5);
        assert_eq!(neighbour_count(4, 1, w, h), 5);
        assert_eq!(neighbour_count(1, 3, w, h), 5);
        assert_eq!(neighbour_count(2, 2, w, h), 8);
    }

    #[test]
    fn every_cell_of_3x3_has_expected_count() {
        for y in 0..3 {
            for x in 0..3 {
                let corner = (x == 0 || x == 2) && (y == 0 || y == 2);
                let interior = x == 1 && y == 1;
                let expected = if corner {
                    3
                } else if interior {
                    8
                } else {
                    5
                };
                assert_eq!(
                    neighbour_count(x, y, 3, 3),
                    expected,
                    "cell ({}, {})",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn neighbours_are_distinct_and_exclude_self() {
        let positions: Vec<(u32, u32)> = moore_positions(2, 2, 5, 5)
            .map(|(x, y, _, _)| (x, y))
            .collect();
        let unique: HashSet<_> = positions.iter().copied().collect();
        assert_eq!(unique.len(), positions.len());
        assert!(!unique.contains(&(2, 2)));
    }

    #[test]
    fn adjacency_is_symmetric() {
        let (w, h) = (4, 3);
        for y in 0..h {
            for x in 0..w {
                for (nx, ny, _, _) in moore_positions(x, y, w, h) {
                    assert!(
                        moore_positions(nx, ny, w, h).any(|(bx, by, _, _)| bx == x && by == y),
                        "({}, {}) -> ({}, {}) not reciprocated",
                        x,
                        y,
                        nx,
                        ny
                    );
                }
            }
        }
    }

    #[test]
    fn single_row_grid_has_no_vertical_neighbours() {
        assert_eq!(neighbour_count(0, 0, 3, 1), 1);
        assert_eq!(neighbour_count(1, 0, 3, 1), 2);
        assert_eq!(neighbour_count(0, 0, 1, 1), 0);
    }
}
