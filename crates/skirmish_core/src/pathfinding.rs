//! Grid-based pathfinding using A* over the terrain grid.
//!
//! Costs: 1 per orthogonal step, √2 per diagonal step, and 1.5× on top
//! when the destination cell is a bridge tile. The heuristic is the
//! Manhattan distance in cells. With √2 diagonals that heuristic can
//! overestimate, so returned paths are valid but not always shortest.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::math::{ratio, Fixed, Vec2Fixed, SQRT_2};
use crate::terrain::{GridCell, TerrainGrid};

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    cell: GridCell,
    /// f_score = g_score + heuristic
    f_score: Fixed,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest f_score first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Multiplier applied when stepping onto a bridge tile.
pub const BRIDGE_COST_FACTOR: Fixed = ratio(3, 2);

#[inline]
fn manhattan_heuristic(a: GridCell, b: GridCell) -> Fixed {
    Fixed::from_num((a.col - b.col).abs() + (a.row - b.row).abs())
}

#[inline]
fn tie_breaker(cell: GridCell) -> u64 {
    (u64::from(cell.row.unsigned_abs()) << 32) | u64::from(cell.col.unsigned_abs())
}

/// Cost of stepping from a cell in direction `(dx, dy)` onto `to`.
fn step_cost(grid: &TerrainGrid, to: GridCell, dx: i32, dy: i32) -> Fixed {
    let base = if dx != 0 && dy != 0 { SQRT_2 } else { Fixed::ONE };
    if grid.is_bridge(to.col, to.row) {
        base * BRIDGE_COST_FACTOR
    } else {
        base
    }
}

/// Find a path between two world positions.
///
/// Returns the centers of every cell along the route, starting with the
/// start cell and ending with the target cell. Returns `None` when
/// either endpoint cell is not walkable or the cells are disconnected.
#[must_use]
pub fn find_path(grid: &TerrainGrid, start: Vec2Fixed, target: Vec2Fixed) -> Option<Vec<Vec2Fixed>> {
    let start = grid.world_to_cell(start);
    let goal = grid.world_to_cell(target);

    if !grid.is_walkable(start.col, start.row) || !grid.is_walkable(goal.col, goal.row) {
        return None;
    }

    if start == goal {
        return Some(vec![grid.cell_to_world(start.col, start.row)]);
    }

    find_path_cells(grid, start, goal)
}

fn find_path_cells(grid: &TerrainGrid, start: GridCell, goal: GridCell) -> Option<Vec<Vec2Fixed>> {
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut closed: HashSet<GridCell> = HashSet::new();
    let mut came_from: HashMap<GridCell, GridCell> = HashMap::new();
    let mut g_score: HashMap<GridCell, Fixed> = HashMap::new();

    g_score.insert(start, Fixed::ZERO);
    open_set.push(AStarNode {
        cell: start,
        f_score: manhattan_heuristic(start, goal),
        tie_breaker: tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        if current.cell == goal {
            return Some(reconstruct_path(grid, &came_from, goal));
        }

        // Stale heap entries for already-expanded cells.
        if !closed.insert(current.cell) {
            continue;
        }

        let current_g = g_score.get(&current.cell).copied().unwrap_or(Fixed::MAX);

        for &(dx, dy) in &DIRECTIONS {
            let next = GridCell::new(current.cell.col + dx, current.cell.row + dy);
            if closed.contains(&next) || !grid.is_walkable(next.col, next.row) {
                continue;
            }

            let tentative_g = current_g + step_cost(grid, next, dx, dy);
            let next_g = g_score.get(&next).copied().unwrap_or(Fixed::MAX);

            if tentative_g < next_g {
                came_from.insert(next, current.cell);
                g_score.insert(next, tentative_g);
                open_set.push(AStarNode {
                    cell: next,
                    f_score: tentative_g + manhattan_heuristic(next, goal),
                    tie_breaker: tie_breaker(next),
                });
            }
        }
    }

    None
}

fn reconstruct_path(
    grid: &TerrainGrid,
    came_from: &HashMap<GridCell, GridCell>,
    goal: GridCell,
) -> Vec<Vec2Fixed> {
    let mut path = vec![grid.cell_to_world(goal.col, goal.row)];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(grid.cell_to_world(prev.col, prev.row));
        current = prev;
    }

    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapLayout;
    use proptest::prelude::*;

    fn grid() -> TerrainGrid {
        TerrainGrid::from_layout(&MapLayout::default())
    }

    /// Small open board without water.
    fn open_grid(columns: usize, rows: usize) -> TerrainGrid {
        TerrainGrid::from_layout(&MapLayout {
            columns,
            rows,
            world_width: Fixed::from_num(columns),
            world_height: Fixed::from_num(rows),
            water_start_row: -10,
            water_end_row: -10,
            bridges: Vec::new(),
        })
    }

    #[test]
    fn test_simple_path() {
        let g = open_grid(10, 10);
        let path = find_path(&g, g.cell_to_world(0, 0), g.cell_to_world(5, 0)).expect("path");
        assert_eq!(path.len(), 6);
        assert_eq!(path[0], g.cell_to_world(0, 0));
        assert_eq!(path[5], g.cell_to_world(5, 0));
    }

    #[test]
    fn test_diagonal_path() {
        let g = open_grid(10, 10);
        let path = find_path(&g, g.cell_to_world(0, 0), g.cell_to_world(4, 4)).expect("path");
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_path_to_same_cell() {
        let g = open_grid(10, 10);
        let path = find_path(&g, g.cell_to_world(3, 3), g.cell_to_world(3, 3)).expect("path");
        assert_eq!(path, vec![g.cell_to_world(3, 3)]);
    }

    #[test]
    fn test_blocked_endpoints() {
        let g = grid();
        let water = g.cell_to_world(15, 31);
        let ground = g.cell_to_world(15, 10);
        assert!(find_path(&g, water, ground).is_none());
        assert!(find_path(&g, ground, water).is_none());

        let outside = Vec2Fixed::new(Fixed::from_num(-5), Fixed::from_num(-5));
        assert!(find_path(&g, outside, ground).is_none());
    }

    #[test]
    fn test_crossing_uses_bridge() {
        let g = grid();
        let start = g.cell_to_world(6, 20);
        let goal = g.cell_to_world(6, 45);
        let path = find_path(&g, start, goal).expect("bridge route exists");

        for point in &path {
            let cell = g.world_to_cell(*point);
            assert!(g.is_walkable(cell.col, cell.row), "path crosses {cell:?}");
        }
        assert!(path.iter().any(|p| {
            let c = g.world_to_cell(*p);
            g.is_bridge(c.col, c.row)
        }));
    }

    #[test]
    fn test_no_path_when_disconnected() {
        let g = TerrainGrid::from_layout(&MapLayout {
            bridges: Vec::new(),
            ..Default::default()
        });
        let start = g.cell_to_world(6, 20);
        let goal = g.cell_to_world(6, 45);
        assert!(find_path(&g, start, goal).is_none());
    }

    #[test]
    fn test_bridge_penalty_prefers_ground() {
        // A single row of bridge tiles alongside plain ground.
        let mut g = open_grid(6, 3);
        let mut codes = vec![0; 18];
        for col in 0..6 {
            codes[6 + col] = 257;
        }
        g.load_overlay(&codes, 6, 3).expect("overlay");

        let path = find_path(&g, g.cell_to_world(0, 0), g.cell_to_world(5, 0)).expect("path");
        for point in &path {
            let cell = g.world_to_cell(*point);
            assert_eq!(cell.row, 0, "detoured onto bridge at {cell:?}");
        }
    }

    #[test]
    fn test_determinism() {
        let g = grid();
        let start = g.cell_to_world(2, 5);
        let goal = g.cell_to_world(33, 60);
        let first = find_path(&g, start, goal);
        for _ in 0..5 {
            assert_eq!(find_path(&g, start, goal), first);
        }
    }

    proptest! {
        #[test]
        fn prop_path_endpoints_are_cell_centers(
            sc in 0i32..36, sr in 0i32..64, tc in 0i32..36, tr in 0i32..64,
        ) {
            let g = grid();
            prop_assume!(g.is_walkable(sc, sr) && g.is_walkable(tc, tr));
            let path = find_path(&g, g.cell_to_world(sc, sr), g.cell_to_world(tc, tr));
            let path = path.expect("reference board is connected");
            prop_assert_eq!(path[0], g.cell_to_world(sc, sr));
            prop_assert_eq!(*path.last().unwrap(), g.cell_to_world(tc, tr));
        }
    }
}
