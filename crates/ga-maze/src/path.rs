//! Breadth-first pathfinding over the walkable subgraph.
//!
//! The search writes per-tile step distances into a scratch grid (`0` means
//! unvisited, the source gets `1`) and stops as soon as the destination's
//! distance is known.  The path is reconstructed by walking backwards from
//! the destination through neighbors whose step equals `current - 1`.
//!
//! An unreachable destination terminates the search when the frontier
//! empties and yields an empty path.  Callers treat `[]` as "stay put this
//! tick".

use crate::maze::Maze;
use crate::tile::Coord;

impl Maze {
    /// Shortest 4-connected path from `src` to `dst`, inclusive of both ends.
    ///
    /// Collision tiles are never entered, and expansion stays off the border
    /// ring of the grid.  `find_path(p, p)` returns `[p]`.  An unreachable
    /// destination yields `[]`.
    pub fn find_path(&self, src: Coord, dst: Coord) -> Vec<Coord> {
        let (w, h) = (self.width() as usize, self.height() as usize);
        let mut steps = vec![0u32; w * h];
        let at = |c: Coord| c.y as usize * w + c.x as usize;

        steps[at(src)] = 1;
        let mut frontier = vec![src];

        while steps[at(dst)] == 0 {
            if frontier.is_empty() {
                return Vec::new();
            }
            let mut next = Vec::new();
            for f in frontier {
                for c in self.get_around(f, true) {
                    let interior = c.x > 0
                        && (c.x as usize) < w - 1
                        && c.y > 0
                        && (c.y as usize) < h - 1;
                    if interior && steps[at(c)] == 0 {
                        steps[at(c)] = steps[at(f)] + 1;
                        next.push(c);
                    }
                }
            }
            frontier = next;
        }

        // Walk back from the destination along decreasing step counts.
        let mut step = steps[at(dst)];
        let mut path = vec![dst];
        while step > 1 {
            let tail = *path.last().unwrap_or(&dst);
            for c in self.get_around(tail, true) {
                if steps[at(c)] == step - 1 {
                    path.push(c);
                    break;
                }
            }
            step -= 1;
        }
        path.reverse();
        path
    }
}
