//! Generation of race-free phases of jobs
//!
//! Agents are placed on a sparse lattice whose spacing (`2 * radius + 1`)
//! keeps the interaction blocks of any two agents apart. In every phase each
//! agent sits on one cell of its block and emits a job for it. Over all phases
//! an agent visits every cell of its block exactly once, and every
//! interacting pair of boxes is evaluated by exactly one job: the job of the
//! box whose phase comes first.
//!
//! Along the walled axis the lattice simply continues past the far wall.
//! Along the periodic axis rows are grouped into row classes. If the row count
//! is a multiple of the block size, the classes are every `2 * radius + 1`-th
//! row and there are `(2 * radius + 1)^2` phases (nine for radius 1). A
//! partial seam row brings boxes on both sides of it into range. Those pairs
//! go to the job of the later phase, since the earlier box can share its
//! partner with another job of its phase. Other row counts need additional
//! row classes, chosen such that rows of one class have disjoint interaction
//! neighborhoods.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow};
use log::debug;

use crate::grid::{BoxCoord, BoxId, Direction, Grid};

use super::{Job, Phase};

/// The complete, immutable set of phases for one grid
#[derive(Clone, Debug)]
pub struct Partition {
    phases: Vec<Phase>,
    /// Agent spacing (and width of an agent's block)
    block_size: usize,
    num_row_classes: usize,
    /// Phase in which each box (by id) is the origin of a job
    phase_of_box: Vec<usize>
}

impl Partition {
    pub fn build(grid: &Grid) -> Result<Self> {
        let block_size = 2 * grid.radius() + 1;
        if grid.num_boxes_y() % block_size == 0 {
            let row_class = (0..grid.num_boxes_y())
                .map(|row| (grid.num_boxes_y() - row) % block_size)
                .collect();
            match Self::assemble(grid, row_class) {
                Ok(partition) => return Ok(partition),
                Err(e) => debug!("Row lattice does not fit the grid ({}), adding row classes", e)
            }
        }
        Self::assemble(grid, assign_row_classes(grid))
    }

    fn assemble(grid: &Grid, row_class: Vec<usize>) -> Result<Self> {
        let block_size = 2 * grid.radius() + 1;
        let num_row_classes = row_class.iter().max().map_or(0, |class| class + 1);
        let phase_of_box = grid.coords()
            .map(|coord| row_class[coord.y as usize] * block_size + coord.x as usize % block_size)
            .collect::<Vec<_>>();
        let owned = assign_pairs(grid, &phase_of_box)?;
        let mut class_rows = vec![vec![]; num_row_classes];
        for (row, class) in row_class.iter().enumerate() {
            class_rows[*class].push(row);
        }

        // One extra agent column so the lattice reaches the far wall
        let num_agents_x = grid.num_boxes_x() / block_size + 1;
        let mut phases = Vec::with_capacity(block_size * num_row_classes);
        for rows in &class_rows {
            let mut agents = rows.iter()
                .flat_map(|&y| (0..num_agents_x)
                    .map(move |i| BoxCoord::new((i * block_size) as isize, y as isize)))
                .collect::<Vec<_>>();
            for _ in 0..block_size {
                let phase_index = phases.len();
                let mut phase = Phase::default();
                for agent in &agents {
                    // Agents beyond the wall sit this phase out
                    let origin = match grid.to_id(*agent) {
                        Some(origin) => origin,
                        None => continue
                    };
                    debug_assert_eq!(phase_of_box[origin.index()], phase_index);
                    let mut job = Job::new(origin);
                    for neighbor in grid.neighborhood(*agent) {
                        if owned.contains(&(origin, neighbor)) {
                            job.add_neighbor(neighbor);
                        }
                    }
                    phase.push(job);
                }
                phases.push(phase);
                for agent in agents.iter_mut() {
                    *agent = grid.step(*agent, Direction::Right, true);
                }
            }
        }

        let partition = Self {
            phases,
            block_size,
            num_row_classes,
            phase_of_box
        };
        debug!("Partitioned {}x{} boxes (radius {}, {:?} seam) into {} phases with {} jobs",
            grid.num_boxes_x(), grid.num_boxes_y(), grid.radius(), grid.seam(),
            partition.num_phases(), partition.num_jobs());
        Ok(partition)
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn into_phases(self) -> Vec<Phase> {
        self.phases
    }

    pub fn num_phases(&self) -> usize {
        self.phases.len()
    }

    pub fn num_jobs(&self) -> usize {
        self.phases.iter().map(Phase::len).sum()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_row_classes(&self) -> usize {
        self.num_row_classes
    }

    /// Phase in which `id` is the origin of a job
    pub fn phase_of(&self, id: BoxId) -> Option<usize> {
        self.phase_of_box.get(id.index()).copied()
    }

    /// Check race freedom within every phase and single coverage of every
    /// interacting box pair across all phases
    pub fn validate(&self, grid: &Grid) -> Result<()> {
        for (phase_index, phase) in self.phases.iter().enumerate() {
            let mut touched_by: Vec<Option<usize>> = vec![None; grid.num_boxes()];
            for (job_index, job) in phase.iter().enumerate() {
                for id in job.boxes() {
                    match touched_by[id.index()].replace(job_index) {
                        Some(other) if other != job_index => return Err(anyhow!(
                            "Box {} is used by jobs {} and {} of phase {}", id, other, job_index, phase_index)),
                        _ => {}
                    }
                }
            }
        }

        let mut pair_counts: HashMap<(BoxId, BoxId), usize> = HashMap::new();
        for job in self.phases.iter().flat_map(Phase::iter) {
            let origin = job.origin();
            *pair_counts.entry((origin, origin)).or_default() += 1;
            for &neighbor in job.neighbors() {
                *pair_counts.entry((origin.min(neighbor), origin.max(neighbor))).or_default() += 1;
            }
        }
        let mut num_expected = 0;
        for (a, coord) in grid.ids().zip(grid.coords()) {
            for b in grid.neighborhood(coord).into_iter().chain(std::iter::once(a)) {
                if b < a {
                    continue;
                }
                num_expected += 1;
                match pair_counts.get(&(a, b)) {
                    Some(1) => {},
                    Some(count) => return Err(anyhow!("Box pair {}/{} is evaluated {} times", a, b, count)),
                    None => return Err(anyhow!("Box pair {}/{} is never evaluated", a, b))
                }
            }
        }
        if num_expected != pair_counts.len() {
            return Err(anyhow!("Jobs evaluate {} box pairs, but only {} are in range",
                pair_counts.len(), num_expected));
        }
        Ok(())
    }
}

/// Decide which job evaluates each pair of boxes in range, as a set of
/// `(origin, neighbor)` pairs. The box of the earlier phase owns a pair,
/// except for pairs in range across a partial seam row, which prefer the
/// later one. The other box is taken if the preferred one would touch a
/// neighbor that another job of its phase already uses.
fn assign_pairs(grid: &Grid, phase_of_box: &[usize]) -> Result<HashSet<(BoxId, BoxId)>> {
    let mut owned = HashSet::new();
    // Job using a neighbor box, by phase and box
    let mut used_by: HashMap<(usize, BoxId), BoxId> = HashMap::new();
    for (a, coord) in grid.ids().zip(grid.coords()) {
        for b in grid.neighborhood(coord) {
            if b < a {
                continue;
            }
            let (phase_a, phase_b) = (phase_of_box[a.index()], phase_of_box[b.index()]);
            if phase_a == phase_b {
                return Err(anyhow!("Boxes {} and {} are in range, but both start jobs in phase {}", a, b, phase_a));
            }
            let (early, late) = if phase_a < phase_b { (a, b) } else { (b, a) };
            let row_b = b.index() / grid.num_boxes_x();
            let candidates = if grid.in_range_across_partial_row(coord.y as usize, row_b) {
                [late, early]
            }
            else {
                [early, late]
            };
            let partner = |owner: BoxId| if owner == a { b } else { a };
            let owner = candidates.into_iter()
                .find(|&owner| used_by.get(&(phase_of_box[owner.index()], partner(owner)))
                    .map_or(true, |&job| job == owner))
                .ok_or_else(|| anyhow!("Box pair {}/{} cannot be evaluated without a race", a, b))?;
            used_by.insert((phase_of_box[owner.index()], partner(owner)), owner);
            owned.insert((owner, partner(owner)));
        }
    }
    Ok(owned)
}

/// Group the rows of the periodic axis so that rows of one class never share
/// a row of their interaction neighborhoods. Rows are visited the way an agent
/// walks down the axis from row 0.
fn assign_row_classes(grid: &Grid) -> Vec<usize> {
    let num_rows = grid.num_boxes_y();
    let rows_in_range = (0..num_rows)
        .map(|row| grid.rows_in_range(row))
        .collect::<Vec<_>>();
    let mut row_class: Vec<Option<usize>> = vec![None; num_rows];
    let mut taken = vec![];
    let mut cursor = BoxCoord::new(0, 0);
    for _ in 0..num_rows {
        let row = cursor.y as usize;
        taken.clear();
        for &shared in &rows_in_range[row] {
            for &other in &rows_in_range[shared] {
                if let Some(class) = row_class[other] {
                    taken.push(class);
                }
            }
        }
        let class = (0..=taken.len())
            .find(|class| !taken.contains(class))
            .unwrap_or(taken.len());
        row_class[row] = Some(class);
        cursor = grid.step(cursor, Direction::Down, true);
    }
    row_class.into_iter()
        .map(Option::unwrap_or_default)
        .collect()
}

#[cfg(test)]
mod test {
    use crate::grid::{GridBuilder, Seam};

    use super::*;

    fn id(grid: &Grid, x: isize, y: isize) -> BoxId {
        grid.to_id(BoxCoord::new(x, y)).unwrap()
    }

    #[test]
    fn test_regular_grid_has_nine_phases() {
        let grid = Grid::new(6, 6).unwrap();
        let partition = Partition::build(&grid).unwrap();
        assert_eq!(partition.num_phases(), 9);
        assert_eq!(partition.num_row_classes(), 3);
        assert_eq!(partition.num_jobs(), 36);
        for phase in partition.phases() {
            assert_eq!(phase.len(), 4);
        }
        partition.validate(&grid).unwrap();
    }

    #[test]
    fn test_agent_walk_order() {
        let grid = Grid::new(6, 6).unwrap();
        let partition = Partition::build(&grid).unwrap();
        // Agents start on the lattice, move right within the block and then
        // one row down
        assert_eq!(partition.phase_of(id(&grid, 0, 0)), Some(0));
        assert_eq!(partition.phase_of(id(&grid, 1, 0)), Some(1));
        assert_eq!(partition.phase_of(id(&grid, 2, 0)), Some(2));
        assert_eq!(partition.phase_of(id(&grid, 0, 5)), Some(3));
        assert_eq!(partition.phase_of(id(&grid, 4, 4)), Some(7));
        assert_eq!(partition.phase_of(id(&grid, 5, 1)), Some(8));
    }

    #[test]
    fn test_spared_directions() {
        let grid = Grid::new(9, 9).unwrap();
        let partition = Partition::build(&grid).unwrap();
        let job_at = |x, y| {
            let origin = id(&grid, x, y);
            let phase = partition.phase_of(origin).unwrap();
            partition.phases()[phase].iter().find(|job| job.origin() == origin).unwrap().clone()
        };
        // First phase: all eight surrounding boxes
        assert_eq!(job_at(3, 3).neighbors().len(), 8);
        // Second phase: everything but the box to the west
        let job = job_at(4, 3);
        assert_eq!(job.neighbors().len(), 7);
        assert!(!job.neighbors().contains(&id(&grid, 3, 3)));
        // Fourth phase: north row spared
        let job = job_at(3, 2);
        assert_eq!(job.neighbors().len(), 5);
        for y in [3] {
            for x in 2..=4 {
                assert!(!job.neighbors().contains(&id(&grid, x, y)));
            }
        }
        // Seventh phase: only east and west; last phase: only self
        let job = job_at(3, 1);
        assert_eq!(job.neighbors(), &[id(&grid, 2, 1), id(&grid, 4, 1)]);
        assert!(job_at(5, 1).neighbors().is_empty());
    }

    #[test]
    fn test_irregular_periodic_axis() {
        for num_boxes_y in 1..=8 {
            for num_boxes_x in 1..=7 {
                let grid = Grid::new(num_boxes_x, num_boxes_y).unwrap();
                let partition = Partition::build(&grid).unwrap();
                assert_eq!(partition.num_jobs(), grid.num_boxes());
                partition.validate(&grid).unwrap();
                if num_boxes_y % 3 == 0 {
                    assert_eq!(partition.num_phases(), 9);
                }
            }
        }
    }

    #[test]
    fn test_partial_seam_row() {
        for num_boxes_y in 1..=9 {
            let grid = GridBuilder::new(5, num_boxes_y).with_seam(Seam::PartialRow).build().unwrap();
            let partition = Partition::build(&grid).unwrap();
            partition.validate(&grid).unwrap();
            if num_boxes_y % 3 == 0 {
                assert_eq!(partition.num_phases(), 9);
            }
        }
    }

    #[test]
    fn test_pairs_across_partial_row() {
        let grid = GridBuilder::new(9, 6).with_seam(Seam::PartialRow).build().unwrap();
        let partition = Partition::build(&grid).unwrap();
        assert_eq!(partition.num_phases(), 9);
        partition.validate(&grid).unwrap();
        let job_at = |x, y| {
            let origin = id(&grid, x, y);
            let phase = partition.phase_of(origin).unwrap();
            partition.phases()[phase].iter().find(|job| job.origin() == origin).unwrap().clone()
        };
        // Row 4 reaches row 0 across the thin last row. The later job takes
        // those pairs.
        let job = job_at(4, 4);
        assert_eq!(partition.phase_of(id(&grid, 4, 4)), Some(7));
        assert_eq!(job.neighbors().len(), 4);
        for x in 3..=5 {
            assert!(job.neighbors().contains(&id(&grid, x, 0)));
        }
        assert!(job.neighbors().contains(&id(&grid, 5, 4)));
        assert!(!job_at(4, 0).neighbors().contains(&id(&grid, 4, 4)));
        // Away from the seam nothing changes
        assert_eq!(job_at(4, 1).neighbors(), &[id(&grid, 5, 1)]);
    }

    #[test]
    fn test_default_extent_has_nine_phases() {
        // 10 x 6 domain with boxes of 1.1225 leaves a thin last row
        let grid = Grid::from_extent(10.0, 6.0, 1.1225).unwrap();
        assert_eq!(grid.seam(), Seam::PartialRow);
        let partition = Partition::build(&grid).unwrap();
        assert_eq!(partition.num_phases(), 9);
        assert_eq!(partition.num_row_classes(), 3);
        partition.validate(&grid).unwrap();
    }

    #[test]
    fn test_larger_radius() {
        let grid = GridBuilder::new(12, 10).with_radius(2).build().unwrap();
        let partition = Partition::build(&grid).unwrap();
        assert_eq!(partition.block_size(), 5);
        assert_eq!(partition.num_phases(), 25);
        partition.validate(&grid).unwrap();

        let grid = GridBuilder::new(12, 10).with_radius(2).with_seam(Seam::PartialRow).build().unwrap();
        let partition = Partition::build(&grid).unwrap();
        assert_eq!(partition.num_phases(), 25);
        partition.validate(&grid).unwrap();
    }
}
