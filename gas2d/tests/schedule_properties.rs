//! Check the phases of a number of grids against a direct enumeration of all
//! interacting box pairs

use std::collections::{HashMap, HashSet};

use gas2d::{grid::*, schedule::*};

const CUTOFF: f64 = 1.122462048309373;

fn grids() -> Vec<Grid> {
    let mut grids = vec![];
    for (nx, ny) in [(6, 6), (9, 9), (5, 6), (7, 4), (3, 5), (1, 1), (2, 7), (10, 12)] {
        grids.push(Grid::new(nx, ny).unwrap());
    }
    for (nx, ny) in [(6, 5), (9, 6), (4, 2), (3, 1)] {
        grids.push(GridBuilder::new(nx, ny).with_seam(Seam::PartialRow).build().unwrap());
    }
    grids.push(GridBuilder::new(11, 10).with_radius(2).build().unwrap());
    grids
}

/// Count how often each box pair (ordered by id) is evaluated
fn pair_counts(phases: &[Phase]) -> HashMap<(BoxId, BoxId), usize> {
    let mut counts = HashMap::new();
    for job in phases.iter().flat_map(Phase::iter) {
        for other in job.boxes() {
            let (a, b) = (job.origin().min(other), job.origin().max(other));
            *counts.entry((a, b)).or_insert(0) += 1;
        }
    }
    counts
}

#[test]
fn every_pair_exactly_once() {
    for grid in grids() {
        let partition = Partition::build(&grid).unwrap();
        let counts = pair_counts(partition.phases());
        let coords = grid.coords().collect::<Vec<_>>();
        let mut expected = 0;
        for (i, a) in coords.iter().enumerate() {
            for b in &coords[i..] {
                if !grid.in_range(*a, *b) {
                    continue;
                }
                expected += 1;
                let key = (grid.to_id(*a).unwrap(), grid.to_id(*b).unwrap());
                assert_eq!(counts.get(&key), Some(&1),
                    "Pair {}/{} on {}x{} grid ({:?})", a, b, grid.num_boxes_x(), grid.num_boxes_y(), grid.seam());
            }
        }
        assert_eq!(counts.len(), expected);
        // One job per box
        assert_eq!(partition.num_jobs(), grid.num_boxes());
    }
}

#[test]
fn phases_are_race_free() {
    for grid in grids() {
        let partition = Partition::build(&grid).unwrap();
        for phase in partition.phases() {
            let mut touched = HashSet::new();
            for job in phase {
                for id in job.boxes() {
                    assert!(touched.insert(id), "Box {} used twice in one phase", id);
                }
            }
        }
    }
}

#[test]
fn walls_truncate_neighborhoods() {
    let grid = Grid::new(5, 6).unwrap();
    let partition = Partition::build(&grid).unwrap();
    for job in partition.phases().iter().flat_map(Phase::iter) {
        let origin = grid.to_coord(job.origin()).unwrap();
        for &neighbor in job.neighbors() {
            let neighbor = grid.to_coord(neighbor).unwrap();
            // No pairs across the walls, i.e. from the first to the last column
            assert!((origin.x - neighbor.x).abs() <= 1);
        }
    }
    assert_eq!(grid.neighborhood(BoxCoord::new(0, 3)).len(), 5);
    assert_eq!(grid.neighborhood(BoxCoord::new(4, 3)).len(), 5);
    assert_eq!(grid.neighborhood(BoxCoord::new(2, 3)).len(), 8);
}

#[test]
fn periodic_axis_wraps() {
    let grid = Grid::new(6, 6).unwrap();
    let counts = pair_counts(Partition::build(&grid).unwrap().phases());
    let top = grid.to_id(BoxCoord::new(2, 0)).unwrap();
    for x in 1..=3 {
        let bottom = grid.to_id(BoxCoord::new(x, 5)).unwrap();
        assert_eq!(counts.get(&(top, bottom)), Some(&1));
    }
    let far = grid.to_id(BoxCoord::new(2, 3)).unwrap();
    assert_eq!(counts.get(&(top, far)), None);
}

#[test]
fn dispatcher_drains_every_job() {
    for grid in grids() {
        let mut dispatcher = Dispatcher::for_grid(&grid).unwrap();
        let mut origins = vec![];
        loop {
            while dispatcher.jobs_available() {
                origins.push(dispatcher.get_next_job().unwrap().origin());
            }
            if !dispatcher.advance_phase().unwrap() {
                break;
            }
        }
        origins.sort();
        assert_eq!(origins, grid.ids().collect::<Vec<_>>());
    }
}

/// Distance between two intervals, optionally on a circle of length `period`
fn gap(a: (f64, f64), b: (f64, f64), period: Option<f64>) -> f64 {
    let direct = |shift: f64| (b.0 + shift - a.1).max(a.0 - (b.1 + shift)).max(0.0);
    match period {
        None => direct(0.0),
        Some(period) => direct(0.0).min(direct(period)).min(direct(-period))
    }
}

/// Boxes whose closest points are within the cutoff must be in range
#[test]
fn physical_extent_is_covered() {
    for (width, height, box_size) in [(10.0, 6.0, 1.1225), (7.3, 4.5, 1.2), (6.0, 6.0, 1.5), (5.0, 2.5, 1.25)] {
        let grid = Grid::from_extent(width, height, box_size).unwrap();
        let extent = |c: isize, length: f64| (c as f64 * box_size, ((c + 1) as f64 * box_size).min(length));
        let coords = grid.coords().collect::<Vec<_>>();
        for a in &coords {
            for b in &coords {
                let dx = gap(extent(a.x, width), extent(b.x, width), None);
                let dy = gap(extent(a.y, height), extent(b.y, height), Some(height));
                if (dx * dx + dy * dy).sqrt() < CUTOFF {
                    assert!(grid.in_range(*a, *b), "Boxes {} and {} interact ({}x{}, box size {})",
                        a, b, width, height, box_size);
                }
            }
        }
        Partition::build(&grid).unwrap().validate(&grid).unwrap();
    }
}

#[test]
fn thin_last_row_keeps_nine_phases() {
    let grid = Grid::from_extent(10.0, 6.0, 1.1225).unwrap();
    let partition = Partition::build(&grid).unwrap();
    assert_eq!(partition.num_phases(), 9);
    partition.validate(&grid).unwrap();

    for (height, box_size) in [(8.0, 1.4), (12.5, 1.1225), (3.3, 1.2)] {
        let grid = Grid::from_extent(7.0, height, box_size).unwrap();
        assert_eq!(grid.seam(), Seam::PartialRow);
        assert_eq!(grid.num_boxes_y() % 3, 0);
        let partition = Partition::build(&grid).unwrap();
        assert_eq!(partition.num_phases(), 9, "{}x{} boxes", grid.num_boxes_x(), grid.num_boxes_y());
        partition.validate(&grid).unwrap();
    }
}
