//! Ruling-line table strategy.
//!
//! Rulings are snapped onto shared axes, joined into continuous lines and
//! intersected. A rectangle with intersections at its corners and drawn
//! sides is a cell; cells sharing an edge form a table.

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::parser::{Orientation, Ruling, TextSpan};

use super::{CellGrid, PageGeometry, TableStrategy};

const EPSILON: f32 = 1e-4;

/// Cell rectangle in top-down page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CellBox {
    x0: f32,
    top: f32,
    x1: f32,
    bottom: f32,
}

impl CellBox {
    fn contains(&self, (x, y): (f32, f32)) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }
}

/// Detects tables bounded by ruling lines.
#[derive(Debug, Clone)]
pub struct LatticeStrategy {
    name: &'static str,
    snap_tolerance: f32,
    join_tolerance: f32,
    intersection_tolerance: f32,
}

impl LatticeStrategy {
    /// Ruling detection with tight tolerances.
    pub fn standard() -> Self {
        Self {
            name: "default",
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            intersection_tolerance: 3.0,
        }
    }

    /// Ruling detection that accepts looser line intersections.
    pub fn lines() -> Self {
        Self {
            name: "lines",
            intersection_tolerance: 5.0,
            ..Self::standard()
        }
    }

    /// Detect table grids from rulings, filling cells from spans.
    pub fn detect(&self, rulings: &[Ruling], spans: &[TextSpan], page_height: f32) -> Vec<CellGrid> {
        if rulings.len() < 4 {
            return vec![];
        }

        let edges = join_collinear(snap(rulings.to_vec(), self.snap_tolerance), self.join_tolerance);
        let points = intersections(&edges, self.intersection_tolerance);
        let cells = cells_from_points(&points, &edges, self.intersection_tolerance);
        if cells.is_empty() {
            return vec![];
        }

        // Span centers in the same top-down frame as the cells
        let centers: Vec<((f32, f32), &str)> = spans
            .iter()
            .map(|s| {
                let (x, y) = s.center();
                ((x, page_height - y), s.text.as_str())
            })
            .collect();

        group_tables(cells)
            .into_iter()
            .map(|rows| {
                rows.into_iter()
                    .map(|row| row.iter().map(|cell| cell_text(cell, &centers)).collect())
                    .collect()
            })
            .collect()
    }
}

impl TableStrategy for LatticeStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find_tables(&self, page: &PageGeometry<'_>) -> Result<Vec<CellGrid>> {
        Ok(self.detect(page.rulings, page.spans, page.height))
    }
}

/// Align nearly-collinear rulings onto the mean of their cluster.
fn snap(rulings: Vec<Ruling>, tolerance: f32) -> Vec<Ruling> {
    let (mut horizontals, mut verticals): (Vec<Ruling>, Vec<Ruling>) = rulings
        .into_iter()
        .partition(|r| r.orientation == Orientation::Horizontal);

    snap_group(&mut horizontals, tolerance, |r| r.top, |r, v| {
        r.top = v;
        r.bottom = v;
    });
    snap_group(&mut verticals, tolerance, |r| r.x0, |r, v| {
        r.x0 = v;
        r.x1 = v;
    });

    horizontals.extend(verticals);
    horizontals
}

fn snap_group<K, S>(rulings: &mut [Ruling], tolerance: f32, key: K, mut set: S)
where
    K: Fn(&Ruling) -> f32,
    S: FnMut(&mut Ruling, f32),
{
    if rulings.is_empty() {
        return;
    }
    rulings.sort_by(|a, b| key(a).total_cmp(&key(b)));

    let mut start = 0;
    for i in 1..=rulings.len() {
        if i == rulings.len() || key(&rulings[i]) - key(&rulings[start]) > tolerance {
            let mean = rulings[start..i].iter().map(&key).sum::<f32>() / (i - start) as f32;
            for ruling in &mut rulings[start..i] {
                set(ruling, mean);
            }
            start = i;
        }
    }
}

/// Merge overlapping or nearly touching segments on the same line.
fn join_collinear(mut rulings: Vec<Ruling>, tolerance: f32) -> Vec<Ruling> {
    let key = |r: &Ruling| match r.orientation {
        Orientation::Horizontal => (0, r.top, r.x0, r.x1),
        Orientation::Vertical => (1, r.x0, r.top, r.bottom),
    };
    rulings.sort_by(|a, b| {
        let (ka, kb) = (key(a), key(b));
        ka.0.cmp(&kb.0)
            .then(ka.1.total_cmp(&kb.1))
            .then(ka.2.total_cmp(&kb.2))
    });

    let mut joined: Vec<Ruling> = Vec::with_capacity(rulings.len());
    for ruling in rulings {
        let (kind, line, start, end) = key(&ruling);
        if let Some(last) = joined.last_mut() {
            let (last_kind, last_line, _, last_end) = key(&*last);
            if kind == last_kind && (line - last_line).abs() < EPSILON && start <= last_end + tolerance {
                if end > last_end {
                    match last.orientation {
                        Orientation::Horizontal => last.x1 = end,
                        Orientation::Vertical => last.bottom = end,
                    }
                }
                continue;
            }
        }
        joined.push(ruling);
    }
    joined
}

/// Points where a horizontal and a vertical ruling cross.
fn intersections(rulings: &[Ruling], tolerance: f32) -> Vec<(f32, f32)> {
    let (horizontals, verticals): (Vec<&Ruling>, Vec<&Ruling>) = rulings
        .iter()
        .partition(|r| r.orientation == Orientation::Horizontal);

    let mut points = Vec::new();
    for h in &horizontals {
        for v in &verticals {
            if v.x0 >= h.x0 - tolerance
                && v.x0 <= h.x1 + tolerance
                && h.top >= v.top - tolerance
                && h.top <= v.bottom + tolerance
            {
                points.push((v.x0, h.top));
            }
        }
    }

    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points.dedup_by(|a, b| (a.0 - b.0).abs() < EPSILON && (a.1 - b.1).abs() < EPSILON);
    points
}

/// Rectangles between adjacent grid lines whose four corners all exist
/// and whose four sides are drawn.
fn cells_from_points(points: &[(f32, f32)], rulings: &[Ruling], tolerance: f32) -> Vec<CellBox> {
    let mut xs: Vec<f32> = Vec::new();
    let mut ys: Vec<f32> = Vec::new();
    for &(x, y) in points {
        if !xs.iter().any(|&v| (v - x).abs() < EPSILON) {
            xs.push(x);
        }
        if !ys.iter().any(|&v| (v - y).abs() < EPSILON) {
            ys.push(y);
        }
    }
    xs.sort_by(f32::total_cmp);
    ys.sort_by(f32::total_cmp);

    let has = |x: f32, y: f32| {
        points
            .iter()
            .any(|p| (p.0 - x).abs() < EPSILON && (p.1 - y).abs() < EPSILON)
    };

    let horizontal = |y: f32, x0: f32, x1: f32| {
        rulings.iter().any(|r| {
            r.orientation == Orientation::Horizontal
                && (r.top - y).abs() < EPSILON
                && r.x0 <= x0 + tolerance
                && r.x1 >= x1 - tolerance
        })
    };
    let vertical = |x: f32, top: f32, bottom: f32| {
        rulings.iter().any(|r| {
            r.orientation == Orientation::Vertical
                && (r.x0 - x).abs() < EPSILON
                && r.top <= top + tolerance
                && r.bottom >= bottom - tolerance
        })
    };

    let mut cells = Vec::new();
    for rows in ys.windows(2) {
        for cols in xs.windows(2) {
            let (top, bottom, x0, x1) = (rows[0], rows[1], cols[0], cols[1]);
            let corners = has(x0, top) && has(x1, top) && has(x0, bottom) && has(x1, bottom);
            let sides = horizontal(top, x0, x1)
                && horizontal(bottom, x0, x1)
                && vertical(x0, top, bottom)
                && vertical(x1, top, bottom);
            if corners && sides {
                cells.push(CellBox {
                    x0,
                    top,
                    x1,
                    bottom,
                });
            }
        }
    }
    cells
}

/// Group cells into tables (union-find over shared edges), each as rows
/// of cells ordered left to right. Tables are ordered top to bottom.
fn group_tables(cells: Vec<CellBox>) -> Vec<Vec<Vec<CellBox>>> {
    let n = cells.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if share_edge(&cells[i], &cells[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<CellBox>> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(*cell);
    }

    let mut tables: Vec<(CellBox, Vec<Vec<CellBox>>)> = groups
        .into_values()
        .map(|group| {
            let bounds = group.iter().fold(group[0], |acc, c| CellBox {
                x0: acc.x0.min(c.x0),
                top: acc.top.min(c.top),
                x1: acc.x1.max(c.x1),
                bottom: acc.bottom.max(c.bottom),
            });

            let mut by_row: BTreeMap<i64, Vec<CellBox>> = BTreeMap::new();
            for cell in group {
                by_row.entry(float_key(cell.top)).or_default().push(cell);
            }
            let rows = by_row
                .into_values()
                .map(|mut row| {
                    row.sort_by(|a, b| a.x0.total_cmp(&b.x0));
                    row
                })
                .collect();
            (bounds, rows)
        })
        .collect();

    tables.sort_by(|a, b| a.0.top.total_cmp(&b.0.top).then(a.0.x0.total_cmp(&b.0.x0)));
    tables.into_iter().map(|(_, rows)| rows).collect()
}

fn share_edge(a: &CellBox, b: &CellBox) -> bool {
    let vertical = ((a.x1 - b.x0).abs() < EPSILON || (a.x0 - b.x1).abs() < EPSILON)
        && a.top < b.bottom + EPSILON
        && b.top < a.bottom + EPSILON;
    let horizontal = ((a.bottom - b.top).abs() < EPSILON || (a.top - b.bottom).abs() < EPSILON)
        && a.x0 < b.x1 + EPSILON
        && b.x0 < a.x1 + EPSILON;
    vertical || horizontal
}

fn float_key(v: f32) -> i64 {
    (v as f64 * 1000.0).round() as i64
}

/// Text of spans centered inside the cell, reading order, or `None`.
fn cell_text(cell: &CellBox, centers: &[((f32, f32), &str)]) -> Option<String> {
    let mut inside: Vec<((f32, f32), &str)> = centers
        .iter()
        .filter(|(center, text)| cell.contains(*center) && !text.trim().is_empty())
        .copied()
        .collect();
    if inside.is_empty() {
        return None;
    }
    inside.sort_by(|a, b| a.0 .1.total_cmp(&b.0 .1).then(a.0 .0.total_cmp(&b.0 .0)));
    Some(
        inside
            .iter()
            .map(|(_, text)| text.trim())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rulings for a grid with the given column and row lines (top-down).
    fn grid_rulings(xs: &[f32], ys: &[f32]) -> Vec<Ruling> {
        let (left, right) = (xs[0], xs[xs.len() - 1]);
        let (top, bottom) = (ys[0], ys[ys.len() - 1]);
        let mut rulings: Vec<Ruling> = ys.iter().map(|&y| Ruling::horizontal(left, right, y)).collect();
        rulings.extend(xs.iter().map(|&x| Ruling::vertical(x, top, bottom)));
        rulings
    }

    /// Span whose center lands at (x, top-down y) on a 792pt page.
    fn span_at(text: &str, x: f32, y: f32) -> TextSpan {
        let mut span = TextSpan::new(text.to_string(), x, 0.0, 10.0, "F1".into());
        span.x = x - span.width / 2.0;
        span.y = 792.0 - y - span.font_size * 0.3;
        span
    }

    #[test]
    fn test_two_by_two_grid() {
        let rulings = grid_rulings(&[100.0, 200.0, 300.0], &[100.0, 120.0, 140.0]);
        let spans = vec![
            span_at("Name", 150.0, 110.0),
            span_at("Age", 250.0, 110.0),
            span_at("Alice", 150.0, 130.0),
        ];

        let grids = LatticeStrategy::standard().detect(&rulings, &spans, 792.0);
        assert_eq!(grids.len(), 1);
        assert_eq!(
            grids[0],
            vec![
                vec![Some("Name".to_string()), Some("Age".to_string())],
                vec![Some("Alice".to_string()), None],
            ]
        );
    }

    #[test]
    fn test_snap_and_join() {
        // Slightly misaligned, split border lines still form one cell
        let rulings = vec![
            Ruling::horizontal(100.0, 150.0, 100.0),
            Ruling::horizontal(151.0, 200.0, 101.0),
            Ruling::horizontal(100.0, 200.0, 150.0),
            Ruling::vertical(100.0, 100.0, 150.0),
            Ruling::vertical(201.5, 100.0, 150.0),
        ];
        let grids = LatticeStrategy::standard().detect(&rulings, &[], 792.0);
        assert_eq!(grids, vec![vec![vec![None]]]);
    }

    #[test]
    fn test_separate_tables_ordered_top_down() {
        let mut rulings = grid_rulings(&[50.0, 100.0, 150.0], &[400.0, 420.0, 440.0]);
        rulings.extend(grid_rulings(&[50.0, 100.0], &[100.0, 120.0, 140.0]));

        let grids = LatticeStrategy::standard().detect(&rulings, &[], 792.0);
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0][0].len(), 1);
        assert_eq!(grids[1][0].len(), 2);
    }

    #[test]
    fn test_loose_intersections_need_lines_strategy() {
        // Vertical rulings stop 4pt short of the bottom border
        let rulings = vec![
            Ruling::horizontal(100.0, 200.0, 100.0),
            Ruling::horizontal(100.0, 200.0, 150.0),
            Ruling::vertical(100.0, 100.0, 146.0),
            Ruling::vertical(200.0, 100.0, 146.0),
        ];
        assert!(LatticeStrategy::standard().detect(&rulings, &[], 792.0).is_empty());
        assert_eq!(LatticeStrategy::lines().detect(&rulings, &[], 792.0).len(), 1);
    }

    #[test]
    fn test_too_few_rulings() {
        let rulings = vec![Ruling::horizontal(0.0, 100.0, 10.0)];
        assert!(LatticeStrategy::lines().detect(&rulings, &[], 792.0).is_empty());
    }
}
