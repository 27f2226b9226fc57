//! Row-connection graph overlay. Arbitrary pairs of rows can be linked (a
//! polyline through a series is just a path here) and the connected
//! structure is smoothed by pulling each row toward its neighbourhood.

use ndarray::{Array2, ArrayView2};
use petgraph::graph::{NodeIndex, UnGraph};

use crate::error::{PursuitError, Result};
use crate::overlay::series::SeriesSet;

/// Undirected graph over row indices. Nodes exist for every row up front;
/// parallel edges collapse and self loops are ignored.
pub struct RowGraph {
    graph: UnGraph<(), ()>,
    rows: usize,
}

impl RowGraph {
    pub fn new(rows: usize) -> Self {
        let mut graph = UnGraph::with_capacity(rows, rows);
        for _ in 0..rows {
            graph.add_node(());
        }
        RowGraph { graph, rows }
    }

    /// Connects consecutive rows of every series into a path.
    pub fn from_series(rows: usize, series: &SeriesSet) -> Result<Self> {
        let mut graph = RowGraph::new(rows);
        for s in series.series() {
            for pair in s.rows().windows(2) {
                graph.connect(pair[0], pair[1])?;
            }
        }
        Ok(graph)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn connect(&mut self, a: usize, b: usize) -> Result<()> {
        self.check_row(a)?;
        self.check_row(b)?;
        if a == b {
            return Ok(());
        }
        self.graph
            .update_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        Ok(())
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        a < self.rows
            && b < self.rows
            && self
                .graph
                .find_edge(NodeIndex::new(a), NodeIndex::new(b))
                .is_some()
    }

    pub fn neighbours(&self, row: usize) -> Vec<usize> {
        if row >= self.rows {
            return Vec::new();
        }
        let mut n: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(row))
            .map(NodeIndex::index)
            .collect();
        n.sort_unstable();
        n
    }

    pub fn degree(&self, row: usize) -> usize {
        if row >= self.rows {
            return 0;
        }
        self.graph.neighbors(NodeIndex::new(row)).count()
    }

    /// Target pulling every connected row to the mean of its own view
    /// position and its neighbours'. Isolated rows stay put.
    pub fn neighbour_mean_target(&self, view: ArrayView2<f64>) -> Result<Array2<f64>> {
        if view.nrows() != self.rows {
            return Err(PursuitError::shape((self.rows, view.ncols()), view.dim()));
        }
        let mut target = view.to_owned();
        for row in 0..self.rows {
            let neighbours = self.neighbours(row);
            if neighbours.is_empty() {
                continue;
            }
            let mut total = view.row(row).to_owned();
            for &n in &neighbours {
                total += &view.row(n);
            }
            target
                .row_mut(row)
                .assign(&(total / (neighbours.len() + 1) as f64));
        }
        Ok(target)
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows {
            return Err(PursuitError::DegenerateInput(format!(
                "row {row} out of range for a graph over {} rows",
                self.rows
            )));
        }
        Ok(())
    }
}
