//! Agglomerative clustering overlay. Rows merge bottom-up by nearest
//! centroid into a binary tree; flat clusterings come from cutting the tree
//! at its widest merges. Centroids live in data space so a renderer can
//! project them through whatever the current projection happens to be.

use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::error::{PursuitError, Result};

/// Node count above which the nearest-pair scan runs in parallel.
const PARALLEL_NODES: usize = 128;

/// Upper bound tried when the caller asks for an automatic cluster count.
pub const AUTO_CLUSTER_MAX: usize = 8;

#[derive(Debug, Clone)]
pub struct ClusterNode {
    rows: Vec<usize>,
    centroid: Array1<f64>,
    merge_distance: f64,
    children: Option<Box<[ClusterNode; 2]>>,
}

impl ClusterNode {
    fn leaf(row: usize, centroid: Array1<f64>) -> Self {
        ClusterNode {
            rows: vec![row],
            centroid,
            merge_distance: 0.0,
            children: None,
        }
    }

    /// Member rows, ascending.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Data-space centroid; project it to draw the node in the view.
    pub fn centroid(&self) -> ArrayView1<f64> {
        self.centroid.view()
    }

    /// Euclidean centroid distance at which this node's children merged;
    /// zero for leaves.
    pub fn merge_distance(&self) -> f64 {
        self.merge_distance
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> Option<(&ClusterNode, &ClusterNode)> {
        self.children.as_deref().map(|c| (&c[0], &c[1]))
    }

    /// Levels below this node; a leaf reports 0. Bounds the recursion of
    /// anything drawing nested cluster arcs.
    pub fn depth(&self) -> usize {
        match self.children() {
            Some((a, b)) => 1 + a.depth().max(b.depth()),
            None => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterTree {
    root: ClusterNode,
    rows: usize,
}

impl ClusterTree {
    /// Agglomerates every row of `data` into one binary tree.
    pub fn build(data: ArrayView2<f64>) -> Result<ClusterTree> {
        let rows = data.nrows();
        if rows == 0 {
            return Err(PursuitError::DegenerateInput(
                "cannot cluster an empty dataset".to_string(),
            ));
        }

        let mut nodes: Vec<ClusterNode> = (0..rows)
            .map(|r| ClusterNode::leaf(r, data.row(r).to_owned()))
            .collect();

        while nodes.len() > 1 {
            let (_, i, j) = nearest_pair(&nodes);
            // swap_remove(j) cannot move index i because i < j
            let b = nodes.swap_remove(j);
            let a = nodes.swap_remove(i);
            nodes.push(merge(a, b));
            if nodes.len() % 256 == 0 {
                debug!("clustering: {} nodes remain", nodes.len());
            }
        }

        let root = match nodes.pop() {
            Some(root) => root,
            None => {
                return Err(PursuitError::DegenerateInput(
                    "cannot cluster an empty dataset".to_string(),
                ))
            }
        };
        Ok(ClusterTree { root, rows })
    }

    pub fn root(&self) -> &ClusterNode {
        &self.root
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Flat assignment into at most `k` clusters, splitting the widest
    /// merges first. Cluster codes are ordered by each cluster's lowest row
    /// index, so the labelling is deterministic.
    pub fn cut(&self, k: usize) -> Vec<u32> {
        let k = k.clamp(1, self.rows);
        let mut selected: Vec<&ClusterNode> = vec![&self.root];
        while selected.len() < k {
            let widest = selected
                .iter()
                .enumerate()
                .filter(|(_, n)| !n.is_leaf())
                .max_by(|a, b| a.1.merge_distance.total_cmp(&b.1.merge_distance))
                .map(|(idx, _)| idx);
            let Some(idx) = widest else { break };
            let node = selected.swap_remove(idx);
            if let Some((a, b)) = node.children() {
                selected.push(a);
                selected.push(b);
            }
        }
        selected.sort_by_key(|n| n.rows.first().copied());

        let mut assignment = vec![0u32; self.rows];
        for (code, node) in selected.iter().enumerate() {
            for &row in &node.rows {
                assignment[row] = code as u32;
            }
        }
        assignment
    }

    /// Picks the cluster count in `2..=max_k` with the best mean silhouette
    /// score; ties go to the smaller count. Fewer than two rows yield 1.
    pub fn auto_k(&self, data: ArrayView2<f64>, max_k: usize) -> usize {
        let cap = max_k.min(self.rows);
        if cap < 2 {
            return 1;
        }
        let mut best_k = 2;
        let mut best_score = f64::NEG_INFINITY;
        for k in 2..=cap {
            let score = silhouette(data, &self.cut(k));
            debug!("cluster count {k}: silhouette {score:.4}");
            if score > best_score {
                best_score = score;
                best_k = k;
            }
        }
        best_k
    }
}

fn dist_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Closest pair of nodes by centroid distance, with a total tie-break on
/// the index pair so the parallel reduction stays deterministic.
fn nearest_pair(nodes: &[ClusterNode]) -> (f64, usize, usize) {
    let scan = |i: usize| {
        let mut local = (f64::INFINITY, i, i);
        for j in i + 1..nodes.len() {
            let d = dist_sq(nodes[i].centroid(), nodes[j].centroid());
            if d < local.0 {
                local = (d, i, j);
            }
        }
        local
    };
    let better = |a: (f64, usize, usize), b: (f64, usize, usize)| {
        if b.0 < a.0 || (b.0 == a.0 && (b.1, b.2) < (a.1, a.2)) {
            b
        } else {
            a
        }
    };
    if nodes.len() >= PARALLEL_NODES {
        (0..nodes.len() - 1)
            .into_par_iter()
            .map(scan)
            .reduce(|| (f64::INFINITY, 0, 0), better)
    } else {
        (0..nodes.len().saturating_sub(1))
            .map(scan)
            .fold((f64::INFINITY, 0, 0), better)
    }
}

fn merge(a: ClusterNode, b: ClusterNode) -> ClusterNode {
    let (na, nb) = (a.rows.len() as f64, b.rows.len() as f64);
    let centroid = (&a.centroid * na + &b.centroid * nb) / (na + nb);
    let distance = dist_sq(a.centroid(), b.centroid()).sqrt();
    let mut rows = Vec::with_capacity(a.rows.len() + b.rows.len());
    rows.extend_from_slice(&a.rows);
    rows.extend_from_slice(&b.rows);
    rows.sort_unstable();
    ClusterNode {
        rows,
        centroid,
        merge_distance: distance,
        children: Some(Box::new([a, b])),
    }
}

/// Mean silhouette score of a flat assignment over `data`. Rows in
/// singleton clusters score 0; higher is better, range [-1, 1].
pub fn silhouette(data: ArrayView2<f64>, assignment: &[u32]) -> f64 {
    let n = data.nrows();
    if n == 0 {
        return 0.0;
    }
    let k = assignment.iter().copied().max().map_or(0, |m| m as usize + 1);
    let mut sizes = vec![0usize; k];
    for &c in assignment {
        sizes[c as usize] += 1;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = assignment[i] as usize;
        if sizes[own] < 2 {
            continue;
        }
        let mut sums = vec![0.0f64; k];
        for j in 0..n {
            if i == j {
                continue;
            }
            sums[assignment[j] as usize] += dist_sq(data.row(i), data.row(j)).sqrt();
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        if b.is_finite() {
            let denom = a.max(b);
            if denom > 0.0 {
                total += (b - a) / denom;
            }
        }
    }
    total / n as f64
}
